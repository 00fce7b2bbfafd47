use tracing::info;

use super::{DeviceInterface, DeviceReader, DeviceWriter};
use crate::config::SerialSettings;
use crate::error::{TesterError, TesterResult};

/// Serial port device_interface layer
pub struct SerialPortDevice {
    pub serial_port: Box<dyn serialport::SerialPort>,
    port_name: String,
}

impl SerialPortDevice {
    /// Open `settings.port` with fixed 8N1 framing
    pub fn new(settings: &SerialSettings) -> TesterResult<SerialPortDevice> {
        if settings.port.is_empty() {
            return Err(TesterError::Connect("No serial port configured".into()));
        }

        let serial_port = serialport::new(&settings.port, settings.baud_rate)
            .timeout(settings.timeout())
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| TesterError::Connect(e.to_string()))?;

        info!(
            "Opened {} at {} baud (8N1)",
            settings.port, settings.baud_rate
        );

        Ok(SerialPortDevice {
            serial_port,
            port_name: settings.port.clone(),
        })
    }
}

impl DeviceInterface for SerialPortDevice {
    fn name(&self) -> String {
        self.port_name.clone()
    }

    fn split(self: Box<Self>) -> TesterResult<(DeviceReader, DeviceWriter)> {
        let writer = self
            .serial_port
            .try_clone()
            .map_err(|e| TesterError::Connect(format!("Failed to clone port handle: {}", e)))?;

        Ok((Box::new(self.serial_port), Box::new(writer)))
    }
}

/// Names of the serial ports present on this machine
pub fn available_port_names() -> TesterResult<Vec<String>> {
    let ports = serialport::available_ports()
        .map_err(|e| TesterError::Connect(format!("Could not enumerate serial ports: {}", e)))?;

    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
