use serial_tester::{error::TesterResult, interface::serialport::available_port_names};

pub(crate) fn list_ports() -> TesterResult<()> {
    let ports = available_port_names()?;

    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }

    println!("Available serial ports:");
    for (i, port) in ports.iter().enumerate() {
        println!("  {}: {}", i, port);
    }
    Ok(())
}
