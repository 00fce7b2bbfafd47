use std::path::PathBuf;

use clap::Parser;
use serial_tester::{config::TesterConfig, error::TesterResult};

#[derive(Parser, Debug, Clone)]
pub(crate) struct ConnectionOptions {
    /// Tester configuration (serial settings and buttons)
    #[clap(short, long, default_value = "serial_tester.toml")]
    config: PathBuf,

    /// Serial port, overrides the configuration
    #[clap(short, long)]
    serial: Option<String>,

    /// Baud rate, overrides the configuration
    #[clap(short, long)]
    baudrate: Option<u32>,
}

impl ConnectionOptions {
    pub(crate) fn load_config(&self) -> TesterResult<TesterConfig> {
        let mut config = TesterConfig::load(&self.config)?;

        if let Some(port) = &self.serial {
            config.serial.port = port.clone();
        }
        if let Some(baud) = self.baudrate {
            config.serial.baud_rate = baud;
        }
        config.validate()?;

        Ok(config)
    }
}
