use thiserror::Error;

#[derive(Error, Debug)]
pub enum TesterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not connect to serial port. {0}")]
    Connect(String),

    #[error("Not connected to a serial port.")]
    NotConnected,

    #[error("Write error: {0}")]
    Write(String),

    #[error("Read error: {0}")]
    Read(String),

    #[error("GUI error: {0}")]
    Gui(String),
}

pub type TesterResult<T> = std::result::Result<T, TesterError>;
