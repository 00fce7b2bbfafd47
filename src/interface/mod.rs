pub mod serialport;

use std::io::{Read, Write};

use crate::error::TesterResult;

/// Read half of a device connection, owned by the reader thread
pub type DeviceReader = Box<dyn Read + Send>;

/// Write half of a device connection, owned by the dispatcher
pub type DeviceWriter = Box<dyn Write + Send>;

pub trait DeviceInterface {
    /// Human readable device name for status messages
    fn name(&self) -> String;

    /// Split the open device into independent read and write halves
    fn split(self: Box<Self>) -> TesterResult<(DeviceReader, DeviceWriter)>;
}
