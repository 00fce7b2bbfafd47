pub const DEFAULT_PROMPT: &str = "root@OpenWrt:/#";
pub const DEFAULT_BAUD_RATE: u32 = 115200;
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_LINE_ENDING: &str = "\n";

/// Button command that clears the scrollback instead of talking to the device
pub const CLEAR_DISPLAY_COMMAND: &str = "Clear Display";

pub(crate) const READ_BUFFER_SIZE: usize = 1024;
/// Longest partial line held before it is flushed without a newline
pub(crate) const MAX_LINE_LEN: usize = READ_BUFFER_SIZE * 8;
