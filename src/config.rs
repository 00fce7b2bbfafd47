//! Tester configuration: serial settings and the button grid.
//!
//! Loaded once at startup from a TOML file such as:
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! timeout_ms = 1000
//! prompt = "root@OpenWrt:/#"
//!
//! [[buttons]]
//! text = "Kernel version"
//! command = "uname -r"
//! row = 0
//! column = 0
//! expected_response = "5.15"
//!
//! [[buttons]]
//! text = "Clear"
//! command = "Clear Display"
//! row = 1
//! column = 0
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    CLEAR_DISPLAY_COMMAND, DEFAULT_BAUD_RATE, DEFAULT_LINE_ENDING, DEFAULT_PROMPT,
    DEFAULT_TIMEOUT_MS,
};
use crate::error::{TesterError, TesterResult};

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_line_ending() -> String {
    DEFAULT_LINE_ENDING.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TesterConfig {
    pub serial: SerialSettings,

    #[serde(default)]
    pub buttons: Vec<ButtonDef>,
}

/// Connection parameters. Framing is always 8N1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Port name (e.g., COM3, /dev/ttyUSB0)
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Upper bound on a single blocking read
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Line the device prints when it is ready for the next command
    #[serde(default = "default_prompt")]
    pub prompt: String,

    /// Appended to every command on the wire
    #[serde(default = "default_line_ending")]
    pub line_ending: String,
}

impl SerialSettings {
    pub fn new(port: &str) -> Self {
        Self {
            port: port.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            prompt: DEFAULT_PROMPT.to_string(),
            line_ending: DEFAULT_LINE_ENDING.to_string(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonDef {
    pub text: String,
    pub command: String,
    pub row: usize,
    pub column: usize,

    #[serde(default)]
    pub expected_response: Option<String>,
}

/// What pressing a button does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction<'a> {
    ClearDisplay,
    Send {
        command: &'a str,
        expected: Option<&'a str>,
    },
}

impl ButtonDef {
    pub fn action(&self) -> ButtonAction<'_> {
        if self.command == CLEAR_DISPLAY_COMMAND {
            ButtonAction::ClearDisplay
        } else {
            ButtonAction::Send {
                command: &self.command,
                expected: self.expected_response.as_deref(),
            }
        }
    }

    pub fn is_command(&self) -> bool {
        matches!(self.action(), ButtonAction::Send { .. })
    }
}

impl TesterConfig {
    /// Read and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> TesterResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TesterError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        debug!(
            "Loaded {} buttons from {}",
            config.buttons.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> TesterResult<Self> {
        let config: TesterConfig =
            toml::from_str(content).map_err(|e| TesterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TesterResult<()> {
        if self.serial.baud_rate == 0 {
            return Err(TesterError::Config("baud_rate must be non-zero".into()));
        }
        if self.serial.timeout_ms == 0 {
            return Err(TesterError::Config("timeout_ms must be non-zero".into()));
        }
        if self.serial.prompt.trim().is_empty() {
            return Err(TesterError::Config("prompt must not be empty".into()));
        }

        let mut cells = HashSet::new();
        for button in &self.buttons {
            if button.command.trim().is_empty() {
                return Err(TesterError::Config(format!(
                    "button '{}' has an empty command",
                    button.text
                )));
            }
            if !cells.insert((button.row, button.column)) {
                return Err(TesterError::Config(format!(
                    "button '{}' reuses grid cell ({}, {})",
                    button.text, button.row, button.column
                )));
            }
        }

        Ok(())
    }

    /// Initial command -> expected-response table, one entry per command button
    pub fn expectations(&self) -> impl Iterator<Item = (String, Option<String>)> + '_ {
        self.buttons
            .iter()
            .filter(|b| b.is_command())
            .map(|b| (b.command.clone(), b.expected_response.clone()))
    }

    pub fn find_button(&self, command: &str) -> Option<&ButtonDef> {
        self.buttons.iter().find(|b| b.command == command)
    }
}
