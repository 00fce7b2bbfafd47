use std::collections::HashMap;

use crate::events::TesterEvent;

/// Outcome indicator shown next to every command button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandStatus {
    /// Sent (or never sent) and waiting for a prompt
    #[default]
    Idle,
    Pass,
    Fail,
}

impl CommandStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CommandStatus::Idle => "Idle",
            CommandStatus::Pass => "Pass",
            CommandStatus::Fail => "Fail",
        }
    }

    /// Indicator colour as RGB
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            CommandStatus::Idle => [255, 165, 0],
            CommandStatus::Pass => [0, 160, 0],
            CommandStatus::Fail => [220, 0, 0],
        }
    }
}

/// Per-command statuses. Only registered commands are tracked.
#[derive(Debug, Default, Clone)]
pub struct StatusBoard {
    statuses: HashMap<String, CommandStatus>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: &str) {
        self.statuses.entry(command.to_string()).or_default();
    }

    pub fn get(&self, command: &str) -> Option<CommandStatus> {
        self.statuses.get(command).copied()
    }

    /// Record a status change for a registered command
    pub fn set(&mut self, command: &str, status: CommandStatus) -> bool {
        match self.statuses.get_mut(command) {
            Some(current) => {
                *current = status;
                true
            }
            None => false,
        }
    }

    pub fn apply(&mut self, event: &TesterEvent) {
        if let TesterEvent::Status { command, status } = event {
            self.set(command, *status);
        }
    }
}
