use crate::events::TesterEvent;
use crate::session::Expectations;
use crate::status::CommandStatus;

/// Result of checking one frame against its expected response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub command: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
}

/// Judge `buffer` for `last_command`.
///
/// Returns `None` when the command has no (or an empty) expected response;
/// such frames are never judged. Otherwise the check is a case-sensitive
/// substring search anywhere in the buffer.
pub fn evaluate(last_command: &str, buffer: &str, expectations: &Expectations) -> Option<Verdict> {
    let expected = expectations
        .get(last_command)?
        .as_deref()
        .filter(|e| !e.is_empty())?;

    Some(Verdict {
        command: last_command.to_string(),
        expected: expected.to_string(),
        actual: buffer.to_string(),
        passed: buffer.contains(expected),
    })
}

impl Verdict {
    pub fn status(&self) -> CommandStatus {
        if self.passed {
            CommandStatus::Pass
        } else {
            CommandStatus::Fail
        }
    }

    /// Scrollback lines and the status update for this verdict
    pub fn into_events(self) -> Vec<TesterEvent> {
        let status = self.status();
        let mut events = vec![TesterEvent::info(format!("Checking buffer: {}", self.actual))];

        if self.passed {
            events.push(TesterEvent::success(format!(
                "Command: {} - Passed",
                self.command
            )));
        } else {
            events.push(TesterEvent::error(format!(
                "Command: {} - Failed. Expected: {}, Got:\n{}",
                self.command, self.expected, self.actual
            )));
        }

        events.push(TesterEvent::Status {
            command: self.command,
            status,
        });
        events
    }
}
