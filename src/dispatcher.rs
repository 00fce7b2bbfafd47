use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::error::{TesterError, TesterResult};
use crate::events::{EventSink, TesterEvent, emit};
use crate::interface::DeviceWriter;
use crate::session::{SharedSession, lock_session};
use crate::status::CommandStatus;

/// Writes commands to the device on behalf of the UI thread
pub struct Dispatcher {
    session: SharedSession,
    events: EventSink,
    line_ending: String,
    writer: Option<DeviceWriter>,
    open: Arc<AtomicBool>,
}

impl Dispatcher {
    /// `open` is cleared by the reader thread when the connection dies
    pub fn new(
        session: SharedSession,
        events: EventSink,
        line_ending: &str,
        open: Arc<AtomicBool>,
    ) -> Self {
        Self {
            session,
            events,
            line_ending: line_ending.to_string(),
            writer: None,
            open,
        }
    }

    pub fn attach(&mut self, writer: DeviceWriter) {
        self.writer = Some(writer);
    }

    pub fn detach(&mut self) {
        self.writer = None;
    }

    pub fn is_connected(&self) -> bool {
        self.writer.is_some() && self.open.load(Ordering::SeqCst)
    }

    /// Write `command` and start a new frame for it.
    ///
    /// Failures are reported on the event channel as well as returned.
    pub fn send(&mut self, command: &str, expected: Option<String>) -> TesterResult<()> {
        match self.write_command(command, expected) {
            Ok(()) => {
                emit(&self.events, TesterEvent::info(format!("Sent: {}", command)));
                emit(
                    &self.events,
                    TesterEvent::Status {
                        command: command.to_string(),
                        status: CommandStatus::Idle,
                    },
                );
                Ok(())
            }
            Err(e) => {
                let text = match &e {
                    TesterError::NotConnected => format!("Error: {}", e),
                    TesterError::Write(msg) => format!("Error sending command: {}", msg),
                    other => format!("Error: {}", other),
                };
                warn!("{}", text);
                emit(&self.events, TesterEvent::error(text));
                Err(e)
            }
        }
    }

    fn write_command(&mut self, command: &str, expected: Option<String>) -> TesterResult<()> {
        if !self.open.load(Ordering::SeqCst) {
            // Reader already closed the connection
            self.writer = None;
        }
        let writer = self.writer.as_mut().ok_or(TesterError::NotConnected)?;

        // Hold the session across the write so the reader cannot see the
        // reply before the new frame starts.
        let mut session = lock_session(&self.session);

        let payload = format!("{}{}", command, self.line_ending);
        writer
            .write_all(payload.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| TesterError::Write(e.to_string()))?;

        session.begin_command(command, expected);
        debug!("Sent command {:?}", command);
        Ok(())
    }
}
