use std::sync::mpsc::Sender;

use tracing::trace;

use crate::status::CommandStatus;

/// Scrollback styling category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Success,
    Error,
}

/// Everything the dispatcher and the reader thread report to the UI
#[derive(Debug, Clone, PartialEq)]
pub enum TesterEvent {
    Message { text: String, kind: MessageKind },
    Status { command: String, status: CommandStatus },
    /// A prompt closed the frame for `command`, after any verdict was reported
    FrameComplete { command: String },
    /// The reader loop exited and the connection is closed
    Disconnected,
}

impl TesterEvent {
    pub fn info(text: impl Into<String>) -> Self {
        TesterEvent::Message {
            text: text.into(),
            kind: MessageKind::Info,
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        TesterEvent::Message {
            text: text.into(),
            kind: MessageKind::Success,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        TesterEvent::Message {
            text: text.into(),
            kind: MessageKind::Error,
        }
    }
}

pub type EventSink = Sender<TesterEvent>;

pub(crate) fn emit(sink: &EventSink, event: TesterEvent) {
    if sink.send(event).is_err() {
        trace!("Event receiver dropped");
    }
}
