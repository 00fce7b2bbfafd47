use crate::events::{MessageKind, TesterEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub text: String,
    pub kind: MessageKind,
}

/// Append-only scrollback shown to the user. Only an explicit clear removes lines.
#[derive(Debug, Default, Clone)]
pub struct Scrollback {
    lines: Vec<DisplayLine>,
}

impl Scrollback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: impl Into<String>, kind: MessageKind) {
        self.lines.push(DisplayLine {
            text: text.into(),
            kind,
        });
    }

    pub fn apply(&mut self, event: &TesterEvent) {
        if let TesterEvent::Message { text, kind } = event {
            self.push(text.clone(), *kind);
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[DisplayLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn contains_line(&self, text: &str) -> bool {
        self.lines.iter().any(|l| l.text == text)
    }
}
