//! Session state shared by the dispatcher and the reader thread.
//!
//! All mutation goes through one mutex, so a send can never interleave with
//! half-processed reader output.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Command -> expected-response substring. `None` means "never judged".
pub type Expectations = HashMap<String, Option<String>>;

pub type SharedSession = Arc<Mutex<Session>>;

/// Why a received line was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Empty,
    Echo,
    DuplicatePrompt,
}

/// Lines received between a send and the prompt that closed them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Ignored(IgnoreReason),
    Appended,
    FrameComplete(Frame),
}

#[derive(Debug)]
pub struct Session {
    prompt: String,
    last_command: String,
    buffer: String,
    last_was_prompt: bool,
    expectations: Expectations,
}

impl Session {
    pub fn new(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            last_command: String::new(),
            buffer: String::new(),
            last_was_prompt: false,
            expectations: HashMap::new(),
        }
    }

    pub fn with_expectations(
        prompt: &str,
        expectations: impl IntoIterator<Item = (String, Option<String>)>,
    ) -> Self {
        let mut session = Self::new(prompt);
        session.expectations.extend(expectations);
        session
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    /// Start a new frame for `command`, replacing its expected response
    pub fn begin_command(&mut self, command: &str, expected: Option<String>) {
        self.buffer.clear();
        self.last_command = command.to_string();
        self.expectations.insert(command.to_string(), expected);
    }

    /// Feed one trimmed line from the device
    pub fn accept_line(&mut self, line: &str) -> LineOutcome {
        if line.is_empty() {
            return LineOutcome::Ignored(IgnoreReason::Empty);
        }
        if line == self.last_command {
            return LineOutcome::Ignored(IgnoreReason::Echo);
        }

        let is_prompt = line == self.prompt;
        if is_prompt && self.last_was_prompt {
            return LineOutcome::Ignored(IgnoreReason::DuplicatePrompt);
        }

        self.buffer.push_str(line);
        self.buffer.push('\n');

        self.last_was_prompt = is_prompt;
        if is_prompt {
            LineOutcome::FrameComplete(Frame {
                command: self.last_command.clone(),
                text: std::mem::take(&mut self.buffer),
            })
        } else {
            LineOutcome::Appended
        }
    }

    pub fn last_command(&self) -> &str {
        &self.last_command
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn last_was_prompt(&self) -> bool {
        self.last_was_prompt
    }

    pub fn expectations(&self) -> &Expectations {
        &self.expectations
    }
}

/// Lock the session, recovering the state if a holder panicked
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
