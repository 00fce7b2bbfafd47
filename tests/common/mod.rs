#![allow(dead_code)]

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serial_tester::{
    Tester,
    config::TesterConfig,
    display::Scrollback,
    error::TesterResult,
    events::TesterEvent,
    interface::{DeviceInterface, DeviceReader, DeviceWriter},
    status::{CommandStatus, StatusBoard},
};

pub const PROMPT: &str = "root@OpenWrt:/#";
const READ_TIMEOUT: Duration = Duration::from_millis(20);
const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

pub const CONFIG: &str = r#"
    [serial]
    port = "loopback"
    timeout_ms = 20

    [[buttons]]
    text = "Check A"
    command = "A"
    row = 0
    column = 0
    expected_response = "OK"

    [[buttons]]
    text = "Check B"
    command = "B"
    row = 1
    column = 0

    [[buttons]]
    text = "Check C"
    command = "C"
    row = 2
    column = 0
    expected_response = "ready"

    [[buttons]]
    text = "Clear"
    command = "Clear Display"
    row = 3
    column = 0
"#;

/// Device side of the loopback. Chunks pushed by the test are returned by
/// reads; an idle line looks like a serial read timeout.
struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.chunk.len() {
            match self.rx.recv_timeout(READ_TIMEOUT) {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }

        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[derive(Clone, Default)]
pub struct Wire(Arc<Mutex<Vec<u8>>>);

impl Wire {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Wire {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct LoopbackDevice {
    rx: Receiver<Vec<u8>>,
    wire: Wire,
}

impl DeviceInterface for LoopbackDevice {
    fn name(&self) -> String {
        "loopback".to_string()
    }

    fn split(self: Box<Self>) -> TesterResult<(DeviceReader, DeviceWriter)> {
        let reader = ChannelReader {
            rx: self.rx,
            chunk: Vec::new(),
            pos: 0,
        };
        Ok((Box::new(reader), Box::new(self.wire)))
    }
}

/// A connected tester wired to an in-memory device
pub struct Harness {
    pub tester: Tester,
    pub events: Receiver<TesterEvent>,
    pub device: Option<Sender<Vec<u8>>>,
    pub wire: Wire,
    pub scrollback: Scrollback,
    pub statuses: StatusBoard,
    pub seen: Vec<TesterEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CONFIG)
    }

    pub fn with_config(content: &str) -> Self {
        let config = TesterConfig::from_toml_str(content).unwrap();
        let mut statuses = StatusBoard::new();
        for button in config.buttons.iter().filter(|b| b.is_command()) {
            statuses.register(&button.command);
        }

        let (tx, events) = mpsc::channel();
        let mut tester = Tester::new(config, tx);

        let (device, rx) = mpsc::channel();
        let wire = Wire::default();
        tester
            .attach(Box::new(LoopbackDevice {
                rx,
                wire: wire.clone(),
            }))
            .unwrap();

        let mut harness = Harness {
            tester,
            events,
            device: Some(device),
            wire,
            scrollback: Scrollback::new(),
            statuses,
            seen: Vec::new(),
        };
        harness.drain();
        harness
    }

    /// Bytes the device "prints"
    pub fn reply(&self, bytes: &[u8]) {
        self.device
            .as_ref()
            .expect("device unplugged")
            .send(bytes.to_vec())
            .unwrap();
    }

    pub fn reply_lines(&self, lines: &[&str]) {
        let mut text = String::new();
        for line in lines {
            text.push_str(line);
            text.push_str("\r\n");
        }
        self.reply(text.as_bytes());
    }

    pub fn unplug(&mut self) {
        self.device = None;
    }

    fn record(&mut self, event: TesterEvent) {
        self.scrollback.apply(&event);
        self.statuses.apply(&event);
        self.seen.push(event);
    }

    /// Apply everything already queued
    pub fn drain(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.record(event);
        }
    }

    /// Apply events until one matches `done`
    pub fn wait_until(&mut self, done: impl Fn(&TesterEvent) -> bool) -> bool {
        let deadline = Instant::now() + EVENT_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) => {
                    let finished = done(&event);
                    self.record(event);
                    if finished {
                        return true;
                    }
                }
                Err(_) => return false,
            }
        }
    }

    pub fn wait_for_frame(&mut self, command: &str) -> bool {
        self.wait_until(
            |e| matches!(e, TesterEvent::FrameComplete { command: c } if c == command),
        )
    }

    pub fn status(&self, command: &str) -> Option<CommandStatus> {
        self.statuses.get(command)
    }

    pub fn frames_completed(&self) -> usize {
        self.seen
            .iter()
            .filter(|e| matches!(e, TesterEvent::FrameComplete { .. }))
            .count()
    }
}
