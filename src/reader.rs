//! Background response framer.
//!
//! One thread per connection reads newline-terminated text, feeds it through
//! the session and reports lines, verdicts and frame boundaries to the UI.

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, trace, warn};

use crate::constants::{MAX_LINE_LEN, READ_BUFFER_SIZE};
use crate::error::{TesterError, TesterResult};
use crate::evaluator::evaluate;
use crate::events::{EventSink, TesterEvent, emit};
use crate::interface::DeviceReader;
use crate::session::{LineOutcome, SharedSession, lock_session};

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    Line(String),
    /// A line with invalid UTF-8; `line` keeps only the valid text
    Garbled { line: String, detail: String },
    /// Read timed out before a full line arrived
    Idle,
    Eof,
}

/// Splits a byte stream into trimmed text lines. Partial lines survive read
/// timeouts; a line longer than `MAX_LINE_LEN` is flushed as-is.
pub(crate) struct LineReader<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner: BufReader::with_capacity(READ_BUFFER_SIZE, inner),
            pending: Vec::new(),
        }
    }

    pub(crate) fn next_line(&mut self) -> TesterResult<ReadOutcome> {
        loop {
            let (complete, used) = {
                let available = match self.inner.fill_buf() {
                    Ok(available) => available,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                        return Ok(ReadOutcome::Idle);
                    }
                    Err(e) => return Err(TesterError::Read(e.to_string())),
                };

                if available.is_empty() {
                    // End of stream, flush whatever tail is left
                    if self.pending.is_empty() {
                        return Ok(ReadOutcome::Eof);
                    }
                    return Ok(self.take_line());
                }

                match available.iter().position(|&b| b == b'\n') {
                    Some(i) => {
                        self.pending.extend_from_slice(&available[..=i]);
                        (true, i + 1)
                    }
                    None => {
                        self.pending.extend_from_slice(available);
                        (false, available.len())
                    }
                }
            };
            self.inner.consume(used);

            if complete || self.pending.len() >= MAX_LINE_LEN {
                return Ok(self.take_line());
            }
        }
    }

    fn take_line(&mut self) -> ReadOutcome {
        let bytes = std::mem::take(&mut self.pending);
        match String::from_utf8(bytes) {
            Ok(text) => ReadOutcome::Line(text.trim().to_string()),
            Err(e) => {
                let detail = e.utf8_error().to_string();
                // Drop the invalid sequences, keep the readable text
                let text: String = e
                    .as_bytes()
                    .utf8_chunks()
                    .map(|chunk| chunk.valid())
                    .collect();
                ReadOutcome::Garbled {
                    line: text.trim().to_string(),
                    detail,
                }
            }
        }
    }
}

/// Everything the reader thread shares with the rest of the tester
#[derive(Clone)]
pub struct ReaderContext {
    pub session: SharedSession,
    pub events: EventSink,
    /// Set by the UI to ask the loop to exit
    pub stop: Arc<AtomicBool>,
    /// Cleared by the loop when the connection is closed
    pub open: Arc<AtomicBool>,
}

/// Start the framer thread for the lifetime of the connection
pub fn spawn_reader(reader: DeviceReader, ctx: ReaderContext) -> TesterResult<JoinHandle<()>> {
    thread::Builder::new()
        .name("serial-reader".into())
        .spawn(move || read_loop(reader, ctx))
        .map_err(|e| TesterError::Read(format!("Failed to start reader thread: {}", e)))
}

fn read_loop(reader: DeviceReader, ctx: ReaderContext) {
    let mut lines = LineReader::new(reader);

    while !ctx.stop.load(Ordering::SeqCst) && ctx.open.load(Ordering::SeqCst) {
        match lines.next_line() {
            Ok(ReadOutcome::Line(line)) => handle_line(&line, &ctx),
            Ok(ReadOutcome::Idle) => continue,
            Ok(ReadOutcome::Eof) => {
                warn!("Serial stream ended");
                break;
            }
            Ok(ReadOutcome::Garbled { line, detail }) => {
                warn!("Line {:?} had undecodable bytes: {}", line, detail);
                emit(
                    &ctx.events,
                    TesterEvent::error(format!("Error decoding data: {}", detail)),
                );
                handle_line(&line, &ctx);
            }
            Err(e) => {
                error!("Reader loop failed: {}", e);
                emit(
                    &ctx.events,
                    TesterEvent::error(format!("Error reading from serial port: {}", e)),
                );
                break;
            }
        }
    }

    // Dropping the read half here closes this side of the port
    drop(lines);
    ctx.open.store(false, Ordering::SeqCst);
    info!("Reader loop exited, connection closed");
    emit(&ctx.events, TesterEvent::error("Serial port closed."));
    emit(&ctx.events, TesterEvent::Disconnected);
}

/// Run one received line through the session and report the result
pub(crate) fn handle_line(line: &str, ctx: &ReaderContext) {
    trace!("rx {:?}", line);

    let (outcome, verdict) = {
        let mut session = lock_session(&ctx.session);
        let outcome = session.accept_line(line);
        let verdict = match &outcome {
            LineOutcome::FrameComplete(frame) => {
                evaluate(&frame.command, &frame.text, session.expectations())
            }
            _ => None,
        };
        (outcome, verdict)
    };

    match outcome {
        LineOutcome::Ignored(reason) => trace!("Ignored line ({:?})", reason),
        LineOutcome::Appended => emit(&ctx.events, TesterEvent::info(line)),
        LineOutcome::FrameComplete(frame) => {
            emit(&ctx.events, TesterEvent::info(line));
            emit(
                &ctx.events,
                TesterEvent::info("Prompt detected. Processing buffer."),
            );
            debug!("Frame complete for {:?}", frame.command);

            if let Some(verdict) = verdict {
                for event in verdict.into_events() {
                    emit(&ctx.events, event);
                }
            }
            emit(
                &ctx.events,
                TesterEvent::FrameComplete {
                    command: frame.command,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::status::CommandStatus;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::mpsc;

    /// Replays a fixed list of read results
    struct Scripted(VecDeque<io::Result<Vec<u8>>>);

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
            }
        }
    }

    fn timed_out() -> io::Result<Vec<u8>> {
        Err(io::Error::new(io::ErrorKind::TimedOut, "timeout"))
    }

    #[test]
    fn partial_line_survives_timeout() {
        let mut lines = LineReader::new(Scripted(VecDeque::from(vec![
            Ok(b"O".to_vec()),
            timed_out(),
            Ok(b"K\r\n".to_vec()),
        ])));

        assert_eq!(lines.next_line().unwrap(), ReadOutcome::Idle);
        assert_eq!(
            lines.next_line().unwrap(),
            ReadOutcome::Line("OK".to_string())
        );
        assert_eq!(lines.next_line().unwrap(), ReadOutcome::Eof);
    }

    #[test]
    fn invalid_bytes_are_dropped_and_the_rest_of_the_line_kept() {
        let mut lines = LineReader::new(Scripted(VecDeque::from(vec![
            Ok(b"O\xffK\xfe\r\n".to_vec()),
            Ok(b"next\n".to_vec()),
        ])));

        match lines.next_line().unwrap() {
            ReadOutcome::Garbled { line, detail } => {
                assert_eq!(line, "OK");
                assert!(!detail.is_empty());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(
            lines.next_line().unwrap(),
            ReadOutcome::Line("next".to_string())
        );
    }

    #[test]
    fn endless_line_is_flushed_at_the_cap() {
        let chunks: VecDeque<_> = (0..12)
            .map(|_| Ok(vec![b'a'; READ_BUFFER_SIZE]))
            .collect();
        let mut lines = LineReader::new(Scripted(chunks));

        match lines.next_line().unwrap() {
            ReadOutcome::Line(line) => assert_eq!(line.len(), MAX_LINE_LEN),
            other => panic!("unexpected outcome {:?}", other),
        }
        // The rest of the stream still comes through
        match lines.next_line().unwrap() {
            ReadOutcome::Line(line) => assert_eq!(line.len(), 4 * READ_BUFFER_SIZE),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(lines.next_line().unwrap(), ReadOutcome::Eof);
    }

    #[test]
    fn other_io_errors_are_read_errors() {
        let mut lines = LineReader::new(Scripted(VecDeque::from(vec![Err(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "gone",
        ))])));

        assert!(matches!(lines.next_line(), Err(TesterError::Read(_))));
    }

    fn context(prompt: &str) -> (ReaderContext, mpsc::Receiver<TesterEvent>) {
        let (tx, rx) = mpsc::channel();
        let ctx = ReaderContext {
            session: Session::new(prompt).shared(),
            events: tx,
            stop: Arc::new(AtomicBool::new(false)),
            open: Arc::new(AtomicBool::new(true)),
        };
        (ctx, rx)
    }

    #[test]
    fn loop_closes_connection_on_read_failure() {
        let (ctx, rx) = context("#");
        let reader: DeviceReader = Box::new(Scripted(VecDeque::from(vec![
            Ok(b"hello\n".to_vec()),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone")),
            Ok(b"never read\n".to_vec()),
        ])));

        spawn_reader(reader, ctx.clone()).unwrap().join().unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert!(!ctx.open.load(Ordering::SeqCst));
        assert_eq!(events.first(), Some(&TesterEvent::info("hello")));
        assert!(events.contains(&TesterEvent::error("Serial port closed.")));
        assert_eq!(events.last(), Some(&TesterEvent::Disconnected));
        assert!(!events.contains(&TesterEvent::info("never read")));
    }

    #[test]
    fn stop_flag_ends_loop_before_reading() {
        let (ctx, rx) = context("#");
        ctx.stop.store(true, Ordering::SeqCst);
        let reader: DeviceReader = Box::new(Scripted(VecDeque::from(vec![Ok(b"late\n".to_vec())])));

        spawn_reader(reader, ctx.clone()).unwrap().join().unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                TesterEvent::error("Serial port closed."),
                TesterEvent::Disconnected
            ]
        );
    }

    #[test]
    fn frame_events_arrive_in_display_order() {
        let (ctx, rx) = context("#");
        lock_session(&ctx.session).begin_command("A", Some("OK".into()));

        handle_line("OK", &ctx);
        handle_line("#", &ctx);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                TesterEvent::info("OK"),
                TesterEvent::info("#"),
                TesterEvent::info("Prompt detected. Processing buffer."),
                TesterEvent::info("Checking buffer: OK\n#\n"),
                TesterEvent::success("Command: A - Passed"),
                TesterEvent::Status {
                    command: "A".into(),
                    status: CommandStatus::Pass,
                },
                TesterEvent::FrameComplete {
                    command: "A".into()
                },
            ]
        );
    }
}
