use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use clap::Parser;
use indicatif::ProgressBar;
use serial_tester::{
    Tester,
    error::TesterResult,
    events::{MessageKind, TesterEvent},
    status::{CommandStatus, StatusBoard},
};

use crate::options::ConnectionOptions;
use crate::util::create_spinner;

pub(crate) const EXIT_PASS: u8 = 0;
pub(crate) const EXIT_FAIL: u8 = 1;
pub(crate) const EXIT_ERROR: u8 = 2;

#[derive(Parser, Debug, Clone)]
pub(crate) struct SendOptions {
    #[clap(flatten)]
    connection: ConnectionOptions,

    /// Command text to send
    command: String,

    /// Expected substring; defaults to the matching button's expectation
    #[clap(short, long)]
    expect: Option<String>,

    /// How long to wait for the prompt, in milliseconds
    #[clap(short, long, default_value_t = 5000)]
    wait_ms: u64,
}

#[derive(Debug, PartialEq, Eq)]
enum SendOutcome {
    Judged(CommandStatus),
    Unchecked,
    TimedOut,
    ConnectionLost,
}

impl SendOutcome {
    fn exit_code(&self) -> u8 {
        match self {
            SendOutcome::Judged(CommandStatus::Fail) => EXIT_FAIL,
            SendOutcome::Judged(_) | SendOutcome::Unchecked => EXIT_PASS,
            SendOutcome::TimedOut | SendOutcome::ConnectionLost => EXIT_ERROR,
        }
    }
}

pub(crate) fn handle_send(opts: SendOptions) -> TesterResult<u8> {
    let config = opts.connection.load_config()?;
    let expected = opts.expect.clone().or_else(|| {
        config
            .find_button(&opts.command)
            .and_then(|b| b.expected_response.clone())
    });

    let (tx, rx) = mpsc::channel();
    let mut tester = Tester::new(config, tx);
    let mut statuses = StatusBoard::new();
    statuses.register(&opts.command);

    tester.connect()?;
    let spinner = create_spinner(&format!("Waiting for prompt after '{}'", opts.command));
    if let Err(e) = tester.send(&opts.command, expected) {
        spinner.finish_and_clear();
        return Err(e);
    }

    let deadline = Instant::now() + Duration::from_millis(opts.wait_ms);
    let outcome = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = match rx.recv_timeout(remaining) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => break SendOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => break SendOutcome::ConnectionLost,
        };

        print_event(&spinner, &event);
        statuses.apply(&event);

        match event {
            TesterEvent::FrameComplete { command } if command == opts.command => {
                break match statuses.get(&command) {
                    Some(CommandStatus::Idle) | None => SendOutcome::Unchecked,
                    Some(status) => SendOutcome::Judged(status),
                };
            }
            TesterEvent::Disconnected => break SendOutcome::ConnectionLost,
            _ => {}
        }
    };

    spinner.finish_and_clear();
    tester.shutdown();

    match &outcome {
        SendOutcome::Judged(status) => println!("{}: {}", opts.command, status.label()),
        SendOutcome::Unchecked => println!("{}: no expected response, not judged", opts.command),
        SendOutcome::TimedOut => eprintln!(
            "{}: no prompt within {} ms",
            opts.command, opts.wait_ms
        ),
        SendOutcome::ConnectionLost => eprintln!("{}: connection lost", opts.command),
    }

    Ok(outcome.exit_code())
}

fn print_event(spinner: &ProgressBar, event: &TesterEvent) {
    if let TesterEvent::Message { text, kind } = event {
        match kind {
            MessageKind::Info => spinner.println(text),
            MessageKind::Success => spinner.println(format!("[PASS] {}", text)),
            MessageKind::Error => spinner.println(format!("[ERROR] {}", text)),
        }
    }
}
