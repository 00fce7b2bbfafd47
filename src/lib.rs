use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use tracing::{info, warn};

use config::TesterConfig;
use dispatcher::Dispatcher;
use error::{TesterError, TesterResult};
use events::{EventSink, TesterEvent, emit};
use interface::DeviceInterface;
use interface::serialport::SerialPortDevice;
use reader::{ReaderContext, spawn_reader};
use session::{Session, SharedSession};

pub mod config;
pub(crate) mod constants;
pub mod dispatcher;
pub mod display;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod interface;
pub mod reader;
pub mod session;
pub mod status;

pub use constants::{CLEAR_DISPLAY_COMMAND, DEFAULT_PROMPT};

/// One serial connection plus the dispatcher and reader thread that serve it
pub struct Tester {
    config: TesterConfig,
    session: SharedSession,
    dispatcher: Dispatcher,
    events: EventSink,
    stop: Arc<AtomicBool>,
    open: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl Tester {
    /// Create a disconnected tester. Button expectations seed the session.
    pub fn new(config: TesterConfig, events: EventSink) -> Self {
        let session =
            Session::with_expectations(&config.serial.prompt, config.expectations()).shared();
        let open = Arc::new(AtomicBool::new(false));
        let dispatcher = Dispatcher::new(
            Arc::clone(&session),
            events.clone(),
            &config.serial.line_ending,
            Arc::clone(&open),
        );

        Tester {
            config,
            session,
            dispatcher,
            events,
            stop: Arc::new(AtomicBool::new(false)),
            open,
            reader: None,
        }
    }

    /// Open the configured serial port and start reading.
    ///
    /// A failure is reported once on the event channel; the tester stays
    /// disconnected and no reader thread is started.
    pub fn connect(&mut self) -> TesterResult<()> {
        let device = SerialPortDevice::new(&self.config.serial).inspect_err(|e| {
            warn!("Connection failed: {}", e);
            emit(&self.events, TesterEvent::error(format!("Error: {}", e)));
        })?;
        self.attach(Box::new(device))
    }

    /// Start the reader thread on an already open device
    pub fn attach(&mut self, device: Box<dyn DeviceInterface>) -> TesterResult<()> {
        if self.reader.is_some() {
            return Err(TesterError::Connect(
                "Reader already started for this session".into(),
            ));
        }

        let name = device.name();
        let (reader, writer) = device.split()?;

        self.open.store(true, Ordering::SeqCst);
        let ctx = ReaderContext {
            session: Arc::clone(&self.session),
            events: self.events.clone(),
            stop: Arc::clone(&self.stop),
            open: Arc::clone(&self.open),
        };
        let handle = spawn_reader(reader, ctx).inspect_err(|_| {
            self.open.store(false, Ordering::SeqCst);
        })?;

        self.dispatcher.attach(writer);
        self.reader = Some(handle);

        info!("Connected to {}", name);
        emit(
            &self.events,
            TesterEvent::info(format!("Connected to serial port: {}", name)),
        );
        Ok(())
    }

    /// Send `command`, replacing its expected response with `expected`
    pub fn send(&mut self, command: &str, expected: Option<String>) -> TesterResult<()> {
        self.dispatcher.send(command, expected)
    }

    pub fn is_connected(&self) -> bool {
        self.dispatcher.is_connected()
    }

    /// Whether the reader thread is still running
    pub fn is_reading(&self) -> bool {
        self.reader.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn config(&self) -> &TesterConfig {
        &self.config
    }

    /// Stop the reader and close the connection.
    ///
    /// The reader only notices the stop flag between reads, so this can block
    /// for up to one read timeout.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.dispatcher.detach();
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                warn!("Reader thread panicked");
            }
        }
    }
}

impl Drop for Tester {
    fn drop(&mut self) {
        self.shutdown();
    }
}
