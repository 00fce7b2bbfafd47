use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use options::ConnectionOptions;
use send::{SendOptions, handle_send};

mod app;
mod options;
mod ports;
mod send;
mod util;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
enum Cli {
    /// Open the tester window
    #[command(name = "gui", alias = "g")]
    Gui(ConnectionOptions),

    /// Send one command without a window and report the verdict
    #[command(name = "send", alias = "s")]
    Send(SendOptions),

    /// List serial ports on this machine
    #[command(name = "ports", alias = "l")]
    Ports,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli {
        Cli::Gui(opts) => app::run(opts).map(|_| ExitCode::SUCCESS),
        Cli::Send(opts) => handle_send(opts).map(ExitCode::from),
        Cli::Ports => ports::list_ports().map(|_| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::from(send::EXIT_ERROR)
        }
    }
}
