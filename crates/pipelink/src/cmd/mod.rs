use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use pipelink_frame::Frame;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::{print_frame, OutputFormat};

pub mod connect;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve one peer at a time on a pipe path, printing received frames.
    Listen(ListenArgs),
    /// Connect to a listening pipe, retrying until it appears.
    Connect(ConnectArgs),
    /// Send a single frame and exit.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format).await,
        Command::Connect(args) => connect::run(args, format).await,
        Command::Send(args) => send::run(args).await,
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Pipe path to bind.
    pub path: PathBuf,
    /// Delay between outbound frames (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub cadence: String,
    /// Title of the outbound demo frames.
    #[arg(long, default_value = "Title2")]
    pub title: String,
    /// Message of the outbound demo frames.
    #[arg(long, default_value = "Message2")]
    pub message: String,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Pipe path to connect to.
    pub path: PathBuf,
    /// Delay between outbound frames; 0 means back-to-back.
    #[arg(long, default_value = "0ms")]
    pub cadence: String,
    /// Title of the outbound counter frames.
    #[arg(long, default_value = "Title1")]
    pub title: String,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Pipe path to connect to.
    pub path: PathBuf,
    /// Frame title.
    #[arg(long, default_value = "N/A")]
    pub title: String,
    /// Frame message.
    #[arg(long)]
    pub message: String,
    /// Connect timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a duration flag. Zero is allowed (back-to-back cadence).
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

/// Cancel the token on Ctrl-C so every loop unwinds gracefully.
pub fn install_shutdown_handler(cancel: &CancellationToken) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            cancel.cancel();
        }
    });
}

/// Drain the event queue to stdout; cancel the service once the requested
/// frame count has been printed.
pub async fn print_events(
    mut events: mpsc::Receiver<Frame>,
    format: OutputFormat,
    count: Option<usize>,
    cancel: CancellationToken,
    role: &'static str,
) {
    let mut printed = 0usize;
    while let Some(frame) = events.recv().await {
        print_frame(&frame, role, format);
        printed = printed.saturating_add(1);
        if count.is_some_and(|count| printed >= count) {
            cancel.cancel();
            break;
        }
    }
}
