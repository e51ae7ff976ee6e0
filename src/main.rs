//! # osp3-poll
//!
//! Print log entries from an ODROID Smart Power 3.
//!
//! Accepted entries go to stdout, either as the raw device line or as JSON
//! Lines. Diagnostics go to stderr and, when configured, to daily log files.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use smartpower3::config::{Config, LoggingConfig, OutputFormat, PollMode};
use smartpower3::poll::{PollOptions, Poller};
use smartpower3::serial::{BufferedLineReader, Osp3Serial};
use smartpower3::telemetry::{JsonlSink, RawLineSink};

/// File name prefix for rolling log files
const LOG_FILE_PREFIX: &str = "osp3-poll.log";

/// Extra wait for the poll loop to notice Ctrl+C, beyond one read timeout
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Set up stderr logging, plus daily files when a directory is configured
///
/// RUST_LOG takes precedence over the configured level. The returned guard
/// must be held until exit so buffered file output is written.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

/// How long to wait for the poll loop after cancellation
fn shutdown_grace(read_timeout: Option<Duration>) -> Duration {
    read_timeout.unwrap_or(Duration::ZERO) + SHUTDOWN_GRACE
}

/// Blocking half of the program: read until cancelled
fn run_poll(
    reader: BufferedLineReader<Osp3Serial>,
    options: PollOptions,
    mode: PollMode,
    output: OutputFormat,
    running: &AtomicBool,
) -> Result<()> {
    let mut poller = Poller::new(reader, options);
    let stdout = io::stdout();

    match mode {
        PollMode::Dump => {
            let total = poller.dump(running, &mut stdout.lock())?;
            info!("Total bytes dumped: {}", total);
        }
        PollMode::Lines => {
            let stats = match output {
                OutputFormat::Raw => poller.run(running, &mut RawLineSink::new(stdout.lock()))?,
                OutputFormat::Jsonl => poller.run(running, &mut JsonlSink::new(stdout.lock()))?,
            };
            info!(
                "Entries accepted: {}, dropped: {} (short {}, long {}, parse {}, checksum {})",
                stats.accepted,
                stats.dropped(),
                stats.short_lines,
                stats.long_lines,
                stats.parse_failures,
                stats.checksum_failures
            );
        }
    }

    Ok(())
}

/// Main entry point for osp3-poll
///
/// Takes an optional configuration file path as its only argument. Without
/// one, built-in defaults are used (`/dev/ttyUSB0` at 115200 baud).
///
/// # Control Flow
///
/// 1. Load configuration and set up logging
/// 2. Open the serial port and optionally flush stale input
/// 3. Run the poll loop on a blocking thread
/// 4. On Ctrl+C, clear the running flag and wait for the loop to finish
///    its current read
///
/// # Errors
///
/// Returns error if:
/// - The configuration file cannot be loaded
/// - The serial port cannot be opened
/// - A read times out or the device disconnects while polling
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("Failed to load {}", path))?,
        None => Config::default(),
    };

    let guard = init_logging(&config.logging)?;

    info!("osp3-poll v{} starting...", env!("CARGO_PKG_VERSION"));

    let serial = Osp3Serial::open(&config.serial.port, config.serial.baud_rate)?;
    let mut reader = BufferedLineReader::new(serial);
    if config.poll.flush_on_start {
        reader.flush()?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let options = PollOptions::from(&config);
    let (mode, output) = (config.poll.mode, config.poll.output);

    info!("Polling {} ({:?} mode)", config.serial.port, mode);
    info!("Press Ctrl+C to exit");

    let poll_running = Arc::clone(&running);
    let mut poll = tokio::task::spawn_blocking(move || {
        run_poll(reader, options, mode, output, &poll_running)
    });

    tokio::select! {
        result = &mut poll => return result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            running.store(false, Ordering::SeqCst);
        }
    }

    match tokio::time::timeout(shutdown_grace(config.serial.timeout()), poll).await {
        Ok(result) => result?,
        Err(_) => {
            // The blocking read cannot be cancelled; don't wait for it
            warn!("Poll loop still waiting on the device, exiting");
            drop(guard);
            std::process::exit(0);
        }
    }
}
