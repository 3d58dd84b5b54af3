//! Log subscriber setup for the webhook and its offline subcommands.
//!
//! `serve` with a `[logging] logs_dir` writes rotated JSON files next to a
//! stderr console layer. Every other case logs to stderr only, so stdout
//! carries nothing but command output.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// File name prefix for rotated log files.
pub const LOG_FILE_PREFIX: &str = "toleration-defaults.log";

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Keeps the background file writer alive.
///
/// Dropping it flushes buffered entries, so hold it until shutdown.
pub struct LoggingGuard {
    _worker: WorkerGuard,
}

/// Install the subscriber matching the configured destination.
///
/// Returns a guard only when file logging is active.
///
/// # Errors
///
/// Fails if the logs directory cannot be created or a global subscriber is
/// already installed.
pub fn init(logs_dir: Option<&Path>) -> anyhow::Result<Option<LoggingGuard>> {
    match logs_dir {
        Some(dir) => init_production(dir).map(Some),
        None => init_cli().map(|()| None),
    }
}

/// JSON lines to `{logs_dir}/toleration-defaults.log.YYYY-MM-DD` plus a
/// human-readable stderr layer.
///
/// # Errors
///
/// Fails if the logs directory cannot be created or a global subscriber is
/// already installed.
pub fn init_production(logs_dir: &Path) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create logs directory {}", logs_dir.display()))?;

    let (writer, worker) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("failed to install log subscriber")?;

    Ok(LoggingGuard { _worker: worker })
}

/// Stderr-only logging.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_cli() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
