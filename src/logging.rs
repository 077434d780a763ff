//! Log configuration for runs and trials
//!
//! One process-global subscriber covers a fixed training run (and the search
//! driver's study-level log). Search trials additionally get their own log
//! file through a scoped subscriber, so each trial directory is
//! self-contained.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the process-global subscriber writing to `log_file`.
///
/// Must run once, before any other thread emits events; calling it twice is
/// an error (the global default cannot be replaced).
pub fn init_run_logging(log_file: &Path) -> Result<()> {
    let file = open_log_file(log_file)?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing global subscriber: {e}"))?;
    Ok(())
}

/// Run `f` with all tracing events on this thread routed to `log_file`.
///
/// Used per search trial: events emitted inside the closure land in the
/// trial's own log instead of the study-level one.
pub fn scoped_file_logging<T>(log_file: &Path, f: impl FnOnce() -> T) -> Result<T> {
    let file = open_log_file(log_file)?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .finish();
    Ok(tracing::subscriber::with_default(subscriber, f))
}
