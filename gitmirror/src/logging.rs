//! Tracing setup for the `gitmirror` binary.
//!
//! Events always go to stderr. When a log directory is configured they are
//! also appended, without ANSI colors, to `gitmirror_<YYYY-MM-DD>.log` named
//! after the day the process started.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// File name of the log for `date`.
pub fn log_file_name(date: NaiveDate) -> String {
    format!("gitmirror_{}.log", date.format("%Y-%m-%d"))
}

/// Open (creating if needed) the append-only log file for `date` in `dir`.
pub fn open_log_file(dir: &Path, date: NaiveDate) -> Result<(PathBuf, File)> {
    fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;
    let path = dir.join(log_file_name(date));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;
    Ok((path, file))
}

/// Install the global tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `info` so sync progress is visible.
///
/// # Example
/// ```bash
/// RUST_LOG=gitmirror=debug gitmirror run mirror.toml
/// ```
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_dir {
        Some(dir) => {
            let (_, file) = open_log_file(dir, Local::now().date_naive())?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}
