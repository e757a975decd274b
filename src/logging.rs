//! Tracing subscriber setup for the binary.
//!
//! Console output goes to stderr so answers on stdout stay clean. When a log
//! directory is given, the same events are also appended (without ANSI
//! colours) to a per-day file named `query_log_YYYYMMDD.log`.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::NaiveDate;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("tracing subscriber already set: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "insights_desk=info,insights=info",
        1 => "insights_desk=debug,insights=debug",
        _ => "insights_desk=trace,insights=trace",
    }
}

pub fn log_file_name(date: NaiveDate) -> String {
    format!("query_log_{}.log", date.format("%Y%m%d"))
}

/// Open (or create) today's log file under `dir`, appending.
pub fn open_daily_log(dir: &Path) -> Result<(PathBuf, File), LoggingError> {
    let path = dir.join(log_file_name(chrono::Local::now().date_naive()));
    let io_err = |source| LoggingError::Io {
        path: path.clone(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_err)?;
    Ok((path, file))
}

/// Install the global subscriber. Returns the path of the file log, if any.
pub fn init_tracing(verbosity: u8, log_dir: Option<&Path>) -> Result<Option<PathBuf>, LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    let (log_path, file_layer) = match log_dir {
        Some(dir) => {
            let (path, file) = open_daily_log(dir)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(path), Some(layer))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;

    if let Some(path) = &log_path {
        tracing::debug!(path = %path.display(), "file logging enabled");
    }
    Ok(log_path)
}
