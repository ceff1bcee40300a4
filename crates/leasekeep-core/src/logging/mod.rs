//! Tracing subscriber setup for the daemon
//!
//! Everything in the crate logs through `tracing`; this installs the one
//! subscriber the process uses. `LEASEKEEP_LOG` (an `EnvFilter` directive
//! such as `leasekeep_core=debug`) wins over the configured level.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

use crate::fs_atomic::ensure_private_dir;

/// Environment variable holding a filter directive
pub const LOG_ENV: &str = "LEASEKEEP_LOG";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Logging already initialised: {0}")]
    Init(#[from] TryInitError),
}

/// Install the global subscriber
///
/// Logs go to `log_file` (appended, no ANSI) when given, else to stderr.
/// An unparsable `level` falls back to `info`.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<(), LoggingError> {
    let filter = filter_for(level);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                ensure_private_dir(parent).map_err(|e| LoggingError::Open {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| LoggingError::Open {
                    path: path.to_path_buf(),
                    source: e,
                })?;

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(file)
                        .with_ansi(false),
                )
                .try_init()?;
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}

/// Conventional log location when running detached
pub fn default_log_path() -> PathBuf {
    crate::config::base_dir().join("daemon.log")
}

fn filter_for(level: &str) -> EnvFilter {
    if let Ok(directive) = std::env::var(LOG_ENV) {
        if let Ok(filter) = EnvFilter::try_new(&directive) {
            return filter;
        }
    }
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}
