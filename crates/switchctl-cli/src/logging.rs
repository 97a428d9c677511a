//! Log file setup.
//!
//! The subscriber is returned as a [`Dispatch`] for the caller to attach
//! to its futures; nothing is installed process-wide.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter (`EnvFilter` syntax).
pub const LOG_ENV: &str = "SWITCHCTL_LOG";

/// Default log file, relative to the working directory.
pub const DEFAULT_LOGFILE: &str = "logs/switchctl.log";

fn default_directives(debug: bool) -> &'static str {
    if debug { "debug" } else { "info" }
}

/// Build a subscriber appending plain-text records to `path`.
pub fn file_dispatch(path: &Path, debug: bool) -> anyhow::Result<Dispatch> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug)));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .finish();

    Ok(Dispatch::new(subscriber))
}
