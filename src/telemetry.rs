use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Installs the global subscriber. Output goes to the log file because the
/// terminal belongs to the UI; without a file, logging stays off. `RUST_LOG`
/// takes precedence over the configured level.
pub fn init(logging: &LoggingConfig) -> Result<Option<PathBuf>> {
    let Some(path) = logging.file.clone() else {
        return Ok(None);
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("telemetry: create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("telemetry: open log file {}", path.display()))?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(&logging.level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow!("telemetry: failed to install tracing subscriber: {err}"))?;

    Ok(Some(path))
}

fn level_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level.trim())
        .with_context(|| format!("telemetry: invalid log level {level:?}"))
}
