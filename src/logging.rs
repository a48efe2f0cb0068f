//! Tracing subscriber setup.
//!
//! The TUI owns the terminal, so log lines go to `tiki.log` next to the
//! executable. When that file cannot be opened they go to standard error.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result};

pub const LOG_FILE: &str = "tiki.log";

/// Accepted values for `--log-level` and `log_level`.
pub const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Where log output ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
}

pub fn is_valid_level(level: &str) -> bool {
    LEVELS.contains(&level.trim().to_ascii_lowercase().as_str())
}

/// Filter directive: `--log-level`, then `RUST_LOG`, then the configured level.
///
/// Oversized or blank `RUST_LOG` values are ignored.
pub fn resolve_directive(flag: Option<&str>, env: Option<&str>, configured: &str) -> Result<String> {
    if let Some(level) = flag {
        if !is_valid_level(level) {
            return Err(Error::InvalidArgument(format!(
                "unknown log level '{level}' (expected one of {})",
                LEVELS.join(", ")
            )));
        }
        return Ok(level.trim().to_ascii_lowercase());
    }
    if let Some(raw) = env.map(str::trim) {
        if !raw.is_empty() && raw.len() <= 4096 && EnvFilter::try_new(raw).is_ok() {
            return Ok(raw.to_string());
        }
    }
    let configured = configured.trim().to_ascii_lowercase();
    if is_valid_level(&configured) {
        Ok(configured)
    } else {
        Ok("info".to_string())
    }
}

fn log_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(LOG_FILE))
}

fn open_log(path: &Path) -> Option<File> {
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(flag: Option<&str>, configured: &str) -> Result<LogTarget> {
    let env = std::env::var("RUST_LOG").ok();
    let directive = resolve_directive(flag, env.as_deref(), configured)?;
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let file = log_path().and_then(|path| open_log(&path).map(|file| (path, file)));
    let target = match file {
        Some((path, file)) => {
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(filter)
                .try_init();
            LogTarget::File(path)
        }
        None => {
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .try_init();
            LogTarget::Stderr
        }
    };
    tracing::debug!(directive = %directive, ?target, "logging initialized");
    Ok(target)
}
