//! Tracing subscriber setup for the binary.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Local;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Default filter directive for the given verbosity flags.
///
/// Priority: `RUST_LOG` (applied by the caller) > quiet > verbose > info.
pub(crate) fn default_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// `<logs_dir>/crawler_<YYYYmmdd_HHMMSS>.log`
pub(crate) fn log_file_path(logs_dir: &Path) -> PathBuf {
    logs_dir.join(format!("crawler_{}.log", Local::now().format("%Y%m%d_%H%M%S")))
}

/// Installs the global subscriber: stderr always, plus `log_file` without ANSI when given.
pub(crate) fn init_tracing(verbose: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose, quiet)));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory '{}'", parent.display())
                })?;
            }
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file '{}'", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}
