//! Reference host for the tile kernel: game registry, file-backed battery
//! saves, replay traces, JSON config and PNG screenshots.

pub mod config;
pub mod file_nv;
pub mod registry;
pub mod replay;
pub mod screenshot;
pub mod session;

use std::path::PathBuf;
use tile_core::logging::{LogCategory, LogConfig, LogLevel};

#[derive(thiserror::Error, Debug)]
pub enum HostError {
    #[error("unknown game '{0}' (try --list)")]
    UnknownGame(String),
    #[error("bad log level '{0}'")]
    BadLogLevel(String),
    #[error("bad log category '{0}'")]
    BadLogCategory(String),
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: png::EncodingError,
    },
}

/// Apply a log filter to the kernel logger.
///
/// A filter is a comma-separated list of `level` (global) and
/// `category=level` (override) items, e.g. `warn,video=trace`.
pub fn apply_log_filter(filter: &str) -> Result<(), HostError> {
    let config = LogConfig::global();
    for item in filter.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match item.split_once('=') {
            Some((cat, level)) => {
                let category = LogCategory::from_name(cat)
                    .ok_or_else(|| HostError::BadLogCategory(cat.to_string()))?;
                config.set_level(category, parse_level(level)?);
            }
            None => config.set_global_level(parse_level(item)?),
        }
    }
    Ok(())
}

fn parse_level(s: &str) -> Result<LogLevel, HostError> {
    LogLevel::from_str(s).ok_or_else(|| HostError::BadLogLevel(s.to_string()))
}
