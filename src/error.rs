//! Error types.

use std::path::PathBuf;
use thiserror::Error;

pub use crate::domain::contact::ParseResponseError;

/// Failure reading or writing persisted state.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Contents could not be encoded or decoded.
    #[error("Serialization error on {}: {source}", path.display())]
    Serde {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

impl LedgerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LedgerError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn serde(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        LedgerError::Serde {
            path: path.into(),
            source,
        }
    }
}

/// Invalid configuration, reported by the builders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A quota was set to zero.
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    /// Minimum delay exceeds maximum delay.
    #[error("min_delay ({min}s) exceeds max_delay ({max}s)")]
    InvalidDelayRange {
        /// Configured minimum, seconds
        min: u64,
        /// Configured maximum, seconds
        max: u64,
    },

    /// A per-hour cap exceeds its per-day counterpart.
    #[error("{hourly} ({hourly_value}) exceeds {daily} ({daily_value})")]
    HourlyExceedsDaily {
        /// Name of the hourly setting
        hourly: &'static str,
        /// Its value
        hourly_value: u32,
        /// Name of the daily setting
        daily: &'static str,
        /// Its value
        daily_value: u32,
    },

    /// Sending hours are out of range or overlap incorrectly.
    #[error("invalid sending hours: window {start}..{end}, quiet {quiet:?}")]
    InvalidSendingHours {
        /// Window start hour
        start: u32,
        /// Window end hour
        end: u32,
        /// Quiet period
        quiet: Option<(u32, u32)>,
    },

    /// Engagement thresholds must lie in 0..=100.
    #[error("{name} ({value}) must be at most 100")]
    ScoreOutOfRange {
        /// Setting name
        name: &'static str,
        /// Configured value
        value: u8,
    },
}

/// Errors that can occur in admission-control operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Persisted state could not be read or written.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Configuration was rejected.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A response type string was not recognised.
    #[error("Invalid response: {0}")]
    Response(#[from] ParseResponseError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
