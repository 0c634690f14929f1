//! Error types for the limiter.

use thiserror::Error;

use crate::store::StoreError;

/// Main error type for limiter operations.
#[derive(Error, Debug)]
pub enum LimiterError {
    /// The logical key was empty.
    #[error("Key name is empty")]
    EmptyKey,

    /// Period outside `[1, MAX_PERIOD_SECS]`.
    #[error("Invalid period {period}s for key '{key}'")]
    InvalidPeriod { key: String, period: u64 },

    /// Limit outside `[1, MAX_LIMIT]`.
    #[error("Invalid limit {limit} for key '{key}'")]
    InvalidLimit { key: String, limit: u64 },

    /// The derived spacing between events is too small to enforce.
    #[error("Limit {limit} is too high for a {period}s period (burst quantum {quantum}us)")]
    BurstTooSmall { period: u64, limit: u64, quantum: i64 },

    /// The evaluator script could not be registered with the store.
    #[error("Could not store the script in the remote store: {0}")]
    ScriptLoad(#[source] StoreError),

    /// Remote store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for limiter operations.
pub type Result<T> = std::result::Result<T, LimiterError>;
