//! Error types for loghtml

use thiserror::Error;

/// Main error type for loghtml operations.
///
/// Only constructors and configuration loading surface these to callers.
/// The write path reports failures on the `tracing` diagnostic channel and
/// carries on.
#[derive(Error, Debug)]
pub enum LogError {
    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration value rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Rotation could not archive the active document
    #[error("Rotation failed: {0}")]
    Rotation(String),

    /// Operation attempted after `close()`
    #[error("Log writer is closed")]
    Closed,
}

/// Result type alias using LogError
pub type LogResult<T> = Result<T, LogError>;
