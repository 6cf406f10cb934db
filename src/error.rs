//! # Error Types
//!
//! Custom error types for Serial DAQ using `thiserror`.

use thiserror::Error;

/// Main error type for Serial DAQ
#[derive(Debug, Error)]
pub enum DaqError {
    /// Device produced a byte sequence that does not decode as UTF-8 text.
    /// Recovered locally: the chunk is dropped and the loop keeps polling.
    #[error("decode error: {0}")]
    Decode(String),

    /// A CSV record had the wrong field count or a non-numeric field
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Serial transport errors
    #[error("serial error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Serial DAQ
pub type Result<T> = std::result::Result<T, DaqError>;
