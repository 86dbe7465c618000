//! Error types for deviceprint-core

use thiserror::Error;

/// Main error type for the deviceprint-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Local store error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Device API transport error
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type alias for deviceprint-core
pub type Result<T> = std::result::Result<T, Error>;
