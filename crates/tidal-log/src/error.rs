//! Error types for the observation log.

use thiserror::Error;

/// Result type alias for observation log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur while reading or appending observations.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to open observation log: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}
