//! Error types for persistence operations.

use thiserror::Error;

/// Errors that can occur while reading or writing a persisted group.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// I/O error (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (bincode, serde_json).
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Manifest is missing or malformed.
    #[error("format error: {0}")]
    Format(String),

    /// A member array is not present in the group.
    #[error("member not found: {0}")]
    MemberNotFound(String),
}

impl From<bincode::Error> for PersistenceError {
    fn from(e: bincode::Error) -> Self {
        Self::Serialization(format!("bincode error: {e}"))
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(format!("json error: {e}"))
    }
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;
