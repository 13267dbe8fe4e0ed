//! Error types for proxima.

use thiserror::Error;

/// Errors that can occur while building or querying an index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    /// Invalid parameter value (k = 0, nprobe > nlist, k > L, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between query and index.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Empty index (no vectors).
    #[error("index is empty")]
    EmptyIndex,

    /// A metadata key was missing when loading a persisted index.
    #[error("missing metadata: {0}")]
    MissingMetadata(String),

    /// A metadata value has a datatype the core cannot decode.
    #[error("unsupported datatype for metadata key {0}")]
    UnsupportedDatatype(String),

    /// Persistence failure (I/O, serialization).
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl From<crate::persistence::PersistenceError> for SearchError {
    fn from(e: crate::persistence::PersistenceError) -> Self {
        SearchError::Persistence(e.to_string())
    }
}

/// Result type alias for proxima operations.
pub type Result<T> = std::result::Result<T, SearchError>;
