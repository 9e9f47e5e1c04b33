//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the upload and bundle stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("File exceeds the maximum size of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Upload I/O timed out")]
    Timeout,

    #[error("Too many concurrent uploads")]
    TooManyRequests,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),

    #[error("Store error: {0}")]
    Store(#[from] vidsum_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn unsupported_type(what: impl Into<String>) -> Self {
        Self::UnsupportedType(what.into())
    }

    pub fn invalid_bundle(msg: impl Into<String>) -> Self {
        Self::InvalidBundle(msg.into())
    }
}
