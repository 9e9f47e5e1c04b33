//! Cache coordination error types.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors surfaced by the coordinator.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("Store error: {0}")]
    Store(#[from] vidsum_store::StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] vidsum_storage::StorageError),
}

impl CacheError {
    pub fn invalid_source(msg: impl Into<String>) -> Self {
        Self::InvalidSource(msg.into())
    }

    /// Whether this maps to a missing referenced object rather than a
    /// malformed request.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CacheError::Storage(vidsum_storage::StorageError::NotFound(_))
                | CacheError::Store(vidsum_store::StoreError::NotFound(_))
        )
    }
}
