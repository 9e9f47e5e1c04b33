//! Worker error types.

use thiserror::Error;

use vidsum_engines::EngineError;
use vidsum_media::MediaError;
use vidsum_models::ErrorKind;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors raised while running the pipeline.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Storage error: {0}")]
    Storage(#[from] vidsum_storage::StorageError),

    #[error("Store error: {0}")]
    Store(#[from] vidsum_store::StoreError),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Timed out waiting for the {0} stage slot")]
    StageWait(&'static str),

    #[error("Engine not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn invalid_source(msg: impl Into<String>) -> Self {
        Self::InvalidSource(msg.into())
    }

    /// The abstract kind recorded on the failed entry and job.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::Cancelled | WorkerError::Media(MediaError::Cancelled) => {
                ErrorKind::Cancelled
            }
            WorkerError::StageWait(_)
            | WorkerError::Media(MediaError::Timeout(_)) => ErrorKind::Timeout,
            WorkerError::Media(MediaError::TooLarge { .. }) => ErrorKind::TooLarge,
            WorkerError::Media(MediaError::UnsupportedFormat(_))
            | WorkerError::Media(MediaError::Malformed(_)) => ErrorKind::UnsupportedType,
            WorkerError::Media(_) | WorkerError::Engine(_) | WorkerError::NotConfigured(_) => {
                ErrorKind::Upstream
            }
            WorkerError::Storage(vidsum_storage::StorageError::NotFound(_)) => ErrorKind::NotFound,
            WorkerError::InvalidSource(_) => ErrorKind::InvalidArgument,
            WorkerError::Storage(_)
            | WorkerError::Store(_)
            | WorkerError::Io(_)
            | WorkerError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The `<kind>: <message>` string stored on failed entries.
    pub fn record_string(&self) -> String {
        match self {
            WorkerError::Cancelled | WorkerError::Media(MediaError::Cancelled) => {
                ErrorKind::Cancelled.as_str().to_string()
            }
            other => format!("{}: {}", other.kind(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(WorkerError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(
            WorkerError::Media(MediaError::Cancelled).kind(),
            ErrorKind::Cancelled
        );
        assert_eq!(
            WorkerError::Media(MediaError::Timeout(10)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            WorkerError::Media(MediaError::download_failed("x")).kind(),
            ErrorKind::Upstream
        );
        assert_eq!(WorkerError::StageWait("transcribe").kind(), ErrorKind::Timeout);
        assert_eq!(WorkerError::internal("boom").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_record_string_shape() {
        assert_eq!(WorkerError::Cancelled.record_string(), "cancelled");
        let record = WorkerError::Media(MediaError::download_failed("dns")).record_string();
        assert!(record.starts_with("upstream: "), "got {}", record);
    }
}
