//! Engine adapter error types.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from external ASR/LLM engines.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Engine returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Engine process failed: {0}")]
    Process(String),

    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),

    #[error("Engine not configured: {0}")]
    NotConfigured(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::Process(message.into())
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Whether a retry within the same stage can plausibly succeed.
    ///
    /// Only transport-level failures are transient; API rejections and
    /// malformed responses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            EngineError::Api { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}
