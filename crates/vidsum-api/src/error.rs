//! API error types and the uniform error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use vidsum_cache::CacheError;
use vidsum_models::ErrorKind;
use vidsum_storage::StorageError;

pub type ApiResult<T> = Result<T, ApiError>;

tokio::task_local! {
    /// Request id for the in-flight request, scoped by the request-id
    /// middleware so the envelope can echo it from anywhere.
    pub static REQUEST_ID: String;
}

#[derive(Debug, Error)]
pub enum ApiError {
    /// Structurally broken request (bad syntax, missing field)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Well-formed but constraint-violating request
    #[error("Invalid argument: {0}")]
    Constraint(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upload timed out")]
    UploadTimeout,

    #[error("Payload too large (limit {0} bytes)")]
    TooLarge(u64),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Rate limited")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Store error: {0}")]
    Store(#[from] vidsum_store::StoreError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Constraint(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UploadTimeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> ErrorKind {
        match self {
            ApiError::BadRequest(_) | ApiError::Constraint(_) => ErrorKind::InvalidArgument,
            ApiError::NotFound(_) => ErrorKind::NotFound,
            ApiError::UploadTimeout => ErrorKind::Timeout,
            ApiError::TooLarge(_) => ErrorKind::TooLarge,
            ApiError::UnsupportedType(_) => ErrorKind::UnsupportedType,
            ApiError::RateLimited { .. } => ErrorKind::TooManyRequests,
            ApiError::Internal(_) | ApiError::Store(_) => ErrorKind::Internal,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidName(name) => ApiError::Constraint(format!("file name: {}", name)),
            StorageError::UnsupportedType(what) => ApiError::UnsupportedType(what),
            StorageError::TooLarge { limit } => ApiError::TooLarge(limit),
            StorageError::Timeout => ApiError::UploadTimeout,
            StorageError::TooManyRequests => ApiError::RateLimited {
                retry_after_secs: 10,
            },
            StorageError::NotFound(what) => ApiError::NotFound(what),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::InvalidSource(msg) => ApiError::Constraint(msg),
            CacheError::Storage(storage) => ApiError::from(storage),
            CacheError::Store(store) => ApiError::Store(store),
        }
    }
}

/// The envelope every non-2xx response carries.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub message: String,
    pub code: ErrorKind,
    pub status: u16,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = REQUEST_ID.try_with(|id| id.clone()).unwrap_or_default();

        // Internal details stay out of production responses
        let message = match &self {
            ApiError::Internal(_) | ApiError::Store(_)
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" =>
            {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let detail = match &self {
            ApiError::RateLimited { retry_after_secs } => {
                Some(format!("retry after {}s", retry_after_secs))
            }
            _ => None,
        };

        let envelope = ErrorEnvelope {
            message,
            code: self.code(),
            status: status.as_u16(),
            request_id,
            detail,
            errors: None,
        };

        let mut response = (status, Json(envelope)).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}
