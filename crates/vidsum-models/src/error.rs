//! Model error types.

use thiserror::Error;

/// Errors raised while parsing or validating model values.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Invalid source URL: {0}")]
    InvalidUrl(String),
}
