//! Axum HTTP facade.
//!
//! This crate provides:
//! - Strict request validation ahead of any store work
//! - The uniform error envelope with request ids
//! - Per-client token buckets for uploads and summaries
//! - Prometheus metrics and request logging

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
