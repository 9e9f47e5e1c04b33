//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::cache::{delete_cache_entry, get_cache_entry, lookup_cache};
use crate::handlers::health::health;
use crate::handlers::jobs::get_job;
use crate::handlers::summaries::create_summary;
use crate::handlers::uploads::upload_file;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let upload_limiter = Arc::new(RateLimiterCache::per_minute(
        state.config.upload_rate_per_minute,
    ));
    let summary_limiter = Arc::new(RateLimiterCache::per_minute(
        state.config.summary_rate_per_minute,
    ));

    // Multipart framing overhead on top of the payload cap
    let upload_body_limit = (state.uploads.config().max_file_size
        + state.uploads.config().grace_bytes) as usize
        + 1024 * 1024;

    let upload_routes = Router::new()
        .route("/uploads", post(upload_file))
        .layer(DefaultBodyLimit::max(upload_body_limit))
        .layer(middleware::from_fn_with_state(
            upload_limiter,
            rate_limit_middleware,
        ));

    let summary_routes = Router::new()
        .route("/summaries", post(create_summary))
        .route("/cache/lookup", post(lookup_cache))
        .layer(middleware::from_fn_with_state(
            summary_limiter,
            rate_limit_middleware,
        ));

    let read_routes = Router::new()
        .route("/jobs/:job_id", get(get_job))
        .route("/cache/:cache_key", get(get_cache_entry))
        .route("/cache/:cache_key", delete(delete_cache_entry));

    let api_routes = upload_routes.merge(summary_routes).merge(read_routes);

    let health_routes = Router::new().route("/health", get(health));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
