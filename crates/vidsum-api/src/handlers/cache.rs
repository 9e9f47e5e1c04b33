//! Cache inspection handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use vidsum_models::{CacheEntry, CacheKey};

use crate::error::{ApiError, ApiResult};
use crate::handlers::summaries::{SourceRequest, ValidatedSource};
use crate::state::AppState;

/// Lookup response: whether the source has an entry and if it is servable.
#[derive(Debug, Serialize)]
pub struct LookupResponse {
    pub cache_key: String,
    pub found: bool,
    /// A valid hit would be served synchronously
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_text: Option<String>,
}

/// POST /api/cache/lookup
///
/// Read-only probe: never creates entries or jobs.
pub async fn lookup_cache(
    State(state): State<AppState>,
    Json(request): Json<SourceRequest>,
) -> ApiResult<Json<LookupResponse>> {
    let source = request.validate()?;

    let result = match &source {
        ValidatedSource::Url(url) => state.coordinator.lookup_url(url).await?,
        ValidatedSource::Local(local) => state.coordinator.lookup_local(local).await?,
    };

    let valid = result.bundle_valid
        && result
            .entry
            .as_ref()
            .map(|e| e.is_presentable_hit(state.coordinator.profile_version()))
            .unwrap_or(false);

    Ok(Json(LookupResponse {
        cache_key: result.cache_key.to_string(),
        found: result.entry.is_some(),
        valid,
        status: result.entry.as_ref().map(|e| e.status.to_string()),
        summary_text: result.entry.and_then(|e| e.summary_text).filter(|_| valid),
    }))
}

/// GET /api/cache/:cache_key
pub async fn get_cache_entry(
    State(state): State<AppState>,
    Path(cache_key): Path<String>,
) -> ApiResult<Json<CacheEntry>> {
    let cache_key = parse_cache_key(&cache_key)?;
    let entry = state
        .coordinator
        .get_entry(&cache_key)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("cache entry {}", cache_key)))?;
    Ok(Json(entry))
}

/// Delete response.
#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// DELETE /api/cache/:cache_key
///
/// Cancels in-flight work for the key and removes the entry, its jobs and
/// its bundle. Future requests with the same key recreate from scratch.
pub async fn delete_cache_entry(
    State(state): State<AppState>,
    Path(cache_key): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let cache_key = parse_cache_key(&cache_key)?;
    if !state.coordinator.delete(&cache_key).await? {
        return Err(ApiError::not_found(format!("cache entry {}", cache_key)));
    }
    Ok(Json(DeleteResponse { deleted: true }))
}

fn parse_cache_key(raw: &str) -> Result<CacheKey, ApiError> {
    CacheKey::parse(raw).map_err(|_| ApiError::bad_request("malformed cache_key"))
}
