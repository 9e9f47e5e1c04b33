//! Summary request handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use vidsum_cache::LocalSourceRef;
use vidsum_models::{is_http_url, CacheEntry, FileHash, FileId, JobRecord, SourceType};
use vidsum_store::GetOrCreateOutcome;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

// ============================================================================
// Types
// ============================================================================

/// Source selector shared by the summaries and lookup endpoints.
#[derive(Debug, Deserialize)]
pub struct SourceRequest {
    pub source_type: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub file_hash: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

/// A validated source.
#[derive(Debug)]
pub enum ValidatedSource {
    Url(String),
    Local(LocalSourceRef),
}

impl SourceRequest {
    /// Enforce the combination rules before any store work:
    /// - `url` requires `source_url` and forbids local identifiers
    /// - `local` forbids `source_url` and takes exactly one of
    ///   `file_id` / `file_hash`
    pub fn validate(&self) -> Result<ValidatedSource, ApiError> {
        let source_type = SourceType::parse(&self.source_type).ok_or_else(|| {
            ApiError::constraint(format!("unknown source_type: {}", self.source_type))
        })?;

        match source_type {
            SourceType::Url => {
                if self.file_id.is_some() || self.file_hash.is_some() {
                    return Err(ApiError::constraint(
                        "source_type 'url' does not take file_id or file_hash",
                    ));
                }
                let url = self
                    .source_url
                    .as_deref()
                    .ok_or_else(|| ApiError::constraint("source_type 'url' requires source_url"))?;
                if !is_http_url(url) {
                    return Err(ApiError::constraint(format!(
                        "source_url is not a valid http/https URL: {}",
                        url
                    )));
                }
                Ok(ValidatedSource::Url(url.to_string()))
            }
            SourceType::Local => {
                if self.source_url.is_some() {
                    return Err(ApiError::constraint(
                        "source_type 'local' does not take source_url",
                    ));
                }
                match (self.file_id.as_deref(), self.file_hash.as_deref()) {
                    (Some(_), Some(_)) => Err(ApiError::constraint(
                        "exactly one of file_id or file_hash, not both",
                    )),
                    (None, None) => Err(ApiError::constraint(
                        "source_type 'local' requires file_id or file_hash",
                    )),
                    (Some(file_id), None) => {
                        let file_id = FileId::parse(file_id)
                            .map_err(|_| ApiError::constraint("malformed file_id"))?;
                        Ok(ValidatedSource::Local(LocalSourceRef::Id(file_id)))
                    }
                    (None, Some(file_hash)) => {
                        let file_hash = FileHash::parse(file_hash)
                            .map_err(|_| ApiError::constraint("malformed file_hash"))?;
                        Ok(ValidatedSource::Local(LocalSourceRef::Hash(file_hash)))
                    }
                }
            }
        }
    }
}

/// Summary response, for both hits and accepted jobs.
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub cache_key: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub profile_version: String,
}

impl SummaryResponse {
    fn from_entry(entry: CacheEntry, job: Option<&JobRecord>) -> Self {
        Self {
            cache_key: entry.cache_key.to_string(),
            status: entry.status.to_string(),
            job_id: job.map(|j| j.job_id.to_string()),
            summary_text: entry.summary_text,
            source_name: entry.source_name,
            error: entry.error,
            profile_version: entry.profile_version,
        }
    }
}

// ============================================================================
// Handler
// ============================================================================

/// POST /api/summaries
///
/// Get-or-create: 200 with the summary on a valid cache hit (or a recorded
/// terminal failure), 202 with the job id otherwise.
pub async fn create_summary(
    State(state): State<AppState>,
    Json(request): Json<SourceRequest>,
) -> ApiResult<(StatusCode, Json<SummaryResponse>)> {
    let source = request.validate()?;

    let outcome = match &source {
        ValidatedSource::Url(url) => {
            state
                .coordinator
                .get_or_create_url(url, request.refresh)
                .await?
        }
        ValidatedSource::Local(local) => {
            state
                .coordinator
                .get_or_create_local(local, request.refresh)
                .await?
        }
    };

    let source_type = match &source {
        ValidatedSource::Url(_) => "url",
        ValidatedSource::Local(_) => "local",
    };

    let (status, response) = match outcome {
        GetOrCreateOutcome::Hit(entry) => {
            metrics::record_summary_request(source_type, "hit");
            (StatusCode::OK, SummaryResponse::from_entry(entry, None))
        }
        GetOrCreateOutcome::Failed(entry) => {
            metrics::record_summary_request(source_type, "failed");
            (StatusCode::OK, SummaryResponse::from_entry(entry, None))
        }
        GetOrCreateOutcome::InFlight(entry, job) => {
            metrics::record_summary_request(source_type, "in_flight");
            (
                StatusCode::ACCEPTED,
                SummaryResponse::from_entry(entry, Some(&job)),
            )
        }
        GetOrCreateOutcome::Created(entry, job) => {
            metrics::record_summary_request(source_type, "created");
            (
                StatusCode::ACCEPTED,
                SummaryResponse::from_entry(entry, Some(&job)),
            )
        }
    };

    Ok((status, Json(response)))
}
