//! Job status handler.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use vidsum_models::JobId;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Job status response.
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub cache_key: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// GET /api/jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job_id =
        JobId::parse(&job_id).map_err(|_| ApiError::bad_request("malformed job_id"))?;

    let job = state
        .coordinator
        .get_job(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {}", job_id)))?;

    Ok(Json(JobStatusResponse {
        job_id: job.job_id.to_string(),
        cache_key: job.cache_key.to_string(),
        status: job.status.to_string(),
        error: job.error,
        created_at: job.created_at.to_rfc3339(),
        updated_at: job.updated_at.to_rfc3339(),
    }))
}
