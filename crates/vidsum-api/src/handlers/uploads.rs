//! Upload handler.

use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use bytes::Bytes;
use futures_util::stream;
use tracing::debug;

use vidsum_models::UploadRecord;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// POST /api/uploads
///
/// Multipart upload with the content in a `file` field. The body streams
/// straight into the upload store; it is never buffered whole.
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadRecord>)> {
    let declared_size = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        let declared_name = field.file_name().unwrap_or_default().to_string();
        let declared_mime = field.content_type().unwrap_or_default().to_string();

        // Adapt the multipart field into the chunk stream the store reads
        let body = stream::unfold(field, |mut field| async move {
            match field.chunk().await {
                Ok(Some(chunk)) => Some((Ok::<Bytes, std::io::Error>(chunk), field)),
                Ok(None) => None,
                Err(e) => Some((Err(std::io::Error::other(e)), field)),
            }
        });

        let record = state
            .uploads
            .put(Box::pin(body), &declared_name, &declared_mime, declared_size)
            .await?;

        metrics::record_upload(record.file_type.as_str(), record.size);
        return Ok((StatusCode::CREATED, Json(record)));
    }

    Err(ApiError::bad_request("missing multipart field 'file'"))
}
