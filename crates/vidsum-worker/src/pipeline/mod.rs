//! The fixed two-branch pipeline.
//!
//! Shared stage helpers live here; the branch compositions are in
//! [`url`] and [`local`]. Stages communicate through [`StageContext`] and
//! observe cancellation at every boundary.

pub mod local;
pub mod summarize;
pub mod url;
pub mod validate;

pub use local::run_local_branch;
pub use summarize::{summarize_text, NO_SPEECH_MARKER};
pub use url::run_url_branch;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::watch;
use tracing::warn;

use vidsum_engines::{EngineError, Transcript};
use vidsum_media::{extract_audio, measure_rms, MediaError};

use crate::context::{check_cancel, ProcessingContext, StageContext};
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{with_retry, RetryConfig};

/// Extract audio to wav under the transcode cap and measure its loudness.
///
/// Returns the wav path and the RMS amplitude (unknown when measurement
/// failed; silence detection then falls back to the token-rate signal).
pub(crate) async fn extract_audio_stage(
    ctx: &ProcessingContext,
    input: &Path,
    staging: &Path,
    cancel: &watch::Receiver<bool>,
) -> WorkerResult<(PathBuf, Option<f64>)> {
    let _permit = ctx
        .acquire_stage(&ctx.transcode_semaphore, "transcode")
        .await?;
    check_cancel(cancel)?;

    let wav = staging.join("audio.wav");
    extract_audio(
        input,
        &wav,
        ctx.config.transcode_timeout,
        Some(cancel.clone()),
    )
    .await?;

    let rms = match measure_rms(&wav, ctx.config.transcode_timeout, Some(cancel.clone())).await {
        Ok(rms) => Some(rms),
        Err(MediaError::Cancelled) => return Err(WorkerError::Cancelled),
        Err(e) => {
            warn!("Loudness measurement failed, skipping RMS signal: {}", e);
            None
        }
    };
    Ok((wav, rms))
}

/// Transcribe a wav under the transcribe cap with bounded retry.
pub(crate) async fn transcribe_stage(
    ctx: &ProcessingContext,
    audio: &Path,
    cancel: &watch::Receiver<bool>,
) -> WorkerResult<Transcript> {
    let transcriber = ctx.transcriber.as_ref().ok_or_else(|| {
        WorkerError::NotConfigured("no transcriber (set ASR_URL or ASR_COMMAND)".to_string())
    })?;

    let _permit = ctx
        .acquire_stage(&ctx.transcribe_semaphore, "transcribe")
        .await?;
    check_cancel(cancel)?;

    let retry = RetryConfig::new("transcribe");
    let transcript = with_retry(
        &retry,
        || transcriber.transcribe(audio),
        EngineError::is_transient,
    )
    .await?;
    Ok(transcript)
}

#[derive(Serialize)]
struct SummaryArtifact<'a> {
    summary_text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_name: Option<&'a str>,
    is_silent: bool,
    generated_at: chrono::DateTime<chrono::Utc>,
}

/// Final shared stage: summarize the collected text and write the
/// `summary.json` / `asr.json` artifacts into the staging directory.
pub(crate) async fn finish_with_summary(
    ctx: &ProcessingContext,
    staging: &Path,
    stage: &mut StageContext,
    cancel: &watch::Receiver<bool>,
) -> WorkerResult<()> {
    check_cancel(cancel)?;

    // A silent source still gets summarized, against the marker, so every
    // completed entry carries a non-empty summary.
    let content = match stage.transcript_text() {
        Some(text) if !stage.is_silent => text,
        _ => NO_SPEECH_MARKER.to_string(),
    };
    let summary = summarize_text(ctx, &content, cancel).await?;

    let artifact = SummaryArtifact {
        summary_text: &summary,
        source_name: stage.source_name.as_deref(),
        is_silent: stage.is_silent,
        generated_at: chrono::Utc::now(),
    };
    tokio::fs::write(
        staging.join("summary.json"),
        serde_json::to_vec_pretty(&artifact)
            .map_err(|e| WorkerError::internal(e.to_string()))?,
    )
    .await?;

    if let Some(transcript) = &stage.transcript {
        tokio::fs::write(
            staging.join("asr.json"),
            serde_json::to_vec_pretty(transcript)
                .map_err(|e| WorkerError::internal(e.to_string()))?,
        )
        .await?;
    }

    stage.summary_text = Some(summary);
    Ok(())
}
