//! Local branch: subtitle, audio and video uploads.

use std::path::{Path, PathBuf};

use tokio::sync::watch;
use tracing::debug;

use vidsum_media::{parse_subtitles, probe_media, MediaError};
use vidsum_models::{FileHash, FileType};

use crate::context::{check_cancel, ProcessingContext, StageContext};
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::validate::is_silent;
use crate::pipeline::{extract_audio_stage, finish_with_summary, transcribe_stage};

/// Run the local branch into the staging directory.
///
/// `source_ref` is the content hash recorded on the cache entry; the
/// stored file is resolved through the upload store and dispatched on its
/// declared file type.
pub async fn run_local_branch(
    ctx: &ProcessingContext,
    staging: &Path,
    source_ref: &str,
    cancel: &watch::Receiver<bool>,
) -> WorkerResult<StageContext> {
    let file_hash = FileHash::parse(source_ref)
        .map_err(|e| WorkerError::invalid_source(format!("bad source ref: {}", e)))?;
    let record = ctx.uploads.get_by_hash(&file_hash).await?;

    let mut stage = StageContext::new(source_ref);
    stage.source_name = Some(record.original_name.clone());
    let stored = PathBuf::from(&record.stored_path);
    check_cancel(cancel)?;

    match record.file_type {
        FileType::Subtitle => {
            run_subtitle_input(staging, &stored, &record.original_name, &mut stage).await?;
        }
        FileType::Audio => {
            probe_duration(&stored, &mut stage).await;
            check_cancel(cancel)?;
            let (wav, rms) = extract_audio_stage(ctx, &stored, staging, cancel).await?;
            stage.audio_path = Some(wav.clone());
            transcribe_input(ctx, &wav, rms, cancel, &mut stage).await?;
        }
        FileType::Video => {
            probe_duration(&stored, &mut stage).await;
            check_cancel(cancel)?;
            let (wav, rms) = extract_audio_stage(ctx, &stored, staging, cancel).await?;
            stage.audio_path = Some(wav.clone());
            transcribe_input(ctx, &wav, rms, cancel, &mut stage).await?;
        }
    }

    finish_with_summary(ctx, staging, &mut stage, cancel).await?;
    Ok(stage)
}

/// Subtitle upload: parse, keep a copy as a bundle artifact. Unlike the URL
/// branch there is no fallback, so parse failures fail the job.
async fn run_subtitle_input(
    staging: &Path,
    stored: &Path,
    original_name: &str,
    stage: &mut StageContext,
) -> WorkerResult<()> {
    let content = tokio::fs::read_to_string(stored).await?;
    let parsed = parse_subtitles(&content)?;
    if parsed.is_empty() {
        return Err(MediaError::Malformed("subtitle file has no cues".to_string()).into());
    }

    let ext = original_name.rsplit_once('.').map(|(_, e)| e).unwrap_or("srt");
    let dest = staging.join(format!("subtitle.{}", ext));
    tokio::fs::copy(stored, &dest).await?;

    debug!(segments = parsed.segments.len(), "Parsed uploaded subtitles");
    stage.subtitle_path = Some(dest);
    stage.subtitles = Some(parsed);
    Ok(())
}

async fn transcribe_input(
    ctx: &ProcessingContext,
    wav: &Path,
    rms: Option<f64>,
    cancel: &watch::Receiver<bool>,
    stage: &mut StageContext,
) -> WorkerResult<()> {
    check_cancel(cancel)?;
    let transcript = transcribe_stage(ctx, wav, cancel).await?;
    stage.is_silent = is_silent(
        rms,
        ctx.config.rms_max,
        transcript.token_count(),
        stage.duration,
        ctx.config.tokens_per_min_min,
    );
    stage.transcript = Some(transcript);
    Ok(())
}

async fn probe_duration(path: &Path, stage: &mut StageContext) {
    if let Ok(info) = probe_media(path).await {
        stage.duration = (info.duration > 0.0).then_some(info.duration);
    }
}
