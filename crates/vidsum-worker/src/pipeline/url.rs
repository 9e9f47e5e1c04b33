//! URL branch: subtitle-first, fall back to download / extract / transcribe.

use std::path::Path;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use vidsum_media::{
    download_subtitles, download_video, fetch_metadata, parse_subtitles, probe_media, MediaError,
};

use crate::context::{check_cancel, ProcessingContext, StageContext};
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::validate::{is_silent, subtitles_are_valid};
use crate::pipeline::{extract_audio_stage, finish_with_summary, transcribe_stage};

/// Run the URL branch into the staging directory.
pub async fn run_url_branch(
    ctx: &ProcessingContext,
    staging: &Path,
    url: &str,
    cancel: &watch::Receiver<bool>,
) -> WorkerResult<StageContext> {
    let mut stage = StageContext::new(url);
    check_cancel(cancel)?;

    // Stage 1: metadata. Failure is tolerated; the branch can still
    // download blind.
    match fetch_metadata(url, ctx.config.probe_timeout).await {
        Ok(meta) => {
            stage.duration = meta.duration;
            stage.source_name = meta.title;
            debug!(
                duration = ?stage.duration,
                has_subtitles = meta.has_subtitles,
                "Fetched source metadata"
            );
        }
        Err(e) => warn!("Metadata probe failed: {}", e),
    }

    // Stage 2: subtitles first.
    check_cancel(cancel)?;
    try_subtitles(ctx, staging, url, cancel, &mut stage).await?;

    // Stages 3-4: only when subtitles did not win.
    if stage.subtitles.is_none() {
        check_cancel(cancel)?;
        let video = staging.join("video.mp4");
        download_video(
            url,
            &video,
            ctx.config.video_max_size,
            ctx.config.download_timeout,
            Some(cancel.clone()),
        )
        .await?;
        if stage.duration.is_none() {
            if let Ok(info) = probe_media(&video).await {
                stage.duration = (info.duration > 0.0).then_some(info.duration);
            }
        }
        stage.video_path = Some(video.clone());

        check_cancel(cancel)?;
        let (wav, rms) = extract_audio_stage(ctx, &video, staging, cancel).await?;
        stage.audio_path = Some(wav.clone());

        check_cancel(cancel)?;
        let transcript = transcribe_stage(ctx, &wav, cancel).await?;
        stage.is_silent = is_silent(
            rms,
            ctx.config.rms_max,
            transcript.token_count(),
            stage.duration,
            ctx.config.tokens_per_min_min,
        );
        if stage.is_silent {
            info!("Source classified as silent (rms {:?})", rms);
        }
        stage.transcript = Some(transcript);
    }

    // Stages 5-6: summarize and emit artifacts.
    finish_with_summary(ctx, staging, &mut stage, cancel).await?;
    Ok(stage)
}

/// Attempt the subtitle shortcut. Fills `stage.subtitles` only when a
/// subtitle file was produced, parsed, and passed coverage validation.
async fn try_subtitles(
    ctx: &ProcessingContext,
    staging: &Path,
    url: &str,
    cancel: &watch::Receiver<bool>,
    stage: &mut StageContext,
) -> WorkerResult<()> {
    let downloaded = download_subtitles(
        url,
        staging,
        ctx.config.subtitle_max_size,
        ctx.config.subtitle_download_timeout,
        Some(cancel.clone()),
    )
    .await;

    let path = match downloaded {
        Ok(Some(path)) => path,
        Ok(None) => {
            debug!("No subtitles available for {}", url);
            return Ok(());
        }
        Err(MediaError::Cancelled) => return Err(WorkerError::Cancelled),
        // Subtitle trouble is never fatal on this branch; fall back to ASR
        Err(e) => {
            warn!("Subtitle download failed, falling back: {}", e);
            return Ok(());
        }
    };

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) => {
            warn!("Could not read subtitle file, falling back: {}", e);
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(());
        }
    };

    let parsed = match parse_subtitles(&content) {
        Ok(parsed) if !parsed.is_empty() => parsed,
        Ok(_) => {
            debug!("Subtitle file parsed to zero segments, falling back");
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(());
        }
        Err(e) => {
            warn!("Subtitle parse failed, falling back: {}", e);
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(());
        }
    };

    let coverage = stage.duration.map(|d| parsed.coverage(d));
    stage.subtitle_coverage = coverage;

    if subtitles_are_valid(coverage, ctx.config.coverage_min) {
        info!(coverage = ?coverage, "Subtitles valid, skipping transcription");
        stage.subtitles = Some(parsed);
        stage.subtitle_path = Some(path);
    } else {
        info!(
            coverage = ?coverage,
            min = ctx.config.coverage_min,
            "Subtitle coverage under threshold, falling back to transcription"
        );
        let _ = tokio::fs::remove_file(&path).await;
    }
    Ok(())
}
