//! Processing and stage context.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};

use vidsum_engines::{Summarizer, Transcriber, Transcript};
use vidsum_media::ParsedSubtitles;
use vidsum_store::MetadataStore;
use vidsum_storage::{BundleStore, UploadStore};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Shared dependencies for the worker pool.
pub struct ProcessingContext {
    pub config: WorkerConfig,
    pub store: MetadataStore,
    pub uploads: UploadStore,
    pub bundles: BundleStore,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub summarizer: Option<Arc<Summarizer>>,
    /// Global audio-extraction cap across all workers
    pub transcode_semaphore: Arc<Semaphore>,
    /// Global transcription cap across all workers
    pub transcribe_semaphore: Arc<Semaphore>,
}

impl ProcessingContext {
    pub fn new(
        config: WorkerConfig,
        store: MetadataStore,
        uploads: UploadStore,
        bundles: BundleStore,
        transcriber: Option<Arc<dyn Transcriber>>,
        summarizer: Option<Arc<Summarizer>>,
    ) -> Self {
        let transcode_semaphore = Arc::new(Semaphore::new(config.transcode_limit.max(1)));
        let transcribe_semaphore = Arc::new(Semaphore::new(config.transcribe_limit.max(1)));
        Self {
            config,
            store,
            uploads,
            bundles,
            transcriber,
            summarizer,
            transcode_semaphore,
            transcribe_semaphore,
        }
    }

    /// Acquire a stage slot, bounded by the configured stage wait.
    pub async fn acquire_stage(
        &self,
        semaphore: &Arc<Semaphore>,
        stage: &'static str,
    ) -> WorkerResult<tokio::sync::OwnedSemaphorePermit> {
        tokio::time::timeout(self.config.stage_wait, Arc::clone(semaphore).acquire_owned())
            .await
            .map_err(|_| WorkerError::StageWait(stage))?
            .map_err(|_| WorkerError::internal(format!("{} semaphore closed", stage)))
    }
}

/// Typed context threaded through the pipeline stages.
///
/// Each stage takes the context, performs its work with side effects
/// limited to the staging directory and the external adapters, and fills in
/// its fields.
#[derive(Debug, Default)]
pub struct StageContext {
    pub source_ref: String,
    pub source_name: Option<String>,
    /// Media duration in seconds, when known
    pub duration: Option<f64>,
    pub video_path: Option<PathBuf>,
    pub audio_path: Option<PathBuf>,
    pub subtitle_path: Option<PathBuf>,
    pub subtitles: Option<ParsedSubtitles>,
    /// Summed-duration subtitle coverage, when computable
    pub subtitle_coverage: Option<f64>,
    pub transcript: Option<Transcript>,
    pub is_silent: bool,
    pub summary_text: Option<String>,
}

impl StageContext {
    pub fn new(source_ref: impl Into<String>) -> Self {
        Self {
            source_ref: source_ref.into(),
            ..Default::default()
        }
    }

    /// The text to summarize: subtitle text when subtitles won, transcript
    /// text otherwise.
    pub fn transcript_text(&self) -> Option<String> {
        if let Some(subs) = &self.subtitles {
            let text = subs.full_text();
            if !text.is_empty() {
                return Some(text);
            }
        }
        self.transcript
            .as_ref()
            .map(|t| t.text.clone())
            .filter(|t| !t.trim().is_empty())
    }
}

/// Return early with `Cancelled` if the signal has fired. Called at every
/// stage boundary.
pub fn check_cancel(cancel: &watch::Receiver<bool>) -> WorkerResult<()> {
    if *cancel.borrow() {
        return Err(WorkerError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_cancel() {
        let (tx, rx) = watch::channel(false);
        assert!(check_cancel(&rx).is_ok());
        tx.send(true).unwrap();
        assert!(matches!(check_cancel(&rx), Err(WorkerError::Cancelled)));
    }

    #[test]
    fn test_transcript_text_prefers_subtitles() {
        let mut ctx = StageContext::new("ref");
        assert!(ctx.transcript_text().is_none());

        ctx.transcript = Some(Transcript {
            language: None,
            segments: vec![],
            text: "from asr".into(),
        });
        assert_eq!(ctx.transcript_text().as_deref(), Some("from asr"));

        ctx.subtitles = Some(vidsum_media::ParsedSubtitles {
            segments: vec![vidsum_media::SubtitleSegment {
                text: "from subs".into(),
                start_ms: 0,
                end_ms: 1000,
                translated_text: None,
            }],
        });
        assert_eq!(ctx.transcript_text().as_deref(), Some("from subs"));
    }
}
