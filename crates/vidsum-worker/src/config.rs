//! Worker configuration.

use std::time::Duration;

/// Worker pool and pipeline configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Size of the pipeline worker pool
    pub worker_count: usize,
    /// Max concurrent audio extractions across all workers
    pub transcode_limit: usize,
    /// Max concurrent transcriptions across all workers
    pub transcribe_limit: usize,
    /// How long a stage may wait for its semaphore
    pub stage_wait: Duration,
    /// Hard ceiling on a downloaded video
    pub video_max_size: u64,
    /// Hard ceiling on a downloaded subtitle file
    pub subtitle_max_size: u64,
    /// Subtitle download timeout
    pub subtitle_download_timeout: Duration,
    /// Video download timeout
    pub download_timeout: Duration,
    /// Audio extraction timeout
    pub transcode_timeout: Duration,
    /// Source metadata probe timeout
    pub probe_timeout: Duration,
    /// Minimum subtitle coverage (summed segment duration / media duration)
    pub coverage_min: f64,
    /// RMS amplitude below which audio counts as silent
    pub rms_max: f64,
    /// Tokens-per-minute floor below which a transcript counts as silent
    pub tokens_per_min_min: f64,
    /// Transcripts beyond this are summarized in overlapping chunks
    pub chunk_size_chars: usize,
    /// Overlap between adjacent chunks
    pub chunk_overlap_chars: usize,
    /// Summaries below this floor trigger one unchunked retry
    pub summary_min_chars: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            transcode_limit: 2,
            transcribe_limit: 2,
            stage_wait: Duration::from_secs(600),
            video_max_size: 4 * 1024 * 1024 * 1024, // 4GB
            subtitle_max_size: 10 * 1024 * 1024,
            subtitle_download_timeout: Duration::from_secs(60),
            download_timeout: Duration::from_secs(1800),
            transcode_timeout: Duration::from_secs(1800),
            probe_timeout: Duration::from_secs(30),
            coverage_min: 0.8,
            rms_max: 1e-3,
            tokens_per_min_min: 10.0,
            chunk_size_chars: 12_000,
            chunk_overlap_chars: 800,
            summary_min_chars: 80,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            worker_count: env_parse("WORKER_COUNT", defaults.worker_count),
            transcode_limit: env_parse("TRANSCODE_CONCURRENCY", defaults.transcode_limit),
            transcribe_limit: env_parse("TRANSCRIBE_CONCURRENCY", defaults.transcribe_limit),
            stage_wait: Duration::from_secs(env_parse("PIPELINE_STAGE_WAIT", 600)),
            video_max_size: env_parse("VIDEO_MAX_SIZE", defaults.video_max_size),
            subtitle_max_size: env_parse("SUBTITLE_MAX_SIZE", defaults.subtitle_max_size),
            subtitle_download_timeout: Duration::from_secs(env_parse(
                "SUBTITLE_DOWNLOAD_TIMEOUT",
                60,
            )),
            download_timeout: Duration::from_secs(env_parse("VIDEO_DOWNLOAD_TIMEOUT", 1800)),
            transcode_timeout: Duration::from_secs(env_parse("TRANSCODE_TIMEOUT", 1800)),
            probe_timeout: Duration::from_secs(env_parse("SOURCE_PROBE_TIMEOUT", 30)),
            coverage_min: env_parse("SUBTITLE_COVERAGE_MIN", defaults.coverage_min),
            rms_max: env_parse("SILENCE_RMS_MAX", defaults.rms_max),
            tokens_per_min_min: env_parse("SILENCE_TOKENS_PER_MIN", defaults.tokens_per_min_min),
            chunk_size_chars: env_parse("SUMMARY_CHUNK_SIZE_CHARS", defaults.chunk_size_chars),
            chunk_overlap_chars: env_parse(
                "SUMMARY_CHUNK_OVERLAP_CHARS",
                defaults.chunk_overlap_chars,
            ),
            summary_min_chars: env_parse("SUMMARY_MIN_CHARS", defaults.summary_min_chars),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
