//! Speech recognition adapters.
//!
//! Both backends produce the same [`Transcript`]: a Whisper-compatible HTTP
//! service (`ASR_URL`) and a local whisper.cpp-style command-line
//! transcriber (`ASR_COMMAND`).

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

/// One timed transcript segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// A speech recognition result.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Transcript {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub segments: Vec<TranscriptSegment>,
    pub text: String,
}

impl Transcript {
    /// Whitespace-token count, used for tokens-per-minute silence checks.
    pub fn token_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Speech-to-text contract: wav in, timed transcript out.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> EngineResult<Transcript>;
}

/// Pick a transcriber from the environment.
///
/// `ASR_URL` selects the HTTP backend, otherwise `ASR_COMMAND` the local
/// one. Returns `None` when neither is configured.
pub fn transcriber_from_env() -> Option<Arc<dyn Transcriber>> {
    if let Ok(url) = std::env::var("ASR_URL") {
        let api_key = std::env::var("ASR_API_KEY").ok();
        let timeout = env_secs("ASR_TIMEOUT", 600);
        return Some(Arc::new(HttpTranscriber::new(url, api_key, timeout)));
    }
    if let Ok(program) = std::env::var("ASR_COMMAND") {
        let args = std::env::var("ASR_COMMAND_ARGS")
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default();
        let timeout = env_secs("ASR_TIMEOUT", 1800);
        return Some(Arc::new(CommandTranscriber::new(program, args, timeout)));
    }
    None
}

fn env_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(key)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}

// ============================================================================
// HTTP backend
// ============================================================================

/// Whisper-compatible HTTP transcription service.
pub struct HttpTranscriber {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

/// Whisper verbose_json response.
#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
    language: Option<String>,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    /// Seconds
    start: f64,
    /// Seconds
    end: f64,
    text: String,
}

impl HttpTranscriber {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &Path) -> EngineResult<Transcript> {
        info!("Transcribing {} via {}", audio.display(), self.base_url);

        let file = tokio::fs::File::open(audio).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.wav".to_string());

        let form = reqwest::multipart::Form::new()
            .text("response_format", "verbose_json")
            .part(
                "file",
                reqwest::multipart::Part::stream(body)
                    .file_name(file_name)
                    .mime_str("audio/wav")
                    .map_err(EngineError::Http)?,
            );

        let mut request = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError::api(status.as_u16(), truncate(&message, 500)));
        }

        let parsed: WhisperResponse = response
            .json()
            .await
            .map_err(|e| EngineError::invalid_response(e.to_string()))?;

        Ok(Transcript {
            language: parsed.language,
            text: parsed.text.trim().to_string(),
            segments: parsed
                .segments
                .into_iter()
                .map(|s| TranscriptSegment {
                    text: s.text.trim().to_string(),
                    start_ms: (s.start * 1000.0).round() as u64,
                    end_ms: (s.end * 1000.0).round() as u64,
                })
                .collect(),
        })
    }
}

// ============================================================================
// Command-line backend
// ============================================================================

/// Local whisper.cpp-style transcriber.
///
/// Invoked as `<program> <extra args> -f <wav> -oj -of <out>` and expected
/// to write `<out>.json` in whisper.cpp's output format.
pub struct CommandTranscriber {
    program: String,
    extra_args: Vec<String>,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct WhisperCppOutput {
    #[serde(default)]
    transcription: Vec<WhisperCppSegment>,
    result: Option<WhisperCppResult>,
}

#[derive(Debug, Deserialize)]
struct WhisperCppResult {
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperCppSegment {
    offsets: WhisperCppOffsets,
    text: String,
}

#[derive(Debug, Deserialize)]
struct WhisperCppOffsets {
    from: u64,
    to: u64,
}

impl CommandTranscriber {
    pub fn new(program: impl Into<String>, extra_args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            extra_args,
            timeout,
        }
    }

    fn parse_output(bytes: &[u8]) -> EngineResult<Transcript> {
        let parsed: WhisperCppOutput = serde_json::from_slice(bytes)
            .map_err(|e| EngineError::invalid_response(format!("transcriber JSON: {}", e)))?;

        let segments: Vec<TranscriptSegment> = parsed
            .transcription
            .into_iter()
            .map(|s| TranscriptSegment {
                text: s.text.trim().to_string(),
                start_ms: s.offsets.from,
                end_ms: s.offsets.to,
            })
            .filter(|s| !s.text.is_empty())
            .collect();

        let text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(Transcript {
            language: parsed.result.and_then(|r| r.language),
            segments,
            text,
        })
    }
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    async fn transcribe(&self, audio: &Path) -> EngineResult<Transcript> {
        which::which(&self.program)
            .map_err(|_| EngineError::NotConfigured(format!("{} not in PATH", self.program)))?;

        let out_dir = tempfile_dir(audio)?;
        let out_base = out_dir.join("transcript");

        info!("Transcribing {} via {}", audio.display(), self.program);

        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.extra_args)
            .arg("-f")
            .arg(audio)
            .arg("-oj")
            .arg("-of")
            .arg(&out_base)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let child = command.spawn()?;
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| EngineError::process(format!("{} timed out", self.program)))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::process(format!(
                "{} failed: {}",
                self.program,
                stderr.lines().last().unwrap_or("unknown error")
            )));
        }

        let json_path = out_base.with_extension("json");
        let bytes = tokio::fs::read(&json_path).await.map_err(|_| {
            EngineError::invalid_response(format!("{} produced no JSON output", self.program))
        })?;
        let transcript = Self::parse_output(&bytes);

        if let Err(e) = tokio::fs::remove_dir_all(&out_dir).await {
            warn!("Failed to clean transcriber scratch dir: {}", e);
        }
        debug!("Transcription finished for {}", audio.display());
        transcript
    }
}

/// Scratch directory next to the audio file (same filesystem as staging).
fn tempfile_dir(audio: &Path) -> EngineResult<std::path::PathBuf> {
    let parent = audio.parent().unwrap_or_else(|| Path::new("."));
    let dir = parent.join(".asr");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_whisper_cpp_output() {
        let json = r#"{
            "result": {"language": "en"},
            "transcription": [
                {"offsets": {"from": 0, "to": 2000}, "text": " Hello there."},
                {"offsets": {"from": 2000, "to": 4000}, "text": " General Kenobi."},
                {"offsets": {"from": 4000, "to": 4500}, "text": "   "}
            ]
        }"#;
        let transcript = CommandTranscriber::parse_output(json.as_bytes()).unwrap();
        assert_eq!(transcript.language.as_deref(), Some("en"));
        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.text, "Hello there. General Kenobi.");
        assert_eq!(transcript.token_count(), 4);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CommandTranscriber::parse_output(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_http_transcriber_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "hello world",
                "language": "en",
                "segments": [
                    {"start": 0.0, "end": 1.25, "text": " hello"},
                    {"start": 1.25, "end": 2.0, "text": " world"}
                ]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let wav = dir.path().join("audio.wav");
        tokio::fs::write(&wav, b"RIFF....WAVE").await.unwrap();

        let transcriber =
            HttpTranscriber::new(server.uri(), None, Duration::from_secs(5));
        let transcript = transcriber.transcribe(&wav).await.unwrap();

        assert_eq!(transcript.text, "hello world");
        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[1].start_ms, 1250);
    }

    #[tokio::test]
    async fn test_http_transcriber_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let wav = dir.path().join("audio.wav");
        tokio::fs::write(&wav, b"RIFF").await.unwrap();

        let transcriber =
            HttpTranscriber::new(server.uri(), None, Duration::from_secs(5));
        let err = transcriber.transcribe(&wav).await.unwrap_err();
        assert!(matches!(err, EngineError::Api { status: 503, .. }));
        assert!(err.is_transient());
    }
}
