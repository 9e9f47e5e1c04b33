//! LLM summarizer client.
//!
//! Text in, summary text out, against an OpenAI-compatible chat completions
//! endpoint. Chunking long transcripts and merging chunk summaries is the
//! pipeline's job; this client stays a single-call contract.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

/// Summarizer configuration.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Base URL of the chat completions API
    pub base_url: String,
    /// Bearer token
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl SummarizerConfig {
    /// Create config from environment variables. `None` when `LLM_URL` is
    /// not set.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("LLM_URL").ok()?;
        Some(Self {
            base_url,
            api_key: std::env::var("LLM_API_KEY").ok(),
            model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            timeout: Duration::from_secs(
                std::env::var("LLM_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
        })
    }
}

/// Chat completions request.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Chat completions response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Text-in/text-out summarization client.
pub struct Summarizer {
    config: SummarizerConfig,
    client: reqwest::Client,
}

impl Summarizer {
    pub fn new(config: SummarizerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("reqwest client");
        Self { config, client }
    }

    /// Run one completion with a system instruction and user content.
    pub async fn complete(&self, instruction: &str, content: &str) -> EngineResult<String> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        debug!(model = %self.config.model, "Requesting summary completion");

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content,
                },
            ],
            temperature: 0.3,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError::api(
                status.as_u16(),
                message.lines().next().unwrap_or("").to_string(),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| EngineError::invalid_response(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| EngineError::invalid_response("no choices in response"))?;

        if text.is_empty() {
            return Err(EngineError::invalid_response("empty completion"));
        }

        info!(chars = text.len(), "Summary completion received");
        Ok(text)
    }
}
