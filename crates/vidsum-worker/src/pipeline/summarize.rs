//! Summarization stage with transcript chunking.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use vidsum_engines::EngineError;

use crate::context::{check_cancel, ProcessingContext};
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{with_retry, RetryConfig};

/// Stand-in transcript for sources where no usable speech was found.
/// Summarization still runs so the bundle gets a real summary artifact.
pub const NO_SPEECH_MARKER: &str =
    "[no speech detected in this source; produce a short note saying so]";

const SUMMARY_INSTRUCTION: &str = "You are a precise summarizer. Write a concise natural-language \
summary of the following transcript. Keep concrete facts, names and \
conclusions; drop filler.";

const CHUNK_INSTRUCTION: &str = "Summarize this portion of a longer transcript. Keep every \
concrete fact; this partial summary will be merged with others.";

const MERGE_INSTRUCTION: &str = "The following are partial summaries of consecutive portions of \
one transcript. Merge them into a single coherent summary without \
repeating yourself.";

/// Summarize a transcript, chunking when it exceeds the configured size.
///
/// Oversized transcripts are split into overlapping chunks, each chunk is
/// summarized, and the chunk summaries are merged with a final call. A
/// merged summary below the configured floor is retried once on the raw
/// transcript without chunking.
pub async fn summarize_text(
    ctx: &ProcessingContext,
    text: &str,
    cancel: &watch::Receiver<bool>,
) -> WorkerResult<String> {
    let summarizer = ctx
        .summarizer
        .as_ref()
        .ok_or_else(|| WorkerError::NotConfigured("no summarizer (set LLM_URL)".to_string()))?;

    let char_count = text.chars().count();
    if char_count <= ctx.config.chunk_size_chars {
        return complete(summarizer, SUMMARY_INSTRUCTION, text).await;
    }

    let chunks = chunk_text(text, ctx.config.chunk_size_chars, ctx.config.chunk_overlap_chars);
    info!(
        chars = char_count,
        chunks = chunks.len(),
        "Transcript over chunk size, summarizing in chunks"
    );

    let mut partials = Vec::with_capacity(chunks.len());
    for (idx, chunk) in chunks.iter().enumerate() {
        check_cancel(cancel)?;
        debug!("Summarizing chunk {}/{}", idx + 1, chunks.len());
        partials.push(complete(summarizer, CHUNK_INSTRUCTION, chunk).await?);
    }

    check_cancel(cancel)?;
    let merged = complete(summarizer, MERGE_INSTRUCTION, &partials.join("\n\n")).await?;

    if merged.chars().count() >= ctx.config.summary_min_chars {
        return Ok(merged);
    }

    // Last resort: one unchunked pass over the raw transcript
    warn!(
        chars = merged.chars().count(),
        floor = ctx.config.summary_min_chars,
        "Merged summary under floor, retrying unchunked"
    );
    check_cancel(cancel)?;
    let retried = complete(summarizer, SUMMARY_INSTRUCTION, text).await?;
    if retried.chars().count() > merged.chars().count() {
        Ok(retried)
    } else {
        Ok(merged)
    }
}

async fn complete(
    summarizer: &vidsum_engines::Summarizer,
    instruction: &str,
    content: &str,
) -> WorkerResult<String> {
    let retry = RetryConfig::new("summarize");
    let result = with_retry(
        &retry,
        || summarizer.complete(instruction, content),
        EngineError::is_transient,
    )
    .await?;
    Ok(result)
}

/// Split text into overlapping chunks of at most `chunk_size` characters.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size || chunk_size == 0 {
        return vec![text.to_string()];
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}
