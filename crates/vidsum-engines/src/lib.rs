//! External engine adapters.
//!
//! The pipeline talks to speech recognition and summarization through two
//! narrow contracts:
//! - [`Transcriber`]: wav file in, timed transcript out (remote HTTP
//!   services and local command-line transcribers both implement it)
//! - [`Summarizer`]: text in, summary text out

pub mod asr;
pub mod error;
pub mod summarize;

pub use asr::{
    transcriber_from_env, CommandTranscriber, HttpTranscriber, Transcriber, Transcript,
    TranscriptSegment,
};
pub use error::{EngineError, EngineResult};
pub use summarize::{Summarizer, SummarizerConfig};
