//! Summary pipeline worker.
//!
//! This crate provides:
//! - The fixed worker pool draining the job queue
//! - The URL branch (subtitle-first, download/extract/transcribe fallback)
//!   and the local branch (subtitle/audio/video inputs)
//! - Stage concurrency caps, cancellation checkpoints, bounded retry

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod retry;

pub use config::WorkerConfig;
pub use context::{ProcessingContext, StageContext};
pub use error::{WorkerError, WorkerResult};
pub use executor::WorkerPool;
