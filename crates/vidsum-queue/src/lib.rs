//! In-process job queue.
//!
//! This crate provides:
//! - A bounded FIFO of job ids with non-blocking enqueue and an overflow
//!   list drained as workers free capacity
//! - A per-job cancellation registry backed by watch channels

pub mod cancel;
pub mod queue;

pub use cancel::CancelRegistry;
pub use queue::{JobQueue, QueueConfig};
