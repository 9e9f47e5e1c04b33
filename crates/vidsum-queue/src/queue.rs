//! Bounded FIFO job queue.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use vidsum_models::JobId;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Channel capacity; ids beyond it park in the overflow list
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            capacity: std::env::var("JOB_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(256),
        }
    }
}

/// Bounded FIFO of job ids.
///
/// Enqueue never blocks and never loses an id: when the channel is full the
/// id parks in an overflow list, which dequeue drains back into the channel
/// as capacity frees up. The job row is already `pending` in the metadata
/// store before it is enqueued, so even an id lost to a crash is healed by
/// the startup sweep.
pub struct JobQueue {
    tx: mpsc::Sender<JobId>,
    rx: tokio::sync::Mutex<mpsc::Receiver<JobId>>,
    overflow: Mutex<VecDeque<JobId>>,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            overflow: Mutex::new(VecDeque::new()),
        }
    }

    /// Non-blocking enqueue.
    ///
    /// FIFO order is preserved: once anything parks in the overflow list,
    /// later ids park behind it until the list drains.
    pub fn enqueue(&self, job_id: JobId) {
        let mut overflow = self.overflow.lock().expect("overflow lock");
        if !overflow.is_empty() {
            overflow.push_back(job_id);
            return;
        }
        match self.tx.try_send(job_id) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job_id)) => {
                debug!(job_id = job_id.as_str(), "Queue full, parking in overflow");
                overflow.push_back(job_id);
            }
            Err(mpsc::error::TrySendError::Closed(job_id)) => {
                // Shutting down; the pending row survives for the next start.
                warn!(job_id = job_id.as_str(), "Queue closed, dropping enqueue");
            }
        }
    }

    /// Await the next job id. Returns `None` once the queue is closed and
    /// drained.
    pub async fn dequeue(&self) -> Option<JobId> {
        let job_id = {
            let mut rx = self.rx.lock().await;
            rx.recv().await?
        };
        self.drain_overflow();
        Some(job_id)
    }

    /// Move parked ids into freed channel capacity.
    fn drain_overflow(&self) {
        let mut overflow = self.overflow.lock().expect("overflow lock");
        while let Some(job_id) = overflow.pop_front() {
            if let Err(e) = self.tx.try_send(job_id) {
                match e {
                    mpsc::error::TrySendError::Full(job_id) => {
                        overflow.push_front(job_id);
                    }
                    mpsc::error::TrySendError::Closed(_) => {}
                }
                break;
            }
        }
    }

    /// Parked ids waiting for channel capacity.
    pub fn overflow_len(&self) -> usize {
        self.overflow.lock().expect("overflow lock").len()
    }
}
