//! Per-job cancellation registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;

use vidsum_models::JobId;

/// Registry of cancel signals for in-flight jobs.
///
/// A worker registers its job before running the pipeline and drops the
/// registration when done. Deleting a cache entry or shutting down flips
/// the signal; stages observe it at their next checkpoint.
#[derive(Clone, Default)]
pub struct CancelRegistry {
    inner: Arc<Mutex<HashMap<JobId, watch::Sender<bool>>>>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job and get its cancel signal receiver.
    pub fn register(&self, job_id: &JobId) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        self.inner
            .lock()
            .expect("cancel registry lock")
            .insert(job_id.clone(), tx);
        rx
    }

    /// Drop a finished job's registration.
    pub fn unregister(&self, job_id: &JobId) {
        self.inner
            .lock()
            .expect("cancel registry lock")
            .remove(job_id);
    }

    /// Cancel one job. Returns whether it was registered.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        let registry = self.inner.lock().expect("cancel registry lock");
        match registry.get(job_id) {
            Some(tx) => {
                debug!(job_id = job_id.as_str(), "Cancelling job");
                tx.send(true).is_ok()
            }
            None => false,
        }
    }

    /// Cancel every registered job (graceful shutdown).
    pub fn cancel_all(&self) -> usize {
        let registry = self.inner.lock().expect("cancel registry lock");
        let mut cancelled = 0;
        for (job_id, tx) in registry.iter() {
            if tx.send(true).is_ok() {
                debug!(job_id = job_id.as_str(), "Cancelling job on shutdown");
                cancelled += 1;
            }
        }
        cancelled
    }
}
