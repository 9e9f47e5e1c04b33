//! Job records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{CacheKey, JobId};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in the queue
    #[default]
    Pending,
    /// Being processed by a worker
    Running,
    /// Pipeline finished successfully
    Completed,
    /// Pipeline failed
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of pipeline work, owned by exactly one worker.
///
/// At most one non-terminal job exists per `cache_key`; a job terminates in
/// the same outcome as its cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub cache_key: CacheKey,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a fresh pending job for a cache key.
    pub fn new(cache_key: CacheKey) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::generate(),
            cache_key,
            status: JobStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_pending() {
        let key = CacheKey::parse(&"cd".repeat(32)).unwrap();
        let job = JobRecord::new(key.clone());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.cache_key, key);
        assert!(JobId::parse(job.job_id.as_str()).is_ok());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("dead_lettered"), None);
    }
}
