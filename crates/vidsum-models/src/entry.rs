//! Cache entry records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::CacheKey;

/// Kind of source a cache entry was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Url,
    Local,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Url => "url",
            SourceType::Local => "local",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "url" => Some(SourceType::Url),
            "local" => Some(SourceType::Local),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Created, waiting for a worker
    #[default]
    Pending,
    /// A worker is processing the pipeline
    Running,
    /// Summary produced, bundle promoted
    Completed,
    /// Pipeline failed; `error` holds the reason
    Failed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Running => "running",
            EntryStatus::Completed => "completed",
            EntryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EntryStatus::Pending),
            "running" => Some(EntryStatus::Running),
            "completed" => Some(EntryStatus::Completed),
            "failed" => Some(EntryStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions except `refresh`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryStatus::Completed | EntryStatus::Failed)
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Durable record of one cached summary computation.
///
/// There is at most one entry per `cache_key`. The key is a function solely
/// of source identity and the profile version; `source_ref` (the normalized
/// URL or file hash) is retained for inspection, never for matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cache_key: CacheKey,
    pub source_type: SourceType,
    pub source_ref: String,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_text: Option<String>,
    /// Display name of the source (video title or original file name)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub profile_version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl CacheEntry {
    /// Create a fresh pending entry.
    pub fn new(
        cache_key: CacheKey,
        source_type: SourceType,
        source_ref: impl Into<String>,
        profile_version: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            cache_key,
            source_type,
            source_ref: source_ref.into(),
            status: EntryStatus::Pending,
            summary_text: None,
            source_name: None,
            bundle_path: None,
            error: None,
            profile_version: profile_version.into(),
            created_at: now,
            updated_at: now,
            last_accessed: now,
        }
    }

    /// Whether the entry can be reported as a hit before bundle validation.
    ///
    /// The on-disk bundle must additionally pass `validate`; a completed row
    /// with a missing or stale bundle is not a hit.
    pub fn is_presentable_hit(&self, current_profile: &str) -> bool {
        self.status == EntryStatus::Completed
            && self
                .summary_text
                .as_deref()
                .map(|s| !s.is_empty())
                .unwrap_or(false)
            && self.profile_version == current_profile
    }
}
