//! Artifact bundle manifest.
//!
//! Every committed bundle directory contains a `bundle.json` describing the
//! artifacts it holds. A manifest observed at the final bundle path always
//! describes a fully written bundle: manifests are written and fsynced in
//! the staging directory, then moved with a single rename.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::SourceType;
use crate::id::CacheKey;

/// Manifest format version.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// File name of the manifest inside a bundle directory.
pub const MANIFEST_FILE_NAME: &str = "bundle.json";

/// One artifact inside a bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Logical artifact name (`summary.json`, `asr.json`, `audio.wav`, ...)
    pub name: String,
    /// Path relative to the bundle directory
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// SHA-256 of the artifact content
    pub sha256: String,
}

/// The `bundle.json` manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub format_version: u32,
    pub profile_version: String,
    pub cache_key: CacheKey,
    pub source_type: SourceType,
    pub source_ref: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub summary_text: String,
    pub artifacts: Vec<ArtifactRecord>,
}

impl BundleManifest {
    /// Look up an artifact by its logical name.
    pub fn artifact(&self, name: &str) -> Option<&ArtifactRecord> {
        self.artifacts.iter().find(|a| a.name == name)
    }
}
