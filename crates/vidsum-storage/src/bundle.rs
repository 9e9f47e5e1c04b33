//! Artifact bundle store.
//!
//! Owns the on-disk layout `cache/{url|local}/<cache_key>/` for committed
//! bundles and `tmp/<job_id>/` for staging. A bundle only ever appears at
//! its final path complete: the manifest is written and fsynced inside the
//! staging directory, then the whole directory is moved with one rename.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use vidsum_models::{
    BundleManifest, CacheKey, JobId, SourceType, BUNDLE_FORMAT_VERSION, MANIFEST_FILE_NAME,
};

use crate::error::{StorageError, StorageResult};
use crate::fs::{dir_size, hash_file};

/// Bundle directory store.
#[derive(Debug, Clone)]
pub struct BundleStore {
    root: PathBuf,
}

impl BundleStore {
    /// Store rooted at the service work directory.
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        Self {
            root: work_dir.as_ref().to_path_buf(),
        }
    }

    /// Staging directory for a job: `tmp/<job_id>/`.
    pub fn staging_dir(&self, job_id: &JobId) -> PathBuf {
        self.root.join("tmp").join(job_id.as_str())
    }

    /// Committed bundle directory: `cache/{url|local}/<cache_key>/`.
    pub fn bundle_dir(&self, source_type: SourceType, cache_key: &CacheKey) -> PathBuf {
        self.root
            .join("cache")
            .join(source_type.as_str())
            .join(cache_key.as_str())
    }

    /// Create (idempotently) and return the staging directory for a job.
    pub async fn stage(&self, job_id: &JobId) -> StorageResult<PathBuf> {
        let dir = self.staging_dir(job_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Promote a staged bundle into the cache.
    ///
    /// Fills in artifact sizes and hashes, writes the fsynced manifest into
    /// the staging directory, then swaps it into the final path with a
    /// single rename (removing a previous bundle first, as `refresh` does).
    pub async fn promote(
        &self,
        job_id: &JobId,
        mut manifest: BundleManifest,
    ) -> StorageResult<PathBuf> {
        let staging = self.staging_dir(job_id);
        if !fs::try_exists(&staging).await? {
            return Err(StorageError::invalid_bundle(format!(
                "staging directory missing for job {}",
                job_id
            )));
        }

        manifest.format_version = BUNDLE_FORMAT_VERSION;
        for artifact in &mut manifest.artifacts {
            let path = staging.join(&artifact.path);
            let (sha256, size) = hash_file(&path).await.map_err(|_| {
                StorageError::invalid_bundle(format!("artifact missing: {}", artifact.path))
            })?;
            artifact.sha256 = sha256;
            artifact.size = size;
        }

        let manifest_path = staging.join(MANIFEST_FILE_NAME);
        let json = serde_json::to_vec_pretty(&manifest)?;
        let mut file = fs::File::create(&manifest_path).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;

        let final_dir = self.bundle_dir(manifest.source_type, &manifest.cache_key);
        if let Some(parent) = final_dir.parent() {
            fs::create_dir_all(parent).await?;
        }
        match fs::remove_dir_all(&final_dir).await {
            Ok(()) => debug!("Replaced previous bundle at {}", final_dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::rename(&staging, &final_dir).await?;

        debug!(
            job_id = job_id.as_str(),
            cache_key = manifest.cache_key.as_str(),
            "Bundle promoted to {}",
            final_dir.display()
        );
        Ok(final_dir)
    }

    /// Discard a staging directory. Tolerates it being already gone.
    pub async fn discard(&self, job_id: &JobId) {
        let staging = self.staging_dir(job_id);
        match fs::remove_dir_all(&staging).await {
            Ok(()) => debug!(job_id = job_id.as_str(), "Staging discarded"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                job_id = job_id.as_str(),
                "Failed to discard staging {}: {}",
                staging.display(),
                e
            ),
        }
    }

    /// Read and parse a committed bundle's manifest.
    pub async fn read_manifest(
        &self,
        source_type: SourceType,
        cache_key: &CacheKey,
    ) -> StorageResult<BundleManifest> {
        let path = self
            .bundle_dir(source_type, cache_key)
            .join(MANIFEST_FILE_NAME);
        let bytes = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::not_found(format!("bundle {}", cache_key))
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Whether a committed bundle is valid: directory and manifest present,
    /// profile version current, summary non-empty, every listed artifact at
    /// its declared path.
    pub async fn validate(
        &self,
        source_type: SourceType,
        cache_key: &CacheKey,
        profile_version: &str,
    ) -> bool {
        let manifest = match self.read_manifest(source_type, cache_key).await {
            Ok(manifest) => manifest,
            Err(e) => {
                debug!(cache_key = cache_key.as_str(), "Bundle invalid: {}", e);
                return false;
            }
        };

        if manifest.profile_version != profile_version {
            debug!(
                cache_key = cache_key.as_str(),
                "Bundle profile {} != current {}", manifest.profile_version, profile_version
            );
            return false;
        }
        if manifest.summary_text.is_empty() {
            return false;
        }

        let dir = self.bundle_dir(source_type, cache_key);
        for artifact in &manifest.artifacts {
            if !fs::try_exists(dir.join(&artifact.path)).await.unwrap_or(false) {
                debug!(
                    cache_key = cache_key.as_str(),
                    "Bundle missing artifact {}", artifact.path
                );
                return false;
            }
        }
        true
    }

    /// Remove a committed bundle directory.
    pub async fn remove(&self, source_type: SourceType, cache_key: &CacheKey) -> StorageResult<()> {
        let dir = self.bundle_dir(source_type, cache_key);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Size in bytes of a committed bundle (0 when absent).
    pub async fn bundle_size(
        &self,
        source_type: SourceType,
        cache_key: &CacheKey,
    ) -> StorageResult<u64> {
        dir_size(self.bundle_dir(source_type, cache_key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;
    use vidsum_models::ArtifactRecord;

    fn key(fill: &str) -> CacheKey {
        CacheKey::parse(&fill.repeat(64)).unwrap()
    }

    fn manifest(cache_key: CacheKey, artifacts: Vec<ArtifactRecord>) -> BundleManifest {
        BundleManifest {
            format_version: BUNDLE_FORMAT_VERSION,
            profile_version: "v1".into(),
            cache_key,
            source_type: SourceType::Url,
            source_ref: "https://example.com/v/abc".into(),
            status: "completed".into(),
            created_at: Utc::now(),
            completed_at: Utc::now(),
            summary_text: "a summary".into(),
            artifacts,
        }
    }

    fn artifact(name: &str) -> ArtifactRecord {
        ArtifactRecord {
            name: name.into(),
            path: name.into(),
            size: 0,
            sha256: String::new(),
        }
    }

    #[tokio::test]
    async fn test_stage_promote_validate() {
        let dir = TempDir::new().unwrap();
        let bundles = BundleStore::new(dir.path());
        let job_id = JobId::generate();
        let cache_key = key("a");

        let staging = bundles.stage(&job_id).await.unwrap();
        fs::write(staging.join("summary.json"), br#"{"summary":"a summary"}"#)
            .await
            .unwrap();

        let final_dir = bundles
            .promote(
                &job_id,
                manifest(cache_key.clone(), vec![artifact("summary.json")]),
            )
            .await
            .unwrap();

        assert!(!staging.exists(), "staging is gone after promotion");
        assert!(final_dir.join(MANIFEST_FILE_NAME).exists());
        assert!(bundles.validate(SourceType::Url, &cache_key, "v1").await);

        // Artifact hashes were filled in during promotion
        let manifest = bundles
            .read_manifest(SourceType::Url, &cache_key)
            .await
            .unwrap();
        let summary = manifest.artifact("summary.json").unwrap();
        assert_eq!(summary.size, br#"{"summary":"a summary"}"#.len() as u64);
        assert_eq!(summary.sha256.len(), 64);
    }

    #[tokio::test]
    async fn test_promote_replaces_previous_bundle() {
        let dir = TempDir::new().unwrap();
        let bundles = BundleStore::new(dir.path());
        let cache_key = key("b");

        for content in ["first", "second"] {
            let job_id = JobId::generate();
            let staging = bundles.stage(&job_id).await.unwrap();
            fs::write(staging.join("summary.json"), content).await.unwrap();
            bundles
                .promote(
                    &job_id,
                    manifest(cache_key.clone(), vec![artifact("summary.json")]),
                )
                .await
                .unwrap();
        }

        let dir = bundles.bundle_dir(SourceType::Url, &cache_key);
        assert_eq!(fs::read(dir.join("summary.json")).await.unwrap(), b"second");

        // No staging directories remain
        let mut entries = fs::read_dir(bundles.root.join("tmp")).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_promote_fails_on_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let bundles = BundleStore::new(dir.path());
        let job_id = JobId::generate();

        bundles.stage(&job_id).await.unwrap();
        let result = bundles
            .promote(&job_id, manifest(key("c"), vec![artifact("asr.json")]))
            .await;
        assert!(matches!(result, Err(StorageError::InvalidBundle(_))));
    }

    #[tokio::test]
    async fn test_validate_rejects_profile_drift_and_missing_artifacts() {
        let dir = TempDir::new().unwrap();
        let bundles = BundleStore::new(dir.path());
        let job_id = JobId::generate();
        let cache_key = key("d");

        let staging = bundles.stage(&job_id).await.unwrap();
        fs::write(staging.join("summary.json"), b"{}").await.unwrap();
        bundles
            .promote(
                &job_id,
                manifest(cache_key.clone(), vec![artifact("summary.json")]),
            )
            .await
            .unwrap();

        assert!(bundles.validate(SourceType::Url, &cache_key, "v1").await);
        assert!(!bundles.validate(SourceType::Url, &cache_key, "v2").await);

        // Delete an artifact out from under the manifest
        fs::remove_file(
            bundles
                .bundle_dir(SourceType::Url, &cache_key)
                .join("summary.json"),
        )
        .await
        .unwrap();
        assert!(!bundles.validate(SourceType::Url, &cache_key, "v1").await);
    }

    #[tokio::test]
    async fn test_discard_is_tolerant() {
        let dir = TempDir::new().unwrap();
        let bundles = BundleStore::new(dir.path());
        let job_id = JobId::generate();

        // Never staged: no panic, no error surfaced
        bundles.discard(&job_id).await;

        bundles.stage(&job_id).await.unwrap();
        bundles.discard(&job_id).await;
        assert!(!bundles.staging_dir(&job_id).exists());
    }
}
