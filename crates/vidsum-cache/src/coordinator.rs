//! Cache coordinator.
//!
//! Mediates every cache-entry state transition. Single-flight is inherited
//! from the metadata store: check-or-create runs as one serialized
//! transaction, so N concurrent requests for a key enqueue at most one job.

use std::sync::Arc;

use tracing::{debug, info, warn};

use vidsum_media::fetch_metadata;
use vidsum_models::{
    normalize_url, CacheEntry, CacheKey, EntryStatus, FileHash, FileId, JobId, JobRecord,
    SourceType,
};
use vidsum_queue::{CancelRegistry, JobQueue};
use vidsum_store::{EntryPlan, GetOrCreateOutcome, MetadataStore};
use vidsum_storage::{BundleStore, UploadStore};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::key::{local_cache_key, url_cache_key};

/// Reference to uploaded content: exactly one of handle or content hash.
#[derive(Debug, Clone)]
pub enum LocalSourceRef {
    Id(FileId),
    Hash(FileHash),
}

/// Read-only probe result.
#[derive(Debug)]
pub struct LookupResult {
    pub cache_key: CacheKey,
    pub entry: Option<CacheEntry>,
    /// Whether a completed entry's bundle passed validation
    pub bundle_valid: bool,
}

/// Coordinates cache entries, jobs and bundles for both source kinds.
#[derive(Clone)]
pub struct CacheCoordinator {
    store: MetadataStore,
    bundles: BundleStore,
    uploads: UploadStore,
    queue: Arc<JobQueue>,
    cancels: CancelRegistry,
    config: Arc<CacheConfig>,
}

impl CacheCoordinator {
    pub fn new(
        store: MetadataStore,
        bundles: BundleStore,
        uploads: UploadStore,
        queue: Arc<JobQueue>,
        cancels: CancelRegistry,
        config: CacheConfig,
    ) -> Self {
        Self {
            store,
            bundles,
            uploads,
            queue,
            cancels,
            config: Arc::new(config),
        }
    }

    pub fn profile_version(&self) -> &str {
        &self.config.profile_version
    }

    /// Derive the cache key for a URL source.
    ///
    /// Prefers the probed `(extractor, video_id)` identity; any probe
    /// failure falls back to the normalized URL form and never fails the
    /// request.
    pub async fn resolve_url(&self, raw_url: &str) -> CacheResult<(CacheKey, String)> {
        let tracking: Vec<&str> = self.config.tracking_params.iter().map(|s| s.as_str()).collect();
        let normalized = normalize_url(raw_url, &tracking)
            .map_err(|e| CacheError::invalid_source(e.to_string()))?;

        let probed = match fetch_metadata(&normalized, self.config.probe_timeout).await {
            Ok(meta) => meta.extractor.zip(meta.video_id),
            Err(e) => {
                debug!("Source probe failed, keying on normalized URL: {}", e);
                None
            }
        };

        let key = url_cache_key(
            probed.as_ref().map(|(e, v)| (e.as_str(), v.as_str())),
            &normalized,
            &self.config.profile_version,
        );
        Ok((key, normalized))
    }

    /// Resolve a local reference to the content hash backing it.
    pub async fn resolve_local(&self, source: &LocalSourceRef) -> CacheResult<FileHash> {
        match source {
            LocalSourceRef::Hash(hash) => {
                // Verify the content actually exists before keying on it
                self.uploads.get_by_hash(hash).await?;
                Ok(hash.clone())
            }
            LocalSourceRef::Id(file_id) => {
                let record = self.uploads.get(file_id).await?;
                Ok(record.file_hash)
            }
        }
    }

    /// Get-or-create for a URL source.
    pub async fn get_or_create_url(
        &self,
        raw_url: &str,
        refresh: bool,
    ) -> CacheResult<GetOrCreateOutcome> {
        let (key, normalized) = self.resolve_url(raw_url).await?;
        self.get_or_create(key, SourceType::Url, normalized, refresh)
            .await
    }

    /// Get-or-create for uploaded content.
    pub async fn get_or_create_local(
        &self,
        source: &LocalSourceRef,
        refresh: bool,
    ) -> CacheResult<GetOrCreateOutcome> {
        let file_hash = self.resolve_local(source).await?;
        let key = local_cache_key(&file_hash, &self.config.profile_version);
        self.get_or_create(key, SourceType::Local, file_hash.to_string(), refresh)
            .await
    }

    async fn get_or_create(
        &self,
        cache_key: CacheKey,
        source_type: SourceType,
        source_ref: String,
        refresh: bool,
    ) -> CacheResult<GetOrCreateOutcome> {
        // Validate the on-disk bundle before entering the transaction; a
        // completed row with a stale bundle is recomputed, not served.
        let completed_is_valid = match self.store.get_entry(&cache_key).await? {
            Some(entry) if entry.status == EntryStatus::Completed => {
                self.bundles
                    .validate(source_type, &cache_key, &self.config.profile_version)
                    .await
            }
            _ => true,
        };

        let outcome = self
            .store
            .entry_get_or_create(&EntryPlan {
                cache_key: cache_key.clone(),
                source_type,
                source_ref,
                profile_version: self.config.profile_version.clone(),
                refresh,
                completed_is_valid,
            })
            .await?;

        if let Some(job) = outcome.new_job() {
            info!(
                cache_key = cache_key.as_str(),
                job_id = job.job_id.as_str(),
                "Enqueued summary job"
            );
            self.queue.enqueue(job.job_id.clone());
        }
        Ok(outcome)
    }

    /// Read-only probe for a URL source.
    pub async fn lookup_url(&self, raw_url: &str) -> CacheResult<LookupResult> {
        let (cache_key, _) = self.resolve_url(raw_url).await?;
        self.lookup_key(cache_key).await
    }

    /// Read-only probe for a local source.
    pub async fn lookup_local(&self, source: &LocalSourceRef) -> CacheResult<LookupResult> {
        let file_hash = self.resolve_local(source).await?;
        let cache_key = local_cache_key(&file_hash, &self.config.profile_version);
        self.lookup_key(cache_key).await
    }

    async fn lookup_key(&self, cache_key: CacheKey) -> CacheResult<LookupResult> {
        let entry = self.store.get_entry(&cache_key).await?;
        let bundle_valid = match &entry {
            Some(entry) if entry.status == EntryStatus::Completed => {
                self.bundles
                    .validate(entry.source_type, &cache_key, &self.config.profile_version)
                    .await
            }
            _ => false,
        };
        Ok(LookupResult {
            cache_key,
            entry,
            bundle_valid,
        })
    }

    pub async fn get_entry(&self, cache_key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        let entry = self.store.get_entry(cache_key).await?;
        if entry.is_some() {
            self.store.touch_last_accessed(cache_key).await?;
        }
        Ok(entry)
    }

    pub async fn get_job(&self, job_id: &JobId) -> CacheResult<Option<JobRecord>> {
        Ok(self.store.get_job(job_id).await?)
    }

    /// Delete an entry: cancel in-flight work, drop the rows, remove the
    /// bundle directory. Returns whether anything was deleted.
    pub async fn delete(&self, cache_key: &CacheKey) -> CacheResult<bool> {
        if let Some(job) = self.store.get_active_job(cache_key).await? {
            self.cancels.cancel(&job.job_id);
        }

        let Some(entry) = self.store.delete_entry(cache_key).await? else {
            return Ok(false);
        };

        self.bundles.remove(entry.source_type, cache_key).await?;
        info!(cache_key = cache_key.as_str(), "Cache entry deleted");
        Ok(true)
    }

    /// Startup sweep: fail every job (and entry) left non-terminal by a
    /// previous process lifetime and discard their staging directories.
    pub async fn sweep_interrupted(&self) -> CacheResult<usize> {
        let swept = self.store.sweep_non_terminal(vidsum_models::INTERRUPTED).await?;
        for job_id in &swept {
            self.bundles.discard(job_id).await;
        }
        if !swept.is_empty() {
            warn!("Marked {} jobs failed:interrupted on startup", swept.len());
        }
        Ok(swept.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;
    use tempfile::TempDir;
    use vidsum_models::JobStatus;
    use vidsum_queue::QueueConfig;
    use vidsum_storage::UploadConfig;

    async fn setup() -> (TempDir, CacheCoordinator, Arc<JobQueue>) {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::open(dir.path().join("metadata.db"))
            .await
            .unwrap();
        let uploads = UploadStore::new(UploadConfig::new(dir.path()), store.clone());
        let bundles = BundleStore::new(dir.path());
        let queue = Arc::new(JobQueue::new(QueueConfig::default()));
        let coordinator = CacheCoordinator::new(
            store,
            bundles,
            uploads,
            Arc::clone(&queue),
            CancelRegistry::new(),
            CacheConfig::default(),
        );
        (dir, coordinator, queue)
    }

    async fn upload_sample(coordinator: &CacheCoordinator) -> vidsum_models::UploadRecord {
        coordinator
            .uploads
            .put(
                stream::iter(vec![Ok(Bytes::from_static(
                    b"1\n00:00:00,000 --> 00:00:02,000\nhello\n",
                ))]),
                "sample.srt",
                "application/x-subrip",
                None,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_local_get_or_create_enqueues_once() {
        let (_dir, coordinator, queue) = setup().await;
        let record = upload_sample(&coordinator).await;
        let source = LocalSourceRef::Id(record.file_id.clone());

        let first = coordinator.get_or_create_local(&source, false).await.unwrap();
        let job = first.new_job().expect("first request creates a job").clone();

        // Second request adopts the same in-flight job
        let second = coordinator.get_or_create_local(&source, false).await.unwrap();
        match second {
            GetOrCreateOutcome::InFlight(_, adopted) => assert_eq!(adopted.job_id, job.job_id),
            other => panic!("expected InFlight, got {:?}", other),
        }

        // Exactly one id was enqueued
        assert_eq!(queue.dequeue().await, Some(job.job_id));
        assert_eq!(queue.overflow_len(), 0);
    }

    #[tokio::test]
    async fn test_file_id_and_hash_key_identically() {
        let (_dir, coordinator, _queue) = setup().await;
        let record = upload_sample(&coordinator).await;

        let by_id = coordinator
            .get_or_create_local(&LocalSourceRef::Id(record.file_id.clone()), false)
            .await
            .unwrap();
        let by_hash = coordinator
            .get_or_create_local(&LocalSourceRef::Hash(record.file_hash.clone()), false)
            .await
            .unwrap();

        assert_eq!(by_id.entry().cache_key, by_hash.entry().cache_key);
    }

    #[tokio::test]
    async fn test_unknown_file_id_is_not_found() {
        let (_dir, coordinator, _queue) = setup().await;
        let missing = LocalSourceRef::Id(FileId::generate());
        let err = coordinator
            .get_or_create_local(&missing, false)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_url_get_or_create_without_probe_tool() {
        // yt-dlp is unavailable in the test environment; keying must fall
        // back to the normalized URL and still create exactly one entry.
        let (_dir, coordinator, queue) = setup().await;

        let first = coordinator
            .get_or_create_url("https://Example.com/v/abc?utm_source=x", false)
            .await
            .unwrap();
        assert!(first.new_job().is_some());

        let second = coordinator
            .get_or_create_url("https://example.com/v/abc", false)
            .await
            .unwrap();
        assert_eq!(first.entry().cache_key, second.entry().cache_key);
        assert!(matches!(second, GetOrCreateOutcome::InFlight(_, _)));

        assert!(queue.dequeue().await.is_some());
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let (_dir, coordinator, _queue) = setup().await;
        let err = coordinator
            .get_or_create_url("ftp://example.com/v", false)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidSource(_)));
    }

    #[tokio::test]
    async fn test_delete_cancels_in_flight_job() {
        let (_dir, coordinator, _queue) = setup().await;
        let record = upload_sample(&coordinator).await;
        let source = LocalSourceRef::Id(record.file_id.clone());

        let outcome = coordinator.get_or_create_local(&source, false).await.unwrap();
        let job = outcome.new_job().unwrap().clone();
        let cancel_rx = coordinator.cancels.register(&job.job_id);

        let deleted = coordinator.delete(&outcome.entry().cache_key).await.unwrap();
        assert!(deleted);
        assert!(*cancel_rx.borrow(), "in-flight job was cancelled");

        // Deleting again is a no-op
        assert!(!coordinator.delete(&outcome.entry().cache_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_interrupted_discards_staging() {
        let (_dir, coordinator, _queue) = setup().await;
        let record = upload_sample(&coordinator).await;
        let source = LocalSourceRef::Id(record.file_id);

        let outcome = coordinator.get_or_create_local(&source, false).await.unwrap();
        let job = outcome.new_job().unwrap().clone();

        // Simulate a crash mid-run: job running, staging populated
        coordinator.store.mark_running(&job.job_id).await.unwrap();
        let staging = coordinator.bundles.stage(&job.job_id).await.unwrap();
        tokio::fs::write(staging.join("audio.wav"), b"partial").await.unwrap();

        let swept = coordinator.sweep_interrupted().await.unwrap();
        assert_eq!(swept, 1);
        assert!(!staging.exists());

        let job_row = coordinator.get_job(&job.job_id).await.unwrap().unwrap();
        assert_eq!(job_row.status, JobStatus::Failed);
        assert_eq!(job_row.error.as_deref(), Some("interrupted"));

        // The key has no non-terminal job left; a new request recreates
        let again = coordinator
            .get_or_create_local(&LocalSourceRef::Hash(
                vidsum_models::FileHash::parse(&outcome.entry().source_ref).unwrap(),
            ), false)
            .await
            .unwrap();
        assert!(again.new_job().is_some());
    }
}
