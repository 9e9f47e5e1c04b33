//! Cache GC janitor.
//!
//! Applies the retention policy: completed entries expire after
//! `cache_ttl_days`, failed entries after `failed_ttl_hours`, and the total
//! bundle footprint stays under `cache_max_bytes` by evicting the least
//! recently accessed bundles first.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use vidsum_models::EntryStatus;
use vidsum_store::MetadataStore;
use vidsum_storage::BundleStore;

use crate::config::CacheConfig;
use crate::error::CacheResult;

/// Periodic retention sweeper for the summary cache.
pub struct CacheJanitor {
    store: MetadataStore,
    bundles: BundleStore,
    config: Arc<CacheConfig>,
}

impl CacheJanitor {
    pub fn new(store: MetadataStore, bundles: BundleStore, config: CacheConfig) -> Self {
        Self {
            store,
            bundles,
            config: Arc::new(config),
        }
    }

    /// Run until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.janitor_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        warn!("Cache janitor pass failed: {}", e);
                    }
                }
            }
        }
        debug!("Cache janitor stopped");
    }

    /// One GC pass. Exposed for tests.
    pub async fn run_once(&self) -> CacheResult<usize> {
        let mut removed = 0;
        removed += self.expire_terminal().await?;
        removed += self.enforce_size_budget().await?;
        if removed > 0 {
            info!("Cache janitor removed {} entries", removed);
        }
        Ok(removed)
    }

    /// Remove terminal entries past their TTLs.
    async fn expire_terminal(&self) -> CacheResult<usize> {
        let now = Utc::now();
        let mut removed = 0;

        let completed_cutoff = now - ChronoDuration::days(self.config.cache_ttl_days as i64);
        for entry in self
            .store
            .entries_updated_before(EntryStatus::Completed, completed_cutoff)
            .await?
        {
            self.remove_entry(&entry).await?;
            removed += 1;
        }

        let failed_cutoff = now - ChronoDuration::hours(self.config.failed_ttl_hours as i64);
        for entry in self
            .store
            .entries_updated_before(EntryStatus::Failed, failed_cutoff)
            .await?
        {
            self.remove_entry(&entry).await?;
            removed += 1;
        }

        Ok(removed)
    }

    /// Evict least-recently-accessed completed bundles beyond the byte
    /// budget.
    async fn enforce_size_budget(&self) -> CacheResult<usize> {
        let entries = self.store.completed_entries_by_access().await?;

        let mut sizes = Vec::with_capacity(entries.len());
        let mut total: u64 = 0;
        for entry in &entries {
            let size = self
                .bundles
                .bundle_size(entry.source_type, &entry.cache_key)
                .await?;
            total += size;
            sizes.push(size);
        }

        if total <= self.config.cache_max_bytes {
            return Ok(0);
        }

        let mut removed = 0;
        for (entry, size) in entries.iter().zip(sizes) {
            if total <= self.config.cache_max_bytes {
                break;
            }
            debug!(
                cache_key = entry.cache_key.as_str(),
                size, "Evicting bundle over size budget"
            );
            self.remove_entry(entry).await?;
            total = total.saturating_sub(size);
            removed += 1;
        }
        Ok(removed)
    }

    async fn remove_entry(&self, entry: &vidsum_models::CacheEntry) -> CacheResult<()> {
        self.store.delete_entry(&entry.cache_key).await?;
        self.bundles
            .remove(entry.source_type, &entry.cache_key)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;
    use vidsum_models::{CacheKey, SourceType};
    use vidsum_store::EntryPlan;

    async fn setup(config: CacheConfig) -> (TempDir, MetadataStore, CacheJanitor) {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::open(dir.path().join("metadata.db"))
            .await
            .unwrap();
        let bundles = BundleStore::new(dir.path());
        let janitor = CacheJanitor::new(store.clone(), bundles, config);
        (dir, store, janitor)
    }

    async fn complete_entry(store: &MetadataStore, key: &CacheKey, summary: &str) {
        let outcome = store
            .entry_get_or_create(&EntryPlan {
                cache_key: key.clone(),
                source_type: SourceType::Url,
                source_ref: "https://example.com/v".into(),
                profile_version: "v1".into(),
                refresh: false,
                completed_is_valid: true,
            })
            .await
            .unwrap();
        let job = outcome.new_job().unwrap().clone();
        store.mark_running(&job.job_id).await.unwrap();
        store
            .mark_completed(&job.job_id, summary, None, "/cache/url/x")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fresh_entries_survive() {
        let (_dir, store, janitor) = setup(CacheConfig::default()).await;
        let key = CacheKey::parse(&"a".repeat(64)).unwrap();
        complete_entry(&store, &key, "summary").await;

        assert_eq!(janitor.run_once().await.unwrap(), 0);
        assert!(store.get_entry(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_completed_entries() {
        let config = CacheConfig {
            cache_ttl_days: 0,
            ..CacheConfig::default()
        };
        let (_dir, store, janitor) = setup(config).await;
        let key = CacheKey::parse(&"b".repeat(64)).unwrap();
        complete_entry(&store, &key, "summary").await;

        // updated_at is now; a zero-day TTL makes it instantly stale
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(janitor.run_once().await.unwrap(), 1);
        assert!(store.get_entry(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_size_budget_evicts_least_recently_accessed() {
        let config = CacheConfig {
            cache_max_bytes: 10,
            ..CacheConfig::default()
        };
        let (dir, store, janitor) = setup(config).await;

        let old_key = CacheKey::parse(&"c".repeat(64)).unwrap();
        let new_key = CacheKey::parse(&"d".repeat(64)).unwrap();
        complete_entry(&store, &old_key, "old").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        complete_entry(&store, &new_key, "new").await;

        // Two 8-byte bundles against a 10-byte budget
        for key in [&old_key, &new_key] {
            let bundle_dir = dir.path().join("cache/url").join(key.as_str());
            tokio::fs::create_dir_all(&bundle_dir).await.unwrap();
            tokio::fs::write(bundle_dir.join("summary.json"), vec![0u8; 8])
                .await
                .unwrap();
        }

        assert_eq!(janitor.run_once().await.unwrap(), 1);
        assert!(
            store.get_entry(&old_key).await.unwrap().is_none(),
            "older entry evicted first"
        );
        assert!(store.get_entry(&new_key).await.unwrap().is_some());
    }
}
