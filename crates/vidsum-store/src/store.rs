//! Metadata store over SQLite.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use vidsum_models::{
    CacheEntry, CacheKey, EntryStatus, FileHash, FileId, FileType, JobId, JobRecord, JobStatus,
    SourceType, UploadRecord,
};

use crate::error::{StoreError, StoreResult};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS uploads (
    file_id       TEXT PRIMARY KEY,
    original_name TEXT NOT NULL,
    size          INTEGER NOT NULL,
    mime_type     TEXT NOT NULL,
    file_type     TEXT NOT NULL,
    file_hash     TEXT NOT NULL,
    stored_path   TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    expires_at    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_uploads_file_hash ON uploads(file_hash);
CREATE INDEX IF NOT EXISTS idx_uploads_expires_at ON uploads(expires_at);
CREATE INDEX IF NOT EXISTS idx_uploads_stored_path ON uploads(stored_path);

CREATE TABLE IF NOT EXISTS cache_entries (
    cache_key       TEXT PRIMARY KEY,
    source_type     TEXT NOT NULL,
    source_ref      TEXT NOT NULL,
    status          TEXT NOT NULL,
    summary_text    TEXT,
    source_name     TEXT,
    bundle_path     TEXT,
    error           TEXT,
    profile_version TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    last_accessed   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cache_entries_status ON cache_entries(status);
CREATE INDEX IF NOT EXISTS idx_cache_entries_last_accessed ON cache_entries(last_accessed);

CREATE TABLE IF NOT EXISTS cache_jobs (
    job_id     TEXT PRIMARY KEY,
    cache_key  TEXT NOT NULL,
    status     TEXT NOT NULL,
    error      TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cache_jobs_cache_key ON cache_jobs(cache_key);
CREATE INDEX IF NOT EXISTS idx_cache_jobs_status ON cache_jobs(status);
"#;

/// Inputs to the transactional check-or-create.
#[derive(Debug, Clone)]
pub struct EntryPlan {
    pub cache_key: CacheKey,
    pub source_type: SourceType,
    pub source_ref: String,
    pub profile_version: String,
    /// Caller asked to recompute even if a terminal entry exists.
    pub refresh: bool,
    /// Set by the caller after validating the on-disk bundle. A completed
    /// row whose bundle failed validation is recomputed, never reported
    /// as a hit.
    pub completed_is_valid: bool,
}

/// Outcome of `entry_get_or_create`.
#[derive(Debug)]
pub enum GetOrCreateOutcome {
    /// Valid completed entry; no work to do.
    Hit(CacheEntry),
    /// Terminal failure and the caller did not ask for a refresh.
    Failed(CacheEntry),
    /// Work is already in flight; the existing job was adopted.
    InFlight(CacheEntry, JobRecord),
    /// A fresh job was created (new entry, refresh, or stale bundle).
    Created(CacheEntry, JobRecord),
}

impl GetOrCreateOutcome {
    /// The job to enqueue, if one was created.
    pub fn new_job(&self) -> Option<&JobRecord> {
        match self {
            GetOrCreateOutcome::Created(_, job) => Some(job),
            _ => None,
        }
    }

    pub fn entry(&self) -> &CacheEntry {
        match self {
            GetOrCreateOutcome::Hit(e)
            | GetOrCreateOutcome::Failed(e)
            | GetOrCreateOutcome::InFlight(e, _)
            | GetOrCreateOutcome::Created(e, _) => e,
        }
    }
}

/// Durable tables for uploads, cache entries and jobs.
#[derive(Clone)]
pub struct MetadataStore {
    /// Concurrent pool for reads.
    read_pool: SqlitePool,
    /// Single-connection pool: every write (and every read-modify-write
    /// transaction) is serialized here.
    write_pool: SqlitePool,
}

impl MetadataStore {
    /// Open (creating if necessary) the store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let write_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        let read_pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&write_pool).await?;
        info!("Metadata store opened at {}", path.display());

        Ok(Self {
            read_pool,
            write_pool,
        })
    }

    // ========================================================================
    // Uploads
    // ========================================================================

    /// Persist a new upload record.
    pub async fn insert_upload(&self, record: &UploadRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO uploads \
             (file_id, original_name, size, mime_type, file_type, file_hash, stored_path, created_at, expires_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.file_id.as_str())
        .bind(&record.original_name)
        .bind(record.size as i64)
        .bind(&record.mime_type)
        .bind(record.file_type.as_str())
        .bind(record.file_hash.as_str())
        .bind(&record.stored_path)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.write_pool)
        .await?;
        Ok(())
    }

    /// Fetch an upload record without expiry handling.
    pub async fn get_upload(&self, file_id: &FileId) -> StoreResult<Option<UploadRecord>> {
        let row = sqlx::query("SELECT * FROM uploads WHERE file_id = ?")
            .bind(file_id.as_str())
            .fetch_optional(&self.read_pool)
            .await?;
        row.map(row_to_upload).transpose()
    }

    /// Newest live (non-expired) record with the given content hash.
    pub async fn get_upload_by_hash(&self, hash: &FileHash) -> StoreResult<Option<UploadRecord>> {
        let row = sqlx::query(
            "SELECT * FROM uploads WHERE file_hash = ? AND expires_at > ? \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(hash.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.read_pool)
        .await?;
        row.map(row_to_upload).transpose()
    }

    /// Remove an upload row. Returns the removed record and whether its
    /// stored path is still referenced by other rows.
    pub async fn delete_upload(
        &self,
        file_id: &FileId,
    ) -> StoreResult<Option<(UploadRecord, bool)>> {
        let mut tx = self.write_pool.begin().await?;

        let row = sqlx::query("SELECT * FROM uploads WHERE file_id = ?")
            .bind(file_id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let record = row_to_upload(row)?;

        sqlx::query("DELETE FROM uploads WHERE file_id = ?")
            .bind(file_id.as_str())
            .execute(&mut *tx)
            .await?;

        let refs: i64 = sqlx::query("SELECT COUNT(*) AS n FROM uploads WHERE stored_path = ?")
            .bind(&record.stored_path)
            .fetch_one(&mut *tx)
            .await?
            .try_get("n")?;

        tx.commit().await?;
        Ok(Some((record, refs > 0)))
    }

    /// Number of live records pointing at a stored path.
    pub async fn stored_path_refs(&self, stored_path: &str) -> StoreResult<i64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM uploads WHERE stored_path = ?")
            .bind(stored_path)
            .fetch_one(&self.read_pool)
            .await?
            .try_get("n")?;
        Ok(count)
    }

    /// All records past their TTL.
    pub async fn expired_uploads(&self, now: DateTime<Utc>) -> StoreResult<Vec<UploadRecord>> {
        let rows = sqlx::query("SELECT * FROM uploads WHERE expires_at <= ?")
            .bind(now)
            .fetch_all(&self.read_pool)
            .await?;
        rows.into_iter().map(row_to_upload).collect()
    }

    // ========================================================================
    // Cache entries and jobs
    // ========================================================================

    pub async fn get_entry(&self, key: &CacheKey) -> StoreResult<Option<CacheEntry>> {
        let row = sqlx::query("SELECT * FROM cache_entries WHERE cache_key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.read_pool)
            .await?;
        row.map(row_to_entry).transpose()
    }

    pub async fn get_job(&self, job_id: &JobId) -> StoreResult<Option<JobRecord>> {
        let row = sqlx::query("SELECT * FROM cache_jobs WHERE job_id = ?")
            .bind(job_id.as_str())
            .fetch_optional(&self.read_pool)
            .await?;
        row.map(row_to_job).transpose()
    }

    /// The non-terminal job for a key, if any.
    pub async fn get_active_job(&self, key: &CacheKey) -> StoreResult<Option<JobRecord>> {
        let row = sqlx::query(
            "SELECT * FROM cache_jobs WHERE cache_key = ? AND status IN ('pending', 'running') \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(key.as_str())
        .fetch_optional(&self.read_pool)
        .await?;
        row.map(row_to_job).transpose()
    }

    /// Transactional check-or-create.
    ///
    /// Runs on the single-connection writer pool, so two concurrent calls
    /// for the same key serialize and exactly one of them creates the job.
    pub async fn entry_get_or_create(&self, plan: &EntryPlan) -> StoreResult<GetOrCreateOutcome> {
        let mut tx = self.write_pool.begin().await?;
        let now = Utc::now();

        let existing = sqlx::query("SELECT * FROM cache_entries WHERE cache_key = ?")
            .bind(plan.cache_key.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .map(row_to_entry)
            .transpose()?;

        let outcome = match existing {
            None => {
                let entry = CacheEntry::new(
                    plan.cache_key.clone(),
                    plan.source_type,
                    plan.source_ref.clone(),
                    plan.profile_version.clone(),
                );
                sqlx::query(
                    "INSERT INTO cache_entries \
                     (cache_key, source_type, source_ref, status, profile_version, created_at, updated_at, last_accessed) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(entry.cache_key.as_str())
                .bind(entry.source_type.as_str())
                .bind(&entry.source_ref)
                .bind(entry.status.as_str())
                .bind(&entry.profile_version)
                .bind(entry.created_at)
                .bind(entry.updated_at)
                .bind(entry.last_accessed)
                .execute(&mut *tx)
                .await?;

                let job = insert_job(&mut tx, &entry.cache_key).await?;
                GetOrCreateOutcome::Created(entry, job)
            }
            Some(entry) => match entry.status {
                EntryStatus::Completed
                    if !plan.refresh
                        && plan.completed_is_valid
                        && entry.profile_version == plan.profile_version =>
                {
                    sqlx::query("UPDATE cache_entries SET last_accessed = ? WHERE cache_key = ?")
                        .bind(now)
                        .bind(entry.cache_key.as_str())
                        .execute(&mut *tx)
                        .await?;
                    GetOrCreateOutcome::Hit(CacheEntry {
                        last_accessed: now,
                        ..entry
                    })
                }
                // Interrupted entries come from the startup sweep, not a
                // real pipeline attempt; a new request retries them without
                // requiring `refresh`.
                EntryStatus::Failed
                    if !plan.refresh
                        && entry.error.as_deref() != Some(vidsum_models::INTERRUPTED) =>
                {
                    GetOrCreateOutcome::Failed(entry)
                }
                EntryStatus::Pending | EntryStatus::Running => {
                    let job = sqlx::query(
                        "SELECT * FROM cache_jobs WHERE cache_key = ? \
                         AND status IN ('pending', 'running') \
                         ORDER BY created_at DESC LIMIT 1",
                    )
                    .bind(entry.cache_key.as_str())
                    .fetch_optional(&mut *tx)
                    .await?
                    .map(row_to_job)
                    .transpose()?;

                    match job {
                        Some(job) => GetOrCreateOutcome::InFlight(entry, job),
                        None => {
                            // Entry left without a live job (should not
                            // happen outside a crash window): heal it.
                            warn!(
                                cache_key = entry.cache_key.as_str(),
                                "In-flight entry without a live job, creating one"
                            );
                            let job = insert_job(&mut tx, &entry.cache_key).await?;
                            GetOrCreateOutcome::Created(entry, job)
                        }
                    }
                }
                // refresh, stale bundle, or profile drift: reset to pending
                _ => {
                    sqlx::query(
                        "UPDATE cache_entries SET status = 'pending', summary_text = NULL, \
                         bundle_path = NULL, error = NULL, source_ref = ?, profile_version = ?, \
                         updated_at = ?, last_accessed = ? WHERE cache_key = ?",
                    )
                    .bind(&plan.source_ref)
                    .bind(&plan.profile_version)
                    .bind(now)
                    .bind(now)
                    .bind(entry.cache_key.as_str())
                    .execute(&mut *tx)
                    .await?;

                    let job = insert_job(&mut tx, &entry.cache_key).await?;
                    let entry = CacheEntry {
                        status: EntryStatus::Pending,
                        summary_text: None,
                        bundle_path: None,
                        error: None,
                        source_ref: plan.source_ref.clone(),
                        profile_version: plan.profile_version.clone(),
                        updated_at: now,
                        last_accessed: now,
                        ..entry
                    };
                    GetOrCreateOutcome::Created(entry, job)
                }
            },
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Transition a job and its entry to running.
    pub async fn mark_running(&self, job_id: &JobId) -> StoreResult<CacheEntry> {
        let mut tx = self.write_pool.begin().await?;
        let now = Utc::now();

        let job = sqlx::query("SELECT * FROM cache_jobs WHERE job_id = ?")
            .bind(job_id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .map(row_to_job)
            .transpose()?
            .ok_or_else(|| StoreError::not_found(format!("job {}", job_id)))?;

        sqlx::query("UPDATE cache_jobs SET status = 'running', updated_at = ? WHERE job_id = ?")
            .bind(now)
            .bind(job_id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE cache_entries SET status = 'running', updated_at = ? WHERE cache_key = ?")
            .bind(now)
            .bind(job.cache_key.as_str())
            .execute(&mut *tx)
            .await?;

        let entry = sqlx::query("SELECT * FROM cache_entries WHERE cache_key = ?")
            .bind(job.cache_key.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .map(row_to_entry)
            .transpose()?
            .ok_or_else(|| StoreError::not_found(format!("entry {}", job.cache_key)))?;

        tx.commit().await?;
        Ok(entry)
    }

    /// Record pipeline success: entry completed with its summary and bundle.
    pub async fn mark_completed(
        &self,
        job_id: &JobId,
        summary_text: &str,
        source_name: Option<&str>,
        bundle_path: &str,
    ) -> StoreResult<()> {
        let mut tx = self.write_pool.begin().await?;
        let now = Utc::now();

        let job = sqlx::query("SELECT * FROM cache_jobs WHERE job_id = ?")
            .bind(job_id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .map(row_to_job)
            .transpose()?
            .ok_or_else(|| StoreError::not_found(format!("job {}", job_id)))?;

        sqlx::query(
            "UPDATE cache_jobs SET status = 'completed', error = NULL, updated_at = ? WHERE job_id = ?",
        )
        .bind(now)
        .bind(job_id.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE cache_entries SET status = 'completed', summary_text = ?, source_name = COALESCE(?, source_name), \
             bundle_path = ?, error = NULL, updated_at = ?, last_accessed = ? WHERE cache_key = ?",
        )
        .bind(summary_text)
        .bind(source_name)
        .bind(bundle_path)
        .bind(now)
        .bind(now)
        .bind(job.cache_key.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(job_id = job_id.as_str(), "Job completed");
        Ok(())
    }

    /// Record pipeline failure on both the job and its entry.
    pub async fn mark_failed(&self, job_id: &JobId, error: &str) -> StoreResult<()> {
        let mut tx = self.write_pool.begin().await?;
        let now = Utc::now();

        let job = sqlx::query("SELECT * FROM cache_jobs WHERE job_id = ?")
            .bind(job_id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .map(row_to_job)
            .transpose()?
            .ok_or_else(|| StoreError::not_found(format!("job {}", job_id)))?;

        sqlx::query("UPDATE cache_jobs SET status = 'failed', error = ?, updated_at = ? WHERE job_id = ?")
            .bind(error)
            .bind(now)
            .bind(job_id.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE cache_entries SET status = 'failed', error = ?, updated_at = ? WHERE cache_key = ?",
        )
        .bind(error)
        .bind(now)
        .bind(job.cache_key.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Bump `last_accessed` on a read path.
    pub async fn touch_last_accessed(&self, key: &CacheKey) -> StoreResult<()> {
        sqlx::query("UPDATE cache_entries SET last_accessed = ? WHERE cache_key = ?")
            .bind(Utc::now())
            .bind(key.as_str())
            .execute(&self.write_pool)
            .await?;
        Ok(())
    }

    /// Remove an entry and all its jobs. Returns the removed entry.
    pub async fn delete_entry(&self, key: &CacheKey) -> StoreResult<Option<CacheEntry>> {
        let mut tx = self.write_pool.begin().await?;

        let entry = sqlx::query("SELECT * FROM cache_entries WHERE cache_key = ?")
            .bind(key.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .map(row_to_entry)
            .transpose()?;
        if entry.is_none() {
            return Ok(None);
        }

        sqlx::query("DELETE FROM cache_jobs WHERE cache_key = ?")
            .bind(key.as_str())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM cache_entries WHERE cache_key = ?")
            .bind(key.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(entry)
    }

    /// Startup sweep: every non-terminal job (and its entry) becomes
    /// `failed` with the given reason. Returns the swept job ids so staging
    /// directories can be discarded.
    pub async fn sweep_non_terminal(&self, reason: &str) -> StoreResult<Vec<JobId>> {
        let mut tx = self.write_pool.begin().await?;
        let now = Utc::now();

        let rows = sqlx::query(
            "SELECT job_id FROM cache_jobs WHERE status IN ('pending', 'running')",
        )
        .fetch_all(&mut *tx)
        .await?;
        let job_ids: Vec<JobId> = rows
            .into_iter()
            .map(|row| {
                let id: String = row.try_get("job_id")?;
                JobId::parse(&id).map_err(|e| StoreError::decode(e.to_string()))
            })
            .collect::<StoreResult<_>>()?;

        sqlx::query(
            "UPDATE cache_jobs SET status = 'failed', error = ?, updated_at = ? \
             WHERE status IN ('pending', 'running')",
        )
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE cache_entries SET status = 'failed', error = ?, updated_at = ? \
             WHERE status IN ('pending', 'running')",
        )
        .bind(reason)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        if !job_ids.is_empty() {
            info!("Swept {} interrupted jobs", job_ids.len());
        }
        Ok(job_ids)
    }

    // ========================================================================
    // GC queries
    // ========================================================================

    /// Terminal entries in `status` last updated before `cutoff`.
    pub async fn entries_updated_before(
        &self,
        status: EntryStatus,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<CacheEntry>> {
        let rows = sqlx::query("SELECT * FROM cache_entries WHERE status = ? AND updated_at < ?")
            .bind(status.as_str())
            .bind(cutoff)
            .fetch_all(&self.read_pool)
            .await?;
        rows.into_iter().map(row_to_entry).collect()
    }

    /// Completed entries ordered least-recently-accessed first.
    pub async fn completed_entries_by_access(&self) -> StoreResult<Vec<CacheEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM cache_entries WHERE status = 'completed' ORDER BY last_accessed ASC",
        )
        .fetch_all(&self.read_pool)
        .await?;
        rows.into_iter().map(row_to_entry).collect()
    }
}

async fn insert_job(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    cache_key: &CacheKey,
) -> StoreResult<JobRecord> {
    let job = JobRecord::new(cache_key.clone());
    sqlx::query(
        "INSERT INTO cache_jobs (job_id, cache_key, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(job.job_id.as_str())
    .bind(job.cache_key.as_str())
    .bind(job.status.as_str())
    .bind(job.created_at)
    .bind(job.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(job)
}

// ============================================================================
// Row decoding
// ============================================================================

fn row_to_upload(row: sqlx::sqlite::SqliteRow) -> StoreResult<UploadRecord> {
    let file_id: String = row.try_get("file_id")?;
    let file_type: String = row.try_get("file_type")?;
    let file_hash: String = row.try_get("file_hash")?;
    let size: i64 = row.try_get("size")?;

    Ok(UploadRecord {
        file_id: FileId::parse(&file_id).map_err(|e| StoreError::decode(e.to_string()))?,
        original_name: row.try_get("original_name")?,
        size: size as u64,
        mime_type: row.try_get("mime_type")?,
        file_type: FileType::parse(&file_type)
            .ok_or_else(|| StoreError::decode(format!("file_type {}", file_type)))?,
        file_hash: FileHash::parse(&file_hash).map_err(|e| StoreError::decode(e.to_string()))?,
        stored_path: row.try_get("stored_path")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

fn row_to_entry(row: sqlx::sqlite::SqliteRow) -> StoreResult<CacheEntry> {
    let cache_key: String = row.try_get("cache_key")?;
    let source_type: String = row.try_get("source_type")?;
    let status: String = row.try_get("status")?;

    Ok(CacheEntry {
        cache_key: CacheKey::parse(&cache_key).map_err(|e| StoreError::decode(e.to_string()))?,
        source_type: SourceType::parse(&source_type)
            .ok_or_else(|| StoreError::decode(format!("source_type {}", source_type)))?,
        source_ref: row.try_get("source_ref")?,
        status: EntryStatus::parse(&status)
            .ok_or_else(|| StoreError::decode(format!("entry status {}", status)))?,
        summary_text: row.try_get("summary_text")?,
        source_name: row.try_get("source_name")?,
        bundle_path: row.try_get("bundle_path")?,
        error: row.try_get("error")?,
        profile_version: row.try_get("profile_version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        last_accessed: row.try_get("last_accessed")?,
    })
}

fn row_to_job(row: sqlx::sqlite::SqliteRow) -> StoreResult<JobRecord> {
    let job_id: String = row.try_get("job_id")?;
    let cache_key: String = row.try_get("cache_key")?;
    let status: String = row.try_get("status")?;

    Ok(JobRecord {
        job_id: JobId::parse(&job_id).map_err(|e| StoreError::decode(e.to_string()))?,
        cache_key: CacheKey::parse(&cache_key).map_err(|e| StoreError::decode(e.to_string()))?,
        status: JobStatus::parse(&status)
            .ok_or_else(|| StoreError::decode(format!("job status {}", status)))?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, MetadataStore) {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::open(dir.path().join("metadata.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn sample_upload(hash: &str, expires_in_secs: i64) -> UploadRecord {
        let now = Utc::now();
        UploadRecord {
            file_id: FileId::generate(),
            original_name: "sample.mp4".into(),
            size: 1024,
            mime_type: "video/mp4".into(),
            file_type: FileType::Video,
            file_hash: FileHash::parse(hash).unwrap(),
            stored_path: format!("/tmp/uploads/{}", hash),
            created_at: now,
            expires_at: now + ChronoDuration::seconds(expires_in_secs),
        }
    }

    fn plan(key: &CacheKey, refresh: bool) -> EntryPlan {
        EntryPlan {
            cache_key: key.clone(),
            source_type: SourceType::Url,
            source_ref: "https://example.com/v/abc".into(),
            profile_version: "v1".into(),
            refresh,
            completed_is_valid: true,
        }
    }

    #[tokio::test]
    async fn test_upload_round_trip_and_dedup_lookup() {
        let (_dir, store) = open_store().await;
        let hash = "a".repeat(64);
        let record = sample_upload(&hash, 3600);

        store.insert_upload(&record).await.unwrap();

        let fetched = store.get_upload(&record.file_id).await.unwrap().unwrap();
        assert_eq!(fetched.file_hash, record.file_hash);
        assert_eq!(fetched.size, 1024);

        let by_hash = store
            .get_upload_by_hash(&record.file_hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_hash.stored_path, record.stored_path);
    }

    #[tokio::test]
    async fn test_expired_upload_not_returned_by_hash() {
        let (_dir, store) = open_store().await;
        let record = sample_upload(&"b".repeat(64), -10);
        store.insert_upload(&record).await.unwrap();

        assert!(store
            .get_upload_by_hash(&record.file_hash)
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.expired_uploads(Utc::now()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_upload_reports_remaining_refs() {
        let (_dir, store) = open_store().await;
        let hash = "c".repeat(64);
        let first = sample_upload(&hash, 3600);
        let mut second = sample_upload(&hash, 3600);
        second.stored_path = first.stored_path.clone();

        store.insert_upload(&first).await.unwrap();
        store.insert_upload(&second).await.unwrap();

        let (_, shared) = store.delete_upload(&first.file_id).await.unwrap().unwrap();
        assert!(shared, "second record still references the path");

        let (_, shared) = store.delete_upload(&second.file_id).await.unwrap().unwrap();
        assert!(!shared, "last reference removed");
    }

    #[tokio::test]
    async fn test_get_or_create_creates_once_then_adopts() {
        let (_dir, store) = open_store().await;
        let key = CacheKey::parse(&"1".repeat(64)).unwrap();

        let first = store.entry_get_or_create(&plan(&key, false)).await.unwrap();
        let job_id = match &first {
            GetOrCreateOutcome::Created(entry, job) => {
                assert_eq!(entry.status, EntryStatus::Pending);
                job.job_id.clone()
            }
            other => panic!("expected Created, got {:?}", other),
        };

        let second = store.entry_get_or_create(&plan(&key, false)).await.unwrap();
        match second {
            GetOrCreateOutcome::InFlight(_, job) => assert_eq!(job.job_id, job_id),
            other => panic!("expected InFlight, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_single_flight() {
        let (_dir, store) = open_store().await;
        let key = CacheKey::parse(&"2".repeat(64)).unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let plan = plan(&key, false);
            handles.push(tokio::spawn(async move {
                store.entry_get_or_create(&plan).await.unwrap()
            }));
        }

        let mut created = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), GetOrCreateOutcome::Created(_, _)) {
                created += 1;
            }
        }
        assert_eq!(created, 1, "exactly one caller creates the job");
    }

    #[tokio::test]
    async fn test_completed_hit_and_refresh() {
        let (_dir, store) = open_store().await;
        let key = CacheKey::parse(&"3".repeat(64)).unwrap();

        let outcome = store.entry_get_or_create(&plan(&key, false)).await.unwrap();
        let job = outcome.new_job().unwrap().clone();

        store.mark_running(&job.job_id).await.unwrap();
        store
            .mark_completed(&job.job_id, "the summary", Some("A Video"), "/cache/url/x")
            .await
            .unwrap();

        let hit = store.entry_get_or_create(&plan(&key, false)).await.unwrap();
        match &hit {
            GetOrCreateOutcome::Hit(entry) => {
                assert_eq!(entry.summary_text.as_deref(), Some("the summary"));
                assert_eq!(entry.source_name.as_deref(), Some("A Video"));
            }
            other => panic!("expected Hit, got {:?}", other),
        }

        let refreshed = store.entry_get_or_create(&plan(&key, true)).await.unwrap();
        match refreshed {
            GetOrCreateOutcome::Created(entry, new_job) => {
                assert_eq!(entry.status, EntryStatus::Pending);
                assert!(entry.summary_text.is_none());
                assert_ne!(new_job.job_id, job.job_id);
            }
            other => panic!("expected Created on refresh, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_bundle_forces_recompute() {
        let (_dir, store) = open_store().await;
        let key = CacheKey::parse(&"4".repeat(64)).unwrap();

        let outcome = store.entry_get_or_create(&plan(&key, false)).await.unwrap();
        let job = outcome.new_job().unwrap().clone();
        store.mark_running(&job.job_id).await.unwrap();
        store
            .mark_completed(&job.job_id, "summary", None, "/cache/url/x")
            .await
            .unwrap();

        let mut stale = plan(&key, false);
        stale.completed_is_valid = false;
        let outcome = store.entry_get_or_create(&stale).await.unwrap();
        assert!(
            matches!(outcome, GetOrCreateOutcome::Created(_, _)),
            "invalid bundle must not be reported as a hit"
        );
    }

    #[tokio::test]
    async fn test_failed_entry_surfaces_without_refresh() {
        let (_dir, store) = open_store().await;
        let key = CacheKey::parse(&"5".repeat(64)).unwrap();

        let outcome = store.entry_get_or_create(&plan(&key, false)).await.unwrap();
        let job = outcome.new_job().unwrap().clone();
        store.mark_running(&job.job_id).await.unwrap();
        store.mark_failed(&job.job_id, "upstream: asr failed").await.unwrap();

        let outcome = store.entry_get_or_create(&plan(&key, false)).await.unwrap();
        match outcome {
            GetOrCreateOutcome::Failed(entry) => {
                assert_eq!(entry.error.as_deref(), Some("upstream: asr failed"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }

        let job_row = store.get_job(&job.job_id).await.unwrap().unwrap();
        assert_eq!(job_row.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_sweep_non_terminal() {
        let (_dir, store) = open_store().await;
        let key = CacheKey::parse(&"6".repeat(64)).unwrap();

        let outcome = store.entry_get_or_create(&plan(&key, false)).await.unwrap();
        let job = outcome.new_job().unwrap().clone();
        store.mark_running(&job.job_id).await.unwrap();

        let swept = store.sweep_non_terminal("interrupted").await.unwrap();
        assert_eq!(swept, vec![job.job_id.clone()]);

        let job_row = store.get_job(&job.job_id).await.unwrap().unwrap();
        assert_eq!(job_row.status, JobStatus::Failed);
        assert_eq!(job_row.error.as_deref(), Some("interrupted"));

        let entry = store.get_entry(&key).await.unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Failed);
        assert!(store.get_active_job(&key).await.unwrap().is_none());

        // An interrupted entry retries without refresh
        let outcome = store.entry_get_or_create(&plan(&key, false)).await.unwrap();
        assert!(matches!(outcome, GetOrCreateOutcome::Created(_, _)));
    }

    #[tokio::test]
    async fn test_delete_entry_cascades_jobs() {
        let (_dir, store) = open_store().await;
        let key = CacheKey::parse(&"7".repeat(64)).unwrap();

        let outcome = store.entry_get_or_create(&plan(&key, false)).await.unwrap();
        let job = outcome.new_job().unwrap().clone();

        let removed = store.delete_entry(&key).await.unwrap();
        assert!(removed.is_some());
        assert!(store.get_entry(&key).await.unwrap().is_none());
        assert!(store.get_job(&job.job_id).await.unwrap().is_none());

        // Same key recreates from scratch
        let outcome = store.entry_get_or_create(&plan(&key, false)).await.unwrap();
        assert!(matches!(outcome, GetOrCreateOutcome::Created(_, _)));
    }
}
