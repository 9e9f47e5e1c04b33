//! Streaming upload store.
//!
//! Large multipart bodies are written to a staging file chunk by chunk with
//! a running SHA-256; nothing is ever buffered whole in memory. Limits are
//! enforced before and during the stream, identical content is deduplicated
//! by hash, and every failure path unlinks the partial file so that either
//! a record exists with intact content or neither exists.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use vidsum_models::{FileHash, FileId, FileType, UploadRecord};
use vidsum_store::MetadataStore;

use crate::error::{StorageError, StorageResult};
use crate::fs::move_file;

/// Upload store configuration.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory holding `<file_id>/<safe_name>` content and `.staging/`
    pub root: PathBuf,
    /// Hard ceiling on a single upload
    pub max_file_size: u64,
    /// Tolerance above `max_file_size` for the declared-length precheck
    pub grace_bytes: u64,
    /// Streaming write chunk size (buffer capacity)
    pub chunk_size: usize,
    /// Per-chunk read timeout
    pub read_timeout: Duration,
    /// Per-chunk write timeout
    pub write_timeout: Duration,
    /// How long an uploaded file is retained
    pub ttl: Duration,
    /// Max concurrent uploads
    pub concurrency: usize,
    /// How long a request may wait for an upload slot
    pub admission_wait: Duration,
    /// Background reaper period
    pub reaper_interval: Duration,
}

impl UploadConfig {
    /// Defaults rooted under the given work directory.
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        Self {
            root: work_dir.as_ref().join("uploads"),
            max_file_size: 2 * 1024 * 1024 * 1024, // 2GB
            grace_bytes: 1024 * 1024,
            chunk_size: 1024 * 1024,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            ttl: Duration::from_secs(24 * 3600),
            concurrency: 4,
            admission_wait: Duration::from_secs(10),
            reaper_interval: Duration::from_secs(300),
        }
    }

    /// Create config from environment variables.
    pub fn from_env(work_dir: impl AsRef<Path>) -> Self {
        let defaults = Self::new(work_dir);
        Self {
            max_file_size: env_parse("MAX_FILE_SIZE", defaults.max_file_size),
            grace_bytes: env_parse("CONTENT_LENGTH_GRACE_BYTES", defaults.grace_bytes),
            chunk_size: env_parse("UPLOAD_CHUNK_SIZE", defaults.chunk_size),
            read_timeout: Duration::from_secs(env_parse("UPLOAD_READ_TIMEOUT", 30)),
            write_timeout: Duration::from_secs(env_parse("UPLOAD_WRITE_TIMEOUT", 30)),
            ttl: Duration::from_secs(env_parse("UPLOAD_TTL", 24 * 3600)),
            concurrency: env_parse("UPLOAD_CONCURRENCY", defaults.concurrency),
            admission_wait: Duration::from_secs(env_parse("UPLOAD_ADMISSION_WAIT", 10)),
            reaper_interval: Duration::from_secs(env_parse("UPLOAD_REAPER_INTERVAL", 300)),
            ..defaults
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Sanitize a client-supplied file name.
///
/// Strips path components, control characters and leading dots, clamps the
/// length to 128 characters (keeping the extension). Rejects names that are
/// empty after sanitization.
pub fn sanitize_file_name(name: &str) -> StorageResult<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim().trim_start_matches('.');

    if cleaned.is_empty() {
        return Err(StorageError::InvalidName(name.to_string()));
    }

    let chars: Vec<char> = cleaned.chars().collect();
    if chars.len() <= 128 {
        return Ok(cleaned.to_string());
    }

    // Clamp the stem, keep the extension
    match cleaned.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() < 16 => {
            let keep = 128usize.saturating_sub(ext.len() + 1);
            let stem: String = stem.chars().take(keep).collect();
            Ok(format!("{}.{}", stem, ext))
        }
        _ => Ok(chars.into_iter().take(128).collect()),
    }
}

fn extension_of(name: &str) -> Option<&str> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

/// Streaming upload store with content-hash dedup and TTL lifecycle.
#[derive(Clone)]
pub struct UploadStore {
    config: Arc<UploadConfig>,
    store: MetadataStore,
    semaphore: Arc<Semaphore>,
    /// Serializes the lookup/move/insert tail of `put` so concurrent
    /// uploads of identical content converge on one stored path.
    finalize_lock: Arc<tokio::sync::Mutex<()>>,
}

impl UploadStore {
    pub fn new(config: UploadConfig, store: MetadataStore) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            config: Arc::new(config),
            store,
            semaphore,
            finalize_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Stream a body into the store.
    ///
    /// Either returns a persisted record with intact content, or an error
    /// with no record and no partial file left behind.
    pub async fn put<S>(
        &self,
        stream: S,
        declared_name: &str,
        declared_mime: &str,
        declared_size: Option<u64>,
    ) -> StorageResult<UploadRecord>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin,
    {
        let safe_name = sanitize_file_name(declared_name)?;
        let ext = extension_of(&safe_name)
            .ok_or_else(|| StorageError::unsupported_type(safe_name.clone()))?;
        let file_type = FileType::from_extension(ext)
            .ok_or_else(|| StorageError::unsupported_type(format!(".{}", ext)))?;

        // Reject over-declared bodies before reading a single byte.
        if let Some(declared) = declared_size {
            if declared > self.config.max_file_size + self.config.grace_bytes {
                return Err(StorageError::TooLarge {
                    limit: self.config.max_file_size,
                });
            }
        }

        let _permit = tokio::time::timeout(self.config.admission_wait, self.semaphore.acquire())
            .await
            .map_err(|_| StorageError::TooManyRequests)?
            .map_err(|_| StorageError::TooManyRequests)?;

        let staging_dir = self.config.root.join(".staging");
        fs::create_dir_all(&staging_dir).await?;
        let staging_path = staging_dir.join(format!("{}.part", Uuid::new_v4().simple()));

        let streamed = self.write_stream(stream, &staging_path).await;
        let (file_hash, size) = match streamed {
            Ok(done) => done,
            Err(e) => {
                remove_quiet(&staging_path).await;
                return Err(e);
            }
        };

        // The declared MIME and the extension must agree on the file type;
        // generic declarations (octet-stream) defer to the extension.
        if let Some(mime_type) = FileType::from_mime(declared_mime) {
            if mime_type != file_type {
                remove_quiet(&staging_path).await;
                return Err(StorageError::unsupported_type(format!(
                    "{} does not match .{}",
                    declared_mime, ext
                )));
            }
        }

        let file_id = FileId::generate();
        let now = Utc::now();

        // The streaming above runs concurrently; only this short tail is
        // serialized, so two simultaneous uploads of the same bytes cannot
        // both miss the dedup lookup.
        let _finalize = self.finalize_lock.lock().await;

        // Content dedup: reuse an intact stored path when one exists.
        let stored_path = match self.store.get_upload_by_hash(&file_hash).await? {
            Some(existing) if fs::try_exists(&existing.stored_path).await.unwrap_or(false) => {
                debug!(
                    file_hash = file_hash.as_str(),
                    "Duplicate content, reusing {}", existing.stored_path
                );
                remove_quiet(&staging_path).await;
                existing.stored_path
            }
            _ => {
                let dest = self.config.root.join(file_id.as_str()).join(&safe_name);
                move_file(&staging_path, &dest).await?;
                dest.to_string_lossy().to_string()
            }
        };

        let record = UploadRecord {
            file_id,
            original_name: safe_name,
            size,
            mime_type: declared_mime.to_string(),
            file_type,
            file_hash,
            stored_path,
            created_at: now,
            expires_at: now
                + chrono::Duration::from_std(self.config.ttl)
                    .unwrap_or_else(|_| chrono::Duration::seconds(24 * 3600)),
        };

        self.store.insert_upload(&record).await?;
        info!(
            file_id = record.file_id.as_str(),
            file_type = record.file_type.as_str(),
            size = record.size,
            "Upload stored"
        );
        Ok(record)
    }

    /// Chunked copy of the body into `staging_path` under the size cap,
    /// with per-chunk timeouts and a running hash.
    async fn write_stream<S>(
        &self,
        mut stream: S,
        staging_path: &Path,
    ) -> StorageResult<(FileHash, u64)>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin,
    {
        let file = fs::File::create(staging_path).await?;
        let mut writer = tokio::io::BufWriter::with_capacity(self.config.chunk_size, file);
        let mut hasher = Sha256::new();
        let mut total: u64 = 0;

        loop {
            let next = tokio::time::timeout(self.config.read_timeout, stream.next())
                .await
                .map_err(|_| StorageError::Timeout)?;
            let Some(chunk) = next else { break };
            let chunk = chunk?;

            total += chunk.len() as u64;
            if total > self.config.max_file_size {
                return Err(StorageError::TooLarge {
                    limit: self.config.max_file_size,
                });
            }

            hasher.update(&chunk);
            tokio::time::timeout(self.config.write_timeout, writer.write_all(&chunk))
                .await
                .map_err(|_| StorageError::Timeout)??;
        }

        writer.flush().await?;
        writer.into_inner().sync_all().await?;

        let mut hex = String::with_capacity(64);
        for byte in hasher.finalize() {
            hex.push_str(&format!("{:02x}", byte));
        }
        let hash = FileHash::parse(&hex).expect("sha256 hex is always valid");
        Ok((hash, total))
    }

    /// Fetch a record, lazily expiring it.
    pub async fn get(&self, file_id: &FileId) -> StorageResult<UploadRecord> {
        let record = self
            .store
            .get_upload(file_id)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("upload {}", file_id)))?;

        if record.is_expired(Utc::now()) {
            debug!(file_id = file_id.as_str(), "Lazy-expiring upload");
            self.remove(file_id).await?;
            return Err(StorageError::not_found(format!("upload {}", file_id)));
        }
        Ok(record)
    }

    /// Resolve live content by hash (used by the local pipeline branch).
    pub async fn get_by_hash(&self, file_hash: &FileHash) -> StorageResult<UploadRecord> {
        let record = self
            .store
            .get_upload_by_hash(file_hash)
            .await?
            .ok_or_else(|| StorageError::not_found(format!("content {}", file_hash)))?;

        if !fs::try_exists(&record.stored_path).await.unwrap_or(false) {
            return Err(StorageError::not_found(format!("content {}", file_hash)));
        }
        Ok(record)
    }

    /// Remove a record; the stored file goes with it once the last
    /// referring record is gone.
    pub async fn remove(&self, file_id: &FileId) -> StorageResult<()> {
        let Some((record, still_referenced)) = self.store.delete_upload(file_id).await? else {
            return Err(StorageError::not_found(format!("upload {}", file_id)));
        };

        if !still_referenced {
            remove_quiet(Path::new(&record.stored_path)).await;
            if let Some(parent) = Path::new(&record.stored_path).parent() {
                let _ = fs::remove_dir(parent).await;
            }
        }
        Ok(())
    }

    /// Periodic reaper: expired records and orphaned content directories.
    ///
    /// Safe to run alongside concurrent uploads; every mutation goes through
    /// the same serialized metadata store as the writers.
    pub async fn run_reaper(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.reaper_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    if let Err(e) = self.reap_once().await {
                        warn!("Upload reaper pass failed: {}", e);
                    }
                }
            }
        }
        debug!("Upload reaper stopped");
    }

    /// One reaper pass. Exposed for tests.
    pub async fn reap_once(&self) -> StorageResult<usize> {
        let mut reaped = 0;

        for record in self.store.expired_uploads(Utc::now()).await? {
            match self.remove(&record.file_id).await {
                Ok(()) | Err(StorageError::NotFound(_)) => reaped += 1,
                Err(e) => warn!(
                    file_id = record.file_id.as_str(),
                    "Failed to reap expired upload: {}", e
                ),
            }
        }

        reaped += self.reap_orphans().await?;
        Ok(reaped)
    }

    /// Remove content directories with no metadata record (crash leftovers)
    /// and stale staging files.
    async fn reap_orphans(&self) -> StorageResult<usize> {
        let mut reaped = 0;
        let mut entries = match fs::read_dir(&self.config.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();

            if name == ".staging" {
                reaped += reap_stale_staging(&entry.path()).await?;
                continue;
            }

            let Ok(file_id) = FileId::parse(&name) else {
                continue;
            };
            if self.store.get_upload(&file_id).await?.is_none()
                && !self.dir_content_referenced(&entry.path()).await?
            {
                warn!(file_id = name, "Removing orphaned upload directory");
                let _ = fs::remove_dir_all(entry.path()).await;
                reaped += 1;
            }
        }
        Ok(reaped)
    }

    /// Whether any file in `dir` is still a live `stored_path`. Deduplicated
    /// content lives under the first uploader's directory, which can outlive
    /// that record.
    async fn dir_content_referenced(&self, dir: &Path) -> StorageResult<bool> {
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path().to_string_lossy().to_string();
            if self.store.stored_path_refs(&path).await? > 0 {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Remove staging leftovers older than an hour.
async fn reap_stale_staging(staging_dir: &Path) -> StorageResult<usize> {
    const STALE_AFTER: Duration = Duration::from_secs(3600);

    let mut reaped = 0;
    let mut entries = fs::read_dir(staging_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        let stale = meta
            .modified()
            .ok()
            .and_then(|m| m.elapsed().ok())
            .map(|age| age > STALE_AFTER)
            .unwrap_or(false);
        if stale {
            let _ = fs::remove_file(entry.path()).await;
            reaped += 1;
        }
    }
    Ok(reaped)
}

async fn remove_quiet(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tempfile::TempDir;
    use vidsum_models::sha256_hex;

    async fn setup() -> (TempDir, UploadStore) {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::open(dir.path().join("metadata.db"))
            .await
            .unwrap();
        let mut config = UploadConfig::new(dir.path());
        config.max_file_size = 1024;
        config.grace_bytes = 16;
        (dir, UploadStore::new(config, store))
    }

    fn body(chunks: &[&[u8]]) -> impl Stream<Item = std::io::Result<Bytes>> + Unpin {
        stream::iter(
            chunks
                .iter()
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let (_dir, uploads) = setup().await;
        let payload = b"1\n00:00:00,000 --> 00:00:01,000\nhello\n";

        let record = uploads
            .put(body(&[payload]), "sample.srt", "application/x-subrip", None)
            .await
            .unwrap();

        assert_eq!(record.file_type, FileType::Subtitle);
        assert_eq!(record.size, payload.len() as u64);
        assert_eq!(record.file_hash.as_str(), sha256_hex(payload));

        let fetched = uploads.get(&record.file_id).await.unwrap();
        assert_eq!(
            fs::read(&fetched.stored_path).await.unwrap(),
            payload.to_vec()
        );
    }

    #[tokio::test]
    async fn test_duplicate_content_shares_stored_path() {
        let (_dir, uploads) = setup().await;
        let payload = b"identical bytes";

        let first = uploads
            .put(body(&[payload]), "a.mp3", "audio/mpeg", None)
            .await
            .unwrap();
        let second = uploads
            .put(body(&[payload]), "b.mp3", "audio/mpeg", None)
            .await
            .unwrap();

        assert_ne!(first.file_id, second.file_id);
        assert_eq!(first.stored_path, second.stored_path);

        // Removing one record must not affect the other
        uploads.remove(&first.file_id).await.unwrap();
        let survivor = uploads.get(&second.file_id).await.unwrap();
        assert!(fs::try_exists(&survivor.stored_path).await.unwrap());

        uploads.remove(&second.file_id).await.unwrap();
        assert!(!fs::try_exists(&survivor.stored_path).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_identical_puts_share_stored_path() {
        let (_dir, uploads) = setup().await;
        let payload = b"the same bytes every time".to_vec();

        let mut handles = Vec::new();
        for i in 0..4 {
            let uploads = uploads.clone();
            let payload = payload.clone();
            handles.push(tokio::spawn(async move {
                uploads
                    .put(
                        stream::iter(vec![Ok(Bytes::from(payload))]),
                        &format!("copy-{}.mp3", i),
                        "audio/mpeg",
                        None,
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut paths = std::collections::HashSet::new();
        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            let record = handle.await.unwrap();
            paths.insert(record.stored_path);
            ids.insert(record.file_id);
        }
        assert_eq!(ids.len(), 4, "every upload gets its own file_id");
        assert_eq!(paths.len(), 1, "identical content shares one stored path");
    }

    #[tokio::test]
    async fn test_oversize_stream_leaves_nothing_behind() {
        let (dir, uploads) = setup().await;

        // 1025 bytes against a 1024 limit, split over chunks
        let big = vec![0u8; 1025];
        let result = uploads
            .put(body(&[&big[..512], &big[512..]]), "big.mp4", "video/mp4", None)
            .await;

        assert!(matches!(result, Err(StorageError::TooLarge { .. })));

        let staging = dir.path().join("uploads/.staging");
        if staging.exists() {
            let mut entries = fs::read_dir(&staging).await.unwrap();
            assert!(entries.next_entry().await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_declared_size_rejected_before_reading() {
        let (_dir, uploads) = setup().await;

        // A stream that would fail if polled; the precheck must fire first.
        let poisoned = stream::iter(vec![Err::<Bytes, _>(std::io::Error::other("not read"))]);
        let result = uploads
            .put(poisoned, "big.mp4", "video/mp4", Some(2048))
            .await;
        assert!(matches!(result, Err(StorageError::TooLarge { .. })));
    }

    #[tokio::test]
    async fn test_declared_size_within_grace_is_admitted() {
        let (_dir, uploads) = setup().await;
        let payload = b"tiny";

        // 1024 + 16 grace: a declaration of 1030 passes the precheck
        let record = uploads
            .put(body(&[payload]), "clip.mp4", "video/mp4", Some(1030))
            .await
            .unwrap();
        assert_eq!(record.size, payload.len() as u64);
    }

    #[tokio::test]
    async fn test_unknown_extension_rejected() {
        let (_dir, uploads) = setup().await;
        let result = uploads.put(body(&[b"x"]), "tool.exe", "", None).await;
        assert!(matches!(result, Err(StorageError::UnsupportedType(_))));

        let result = uploads.put(body(&[b"x"]), "noext", "", None).await;
        assert!(matches!(result, Err(StorageError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn test_mime_extension_disagreement_rejected() {
        let (_dir, uploads) = setup().await;
        let result = uploads
            .put(body(&[b"x"]), "song.mp3", "video/mp4", None)
            .await;
        assert!(matches!(result, Err(StorageError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn test_expired_record_lazily_removed() {
        let (dir, _) = setup().await;
        let store = MetadataStore::open(dir.path().join("metadata.db"))
            .await
            .unwrap();
        let mut config = UploadConfig::new(dir.path());
        config.ttl = Duration::from_secs(0);
        let uploads = UploadStore::new(config, store);

        let record = uploads
            .put(body(&[b"bytes"]), "old.wav", "audio/wav", None)
            .await
            .unwrap();

        let result = uploads.get(&record.file_id).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
        assert!(!fs::try_exists(&record.stored_path).await.unwrap());
    }

    #[tokio::test]
    async fn test_reaper_removes_expired_and_orphans() {
        let (dir, uploads) = setup().await;

        // Orphan directory without a record
        let orphan = dir
            .path()
            .join("uploads")
            .join(FileId::generate().as_str());
        fs::create_dir_all(&orphan).await.unwrap();
        fs::write(orphan.join("leftover.mp4"), b"x").await.unwrap();

        let reaped = uploads.reap_once().await.unwrap();
        assert!(reaped >= 1);
        assert!(!orphan.exists());
    }

    #[tokio::test]
    async fn test_reaper_keeps_directory_backing_deduped_record() {
        let (_dir, uploads) = setup().await;
        let payload = b"shared bytes";

        // Second record reuses the first record's stored path
        let first = uploads
            .put(body(&[payload]), "a.mp3", "audio/mpeg", None)
            .await
            .unwrap();
        let second = uploads
            .put(body(&[payload]), "b.mp3", "audio/mpeg", None)
            .await
            .unwrap();
        assert_eq!(first.stored_path, second.stored_path);

        // Removing the owner leaves its directory holding shared content
        uploads.remove(&first.file_id).await.unwrap();
        uploads.reap_once().await.unwrap();

        let survivor = uploads.get(&second.file_id).await.unwrap();
        assert!(
            fs::try_exists(&survivor.stored_path).await.unwrap(),
            "shared content must survive the orphan sweep"
        );
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("video.mp4").unwrap(), "video.mp4");
        assert_eq!(
            sanitize_file_name("/etc/../passwd/video.mp4").unwrap(),
            "video.mp4"
        );
        assert_eq!(
            sanitize_file_name("C:\\Users\\x\\clip.mkv").unwrap(),
            "clip.mkv"
        );
        assert_eq!(sanitize_file_name(".hidden.srt").unwrap(), "hidden.srt");
        assert_eq!(sanitize_file_name("a\u{0000}b.srt").unwrap(), "ab.srt");
        assert!(sanitize_file_name("").is_err());
        assert!(sanitize_file_name("...").is_err());
        assert!(sanitize_file_name("dir/").is_err());

        let long = format!("{}.mp4", "x".repeat(300));
        let clamped = sanitize_file_name(&long).unwrap();
        assert_eq!(clamped.chars().count(), 128);
        assert!(clamped.ends_with(".mp4"));
    }
}
