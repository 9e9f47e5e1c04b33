//! Filesystem utilities.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::error::StorageResult;

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Attempts a fast rename first; on EXDEV falls back to copy-then-delete,
/// copying through a temp file next to `dst` so the final rename stays
/// atomic on the destination filesystem.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> StorageResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            let tmp_dst = dst.with_extension("part");
            fs::copy(src, &tmp_dst).await?;
            fs::rename(&tmp_dst, dst).await?;
            fs::remove_file(src).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// EXDEV is error code 18 on Linux/macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

/// Streaming SHA-256 of a file, hex-encoded.
pub async fn hash_file(path: impl AsRef<Path>) -> StorageResult<(String, u64)> {
    let mut file = fs::File::open(path.as_ref()).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }

    let mut hex = String::with_capacity(64);
    for byte in hasher.finalize() {
        hex.push_str(&format!("{:02x}", byte));
    }
    Ok((hex, total))
}

/// Total size in bytes of all regular files under `dir` (non-recursive
/// directories are walked one level at a time).
pub async fn dir_size(dir: impl AsRef<Path>) -> StorageResult<u64> {
    let mut total = 0u64;
    let mut stack = vec![dir.as_ref().to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_dir() {
                stack.push(entry.path());
            } else {
                total += meta.len();
            }
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_creates_parents() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("nested/deeper/dst.bin");

        fs::write(&src, b"payload").await.unwrap();
        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_hash_file_matches_known_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").await.unwrap();

        let (hex, size) = hash_file(&path).await.unwrap();
        assert_eq!(size, 0);
        assert_eq!(
            hex,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn test_dir_size_walks_subdirectories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).await.unwrap();
        fs::write(dir.path().join("a/x"), vec![0u8; 10]).await.unwrap();
        fs::write(dir.path().join("a/b/y"), vec![0u8; 5]).await.unwrap();

        assert_eq!(dir_size(dir.path()).await.unwrap(), 15);
        assert_eq!(dir_size(dir.path().join("missing")).await.unwrap(), 0);
    }
}
