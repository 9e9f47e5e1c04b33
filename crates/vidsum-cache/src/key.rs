//! Cache-key derivation.
//!
//! Keys are a function solely of source identity and the profile version.
//! Per-request options never reach this module, so they can never fork the
//! cache.

use vidsum_models::{sha256_hex, CacheKey, FileHash};

/// Key for a URL source.
///
/// When probing yielded a stable `(extractor, video_id)` pair, that
/// identity is preferred: every URL shape naming the same video converges
/// on one key. Otherwise the normalized URL stands in.
pub fn url_cache_key(
    probed: Option<(&str, &str)>,
    normalized_url: &str,
    profile_version: &str,
) -> CacheKey {
    let input = match probed {
        Some((extractor, video_id)) => {
            format!("url:{}:{}:{}", extractor, video_id, profile_version)
        }
        None => format!("url:{}:{}", normalized_url, profile_version),
    };
    CacheKey::parse(&sha256_hex(input.as_bytes())).expect("sha256 hex is a valid cache key")
}

/// Key for a local source, derived from the content hash.
pub fn local_cache_key(file_hash: &FileHash, profile_version: &str) -> CacheKey {
    let input = format!("file:{}:{}", file_hash, profile_version);
    CacheKey::parse(&sha256_hex(input.as_bytes())).expect("sha256 hex is a valid cache key")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> FileHash {
        FileHash::parse(&"ab".repeat(32)).unwrap()
    }

    #[test]
    fn test_probed_identity_beats_url_shape() {
        let a = url_cache_key(
            Some(("Youtube", "abc123def45")),
            "https://youtube.com/watch?v=abc123def45",
            "v1",
        );
        let b = url_cache_key(
            Some(("Youtube", "abc123def45")),
            "https://youtu.be/abc123def45",
            "v1",
        );
        assert_eq!(a, b, "same probed identity, same key");
    }

    #[test]
    fn test_fallback_uses_normalized_url() {
        let a = url_cache_key(None, "https://example.com/v?x=1", "v1");
        let b = url_cache_key(None, "https://example.com/v?x=1", "v1");
        let c = url_cache_key(None, "https://example.com/v?x=2", "v1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_profile_version_salts_every_key() {
        let url_v1 = url_cache_key(Some(("Youtube", "abc")), "u", "v1");
        let url_v2 = url_cache_key(Some(("Youtube", "abc")), "u", "v2");
        assert_ne!(url_v1, url_v2);

        let local_v1 = local_cache_key(&hash(), "v1");
        let local_v2 = local_cache_key(&hash(), "v2");
        assert_ne!(local_v1, local_v2);
    }

    #[test]
    fn test_url_and_local_namespaces_disjoint() {
        // Same raw material through both derivations must never collide
        let url = url_cache_key(None, &hash().to_string(), "v1");
        let local = local_cache_key(&hash(), "v1");
        assert_ne!(url, local);
    }
}
