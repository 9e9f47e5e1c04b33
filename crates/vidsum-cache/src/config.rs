//! Cache configuration.

use std::time::Duration;

/// Cache coordinator and GC configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Processing-profile version; changing it invalidates prior entries
    /// by producing different cache keys
    pub profile_version: String,
    /// Days a completed entry is retained
    pub cache_ttl_days: u64,
    /// Hours a failed entry is retained
    pub failed_ttl_hours: u64,
    /// Total on-disk bundle budget; least-recently-accessed bundles are
    /// evicted beyond it
    pub cache_max_bytes: u64,
    /// Janitor period
    pub janitor_interval: Duration,
    /// Timeout for the yt-dlp probe during URL key derivation
    pub probe_timeout: Duration,
    /// Tracking query parameters stripped during URL normalization
    pub tracking_params: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            profile_version: "v1".to_string(),
            cache_ttl_days: 30,
            failed_ttl_hours: 24,
            cache_max_bytes: 50 * 1024 * 1024 * 1024, // 50GB
            janitor_interval: Duration::from_secs(3600),
            probe_timeout: Duration::from_secs(30),
            tracking_params: vidsum_models::DEFAULT_TRACKING_PARAMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl CacheConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            profile_version: std::env::var("PROFILE_VERSION")
                .unwrap_or(defaults.profile_version),
            cache_ttl_days: env_parse("CACHE_TTL_DAYS", defaults.cache_ttl_days),
            failed_ttl_hours: env_parse("FAILED_TTL_HOURS", defaults.failed_ttl_hours),
            cache_max_bytes: env_parse("CACHE_MAX_BYTES", defaults.cache_max_bytes),
            janitor_interval: Duration::from_secs(env_parse("CACHE_JANITOR_INTERVAL", 3600)),
            probe_timeout: Duration::from_secs(env_parse("SOURCE_PROBE_TIMEOUT", 30)),
            tracking_params: std::env::var("URL_TRACKING_PARAMS")
                .map(|s| s.split(',').map(|p| p.trim().to_string()).collect())
                .unwrap_or(defaults.tracking_params),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
