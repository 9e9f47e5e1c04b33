//! Prometheus metrics for the API server.

use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "vidsum_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vidsum_http_request_duration_seconds";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vidsum_rate_limit_hits_total";
    pub const UPLOADS_TOTAL: &str = "vidsum_uploads_total";
    pub const SUMMARY_REQUESTS_TOTAL: &str = "vidsum_summary_requests_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];
    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration.as_secs_f64());
}

/// Record a rate-limited request.
pub fn record_rate_limit_hit(path: &str) {
    let labels = [("path", sanitize_path(path))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Record a finished upload.
pub fn record_upload(file_type: &str, size: u64) {
    let labels = [("file_type", file_type.to_string())];
    counter!(names::UPLOADS_TOTAL, &labels).increment(1);
    histogram!("vidsum_upload_size_bytes", &labels).record(size as f64);
}

/// Record a summary request and its cache outcome.
pub fn record_summary_request(source_type: &str, outcome: &str) {
    let labels = [
        ("source_type", source_type.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::SUMMARY_REQUESTS_TOTAL, &labels).increment(1);
}

/// Collapse ids out of paths to keep label cardinality bounded.
fn sanitize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with("f_")
                || segment.starts_with("j_")
                || (segment.len() == 64 && segment.bytes().all(|b| b.is_ascii_hexdigit()))
            {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path_collapses_ids() {
        assert_eq!(
            sanitize_path(&format!("/api/jobs/j_{}", "a".repeat(32))),
            "/api/jobs/:id"
        );
        assert_eq!(
            sanitize_path(&format!("/api/cache/{}", "0".repeat(64))),
            "/api/cache/:id"
        );
        assert_eq!(sanitize_path("/api/uploads"), "/api/uploads");
    }
}
