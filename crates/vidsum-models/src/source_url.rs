//! Source URL validation and normalization.
//!
//! Two requests naming the same video must derive the same cache key, so
//! URLs are normalized before keying: scheme and host lowercased, fragment
//! dropped, query parameters sorted, tracking-only parameters stripped.

use url::Url;

use crate::error::ModelError;

/// Query parameters stripped during normalization when no explicit list is
/// configured. These never affect which video a URL names.
pub const DEFAULT_TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "si",
    "feature",
    "ref",
];

/// Whether a string is a syntactically valid http/https URL.
pub fn is_http_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

/// Normalize a source URL for cache keying.
///
/// `tracking_params` lists query parameter names to strip; pass
/// [`DEFAULT_TRACKING_PARAMS`] unless the deployment configures its own.
pub fn normalize_url(raw: &str, tracking_params: &[&str]) -> Result<String, ModelError> {
    let mut url = Url::parse(raw).map_err(|e| ModelError::InvalidUrl(format!("{}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ModelError::InvalidUrl(format!(
            "unsupported scheme: {}",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(ModelError::InvalidUrl(format!("missing host: {}", raw)));
    }

    url.set_fragment(None);

    // The url crate already lowercases scheme and host during parsing;
    // query normalization is ours.
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !tracking_params.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &pairs {
            serializer.append_pair(k, v);
        }
        url.set_query(Some(&serializer.finish()));
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_scheme_and_host() {
        let normalized =
            normalize_url("HTTPS://WWW.Example.COM/Watch?v=abc", DEFAULT_TRACKING_PARAMS).unwrap();
        assert_eq!(normalized, "https://www.example.com/Watch?v=abc");
    }

    #[test]
    fn test_drops_fragment_and_sorts_query() {
        let normalized = normalize_url(
            "https://example.com/v?z=1&a=2#t=30s",
            DEFAULT_TRACKING_PARAMS,
        )
        .unwrap();
        assert_eq!(normalized, "https://example.com/v?a=2&z=1");
    }

    #[test]
    fn test_strips_tracking_params() {
        let normalized = normalize_url(
            "https://example.com/v?utm_source=feed&v=abc&fbclid=xyz",
            DEFAULT_TRACKING_PARAMS,
        )
        .unwrap();
        assert_eq!(normalized, "https://example.com/v?v=abc");
    }

    #[test]
    fn test_all_params_stripped_drops_query() {
        let normalized =
            normalize_url("https://example.com/v?utm_source=feed", DEFAULT_TRACKING_PARAMS)
                .unwrap();
        assert_eq!(normalized, "https://example.com/v");
    }

    #[test]
    fn test_identical_sources_normalize_identically() {
        let a = normalize_url(
            "https://Example.com/v/abc?b=2&a=1&utm_medium=social",
            DEFAULT_TRACKING_PARAMS,
        )
        .unwrap();
        let b = normalize_url("https://example.com/v/abc?a=1&b=2", DEFAULT_TRACKING_PARAMS).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_non_http() {
        assert!(normalize_url("ftp://example.com/v", DEFAULT_TRACKING_PARAMS).is_err());
        assert!(normalize_url("not a url", DEFAULT_TRACKING_PARAMS).is_err());
        assert!(!is_http_url("file:///etc/passwd"));
        assert!(is_http_url("http://example.com/v"));
    }
}
