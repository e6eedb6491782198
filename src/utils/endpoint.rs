//! Path normalization for analytics.

use regex::Regex;
use std::sync::LazyLock;

static UUID_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

static VERSION_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^v\d+$").unwrap());

/// Collapses numeric and UUID path segments into `{id}`, so
/// `/api/v1/users/42` and `/api/v1/users/43` count as one endpoint.
pub fn normalize_endpoint(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let numeric = !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit());
            if numeric || UUID_SEGMENT.is_match(segment) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// First `v<N>` segment of the path, if any.
pub fn api_version(path: &str) -> Option<&str> {
    path.split('/').find(|segment| VERSION_SEGMENT.is_match(segment))
}
