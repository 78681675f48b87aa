//! Conditional-request cache.
//!
//! Tracks the last `ETag` seen per URL so the next GET to that URL can carry
//! `If-None-Match` and let the server answer `304 Not Modified` instead of
//! resending the body. Only GET traffic reads or writes the cache; mutating
//! requests must always execute in full.
//!
//! Entries live for the lifetime of the client instance. There is no
//! expiration: an API client's URL universe is its endpoint set, and a stale
//! ETag costs one full response, never a wrong one. [`EtagCache::clear`]
//! resets the cache explicitly.

use http::HeaderMap;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::util::lock_unpoisoned;

/// Maps absolute URLs to their last-seen `ETag` values.
#[derive(Debug, Default)]
pub struct EtagCache {
    entries: Mutex<HashMap<String, String>>,
}

impl EtagCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the validator to send as `If-None-Match` for `url`, if one is
    /// cached.
    pub fn if_none_match(&self, url: &str) -> Option<String> {
        lock_unpoisoned(&self.entries).get(url).cloned()
    }

    /// Records the `ETag` response header for `url`, overwriting any previous
    /// entry. Responses without the header leave the cache untouched.
    pub fn record(&self, url: &str, headers: &HeaderMap) {
        let Some(etag) = headers.get("etag").and_then(|v| v.to_str().ok()) else {
            return;
        };
        tracing::debug!(url, etag, "caching validator");
        lock_unpoisoned(&self.entries).insert(url.to_string(), etag.to_string());
    }

    /// Drops every cached validator.
    pub fn clear(&self) {
        lock_unpoisoned(&self.entries).clear();
    }

    /// Number of URLs with a cached validator.
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.entries).len()
    }

    /// `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers_with_etag(etag: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("etag", HeaderValue::from_str(etag).unwrap());
        headers
    }

    #[test]
    fn records_and_returns_validators() {
        let cache = EtagCache::new();
        cache.record("https://api.test/a", &headers_with_etag("\"v1\""));

        assert_eq!(
            cache.if_none_match("https://api.test/a"),
            Some("\"v1\"".to_string())
        );
        assert_eq!(cache.if_none_match("https://api.test/b"), None);
    }

    #[test]
    fn newer_validators_overwrite_older_ones() {
        let cache = EtagCache::new();
        cache.record("https://api.test/a", &headers_with_etag("\"v1\""));
        cache.record("https://api.test/a", &headers_with_etag("\"v2\""));

        assert_eq!(
            cache.if_none_match("https://api.test/a"),
            Some("\"v2\"".to_string())
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn responses_without_etag_leave_the_cache_alone() {
        let cache = EtagCache::new();
        cache.record("https://api.test/a", &headers_with_etag("\"v1\""));
        cache.record("https://api.test/a", &HeaderMap::new());

        assert_eq!(
            cache.if_none_match("https://api.test/a"),
            Some("\"v1\"".to_string())
        );
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = EtagCache::new();
        cache.record("https://api.test/a", &headers_with_etag("\"v1\""));
        assert!(!cache.is_empty());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.if_none_match("https://api.test/a"), None);
    }
}
