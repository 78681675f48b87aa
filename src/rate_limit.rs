//! Rate-limit header awareness.
//!
//! When a response carries `Retry-After` or `X-RateLimit-*` headers, the
//! retry loop prefers the server-indicated wait over its own computed
//! backoff. Parsing covers the delay-seconds and HTTP-date forms of
//! `Retry-After` plus the Unix-timestamp reset headers.

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Rate limit data parsed from response headers.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// When the window resets (`X-RateLimit-Reset` / `RateLimit-Reset`).
    pub reset_at: Option<SystemTime>,

    /// Server-requested wait (`Retry-After`).
    pub retry_after: Option<Duration>,

    /// Requests remaining in the window (`X-RateLimit-Remaining`).
    pub remaining: Option<u64>,
}

impl RateLimitInfo {
    /// Parses rate limit headers out of a response.
    ///
    /// # Examples
    ///
    /// ```
    /// use refetch::rate_limit::RateLimitInfo;
    /// use http::HeaderMap;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("retry-after", "60".parse().unwrap());
    ///
    /// let info = RateLimitInfo::from_headers(&headers);
    /// assert!(info.retry_after.is_some());
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            reset_at: parse_reset(headers),
            retry_after: parse_retry_after(headers),
            remaining: header_u64(headers, "x-ratelimit-remaining"),
        }
    }

    /// The recommended wait before retrying, capped at `max_wait`.
    ///
    /// Prefers an explicit `Retry-After`; otherwise derives the wait from the
    /// reset timestamp. `None` when the headers carried nothing usable.
    pub fn delay(&self, max_wait: Duration) -> Option<Duration> {
        if let Some(retry_after) = self.retry_after {
            return Some(retry_after.min(max_wait));
        }

        if let Some(reset_at) = self.reset_at {
            if let Ok(until_reset) = reset_at.duration_since(SystemTime::now()) {
                return Some(until_reset.min(max_wait));
            }
        }

        None
    }

    /// `true` when the headers indicate an active limit: an explicit
    /// `Retry-After`, or zero requests remaining.
    pub fn is_rate_limited(&self) -> bool {
        self.retry_after.is_some() || self.remaining == Some(0)
    }
}

/// Controls whether the retry loop honors server-indicated waits.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Parse rate limit headers and wait the indicated time before retrying.
    pub enabled: bool,

    /// Ceiling on any server-indicated wait.
    pub max_wait: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_wait: Duration::from_secs(300),
        }
    }
}

impl RateLimitConfig {
    /// Rate limit handling switched off; the retry policy's own delays apply
    /// even to 429 responses.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Sets the ceiling on any server-indicated wait.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}

/// `Retry-After` in either delay-seconds or HTTP-date form.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?;

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date) = httpdate::parse_http_date(value) {
        if let Ok(until) = date.duration_since(SystemTime::now()) {
            return Some(until);
        }
    }

    None
}

/// `X-RateLimit-Reset` (common) or `RateLimit-Reset` (draft standard), both
/// Unix timestamps.
fn parse_reset(headers: &HeaderMap) -> Option<SystemTime> {
    for name in ["x-ratelimit-reset", "ratelimit-reset"] {
        if let Some(timestamp) = header_u64(headers, name) {
            return Some(UNIX_EPOCH + Duration::from_secs(timestamp));
        }
    }
    None
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("60"));

        let info = RateLimitInfo::from_headers(&headers);
        assert_eq!(info.retry_after, Some(Duration::from_secs(60)));
        assert!(info.is_rate_limited());
    }

    #[test]
    fn retry_after_http_date() {
        let future = SystemTime::now() + Duration::from_secs(120);
        let mut headers = HeaderMap::new();
        headers.insert(
            "retry-after",
            HeaderValue::from_str(&httpdate::fmt_http_date(future)).unwrap(),
        );

        let info = RateLimitInfo::from_headers(&headers);
        let delay = info.delay(Duration::from_secs(300)).unwrap();
        // HTTP dates have whole-second resolution.
        assert!(delay >= Duration::from_secs(118) && delay <= Duration::from_secs(121));
    }

    #[test]
    fn reset_timestamp_drives_the_delay() {
        let reset = SystemTime::now() + Duration::from_secs(2);
        let timestamp = reset.duration_since(UNIX_EPOCH).unwrap().as_secs();

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_str(&timestamp.to_string()).unwrap(),
        );
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));

        let info = RateLimitInfo::from_headers(&headers);
        assert!(info.is_rate_limited());

        let delay = info.delay(Duration::from_secs(300)).unwrap();
        assert!(delay <= Duration::from_secs(3));
    }

    #[test]
    fn remaining_zero_alone_counts_as_limited() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));

        let info = RateLimitInfo::from_headers(&headers);
        assert!(info.is_rate_limited());
        assert_eq!(info.delay(Duration::from_secs(300)), None);
    }

    #[test]
    fn delay_is_capped_by_max_wait() {
        let info = RateLimitInfo {
            reset_at: None,
            retry_after: Some(Duration::from_secs(600)),
            remaining: Some(0),
        };

        assert_eq!(
            info.delay(Duration::from_secs(300)),
            Some(Duration::from_secs(300))
        );
    }
}
