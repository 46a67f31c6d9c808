//! Per-route rate-limit bookkeeping.
//!
//! The server reports, on every response, how many requests remain in the route's
//! bucket and how long until the bucket refills. The registry remembers that so the
//! next request on an exhausted bucket can wait instead of provoking a 429.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::http::HttpResponse;

use super::routes::Route;

pub const HEADER_BUCKET: &str = "X-RateLimit-Bucket";
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
pub const HEADER_RESET_AFTER: &str = "X-RateLimit-Reset-After";
pub const HEADER_GLOBAL: &str = "X-RateLimit-Global";
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

/// Rate-limit headers parsed from one response.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitHeaders {
    pub bucket: Option<String>,
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset_after: Option<Duration>,
}

impl RateLimitHeaders {
    /// Parse the headers, returning `None` when the response carries none of them.
    #[must_use]
    pub fn parse(response: &HttpResponse) -> Option<Self> {
        let headers = Self {
            bucket: response.header(HEADER_BUCKET).map(str::to_string),
            limit: response.header(HEADER_LIMIT).and_then(|v| v.trim().parse().ok()),
            remaining: response
                .header(HEADER_REMAINING)
                .and_then(|v| v.trim().parse().ok()),
            reset_after: response.header(HEADER_RESET_AFTER).and_then(parse_seconds),
        };

        if headers.bucket.is_none() && headers.remaining.is_none() && headers.reset_after.is_none()
        {
            None
        } else {
            Some(headers)
        }
    }
}

/// Parse a fractional seconds value such as `"1.337"`.
#[must_use]
pub fn parse_seconds(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Last known state of a single bucket.
#[derive(Debug, Clone, Default)]
struct BucketState {
    remaining: Option<u32>,
    reset_at: Option<Instant>,
}

impl BucketState {
    fn delay(&self, now: Instant) -> Option<Duration> {
        match (self.remaining, self.reset_at) {
            (Some(0), Some(reset_at)) if reset_at > now => Some(reset_at - now),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    /// Route template key to the bucket hash the server assigned it.
    hashes: HashMap<String, String>,
    buckets: HashMap<String, BucketState>,
    global_until: Option<Instant>,
}

impl Registry {
    fn state_key(&self, route: &Route) -> String {
        match (self.hashes.get(&route.template_key()), route.major()) {
            (Some(hash), Some(major)) => format!("{hash}:{major}"),
            (Some(hash), None) => hash.clone(),
            (None, _) => route.bucket_key(),
        }
    }
}

/// Bucket state owned by one client instance.
///
/// Never shared across credentials: each account's client has its own registry.
#[derive(Debug, Default)]
pub struct BucketRegistry {
    inner: Mutex<Registry>,
}

impl BucketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// How long a request on `route` must wait before it may be sent.
    #[must_use]
    pub fn delay_for(&self, route: &Route, now: Instant) -> Option<Duration> {
        let registry = self.lock();
        let global = registry
            .global_until
            .filter(|until| *until > now)
            .map(|until| until - now);
        let local = registry
            .buckets
            .get(&registry.state_key(route))
            .and_then(|state| state.delay(now));

        match (global, local) {
            (Some(g), Some(l)) => Some(g.max(l)),
            (g, l) => g.or(l),
        }
    }

    /// Record the rate-limit headers of a response received at `now`.
    pub fn record(&self, route: &Route, response: &HttpResponse, now: Instant) {
        let Some(headers) = RateLimitHeaders::parse(response) else {
            return;
        };

        let mut registry = self.lock();
        if let Some(hash) = &headers.bucket {
            let previous = registry.hashes.insert(route.template_key(), hash.clone());
            if previous.as_deref() != Some(hash.as_str()) {
                // State collected under the provisional key now belongs to the hash.
                let provisional = registry.buckets.remove(&route.bucket_key());
                let key = registry.state_key(route);
                if let Some(state) = provisional {
                    registry.buckets.entry(key).or_insert(state);
                }
            }
        }

        let key = registry.state_key(route);
        let state = registry.buckets.entry(key).or_default();
        if let Some(remaining) = headers.remaining {
            state.remaining = Some(remaining);
        }
        if let Some(reset_after) = headers.reset_after {
            state.reset_at = Some(now + reset_after);
        }
    }

    /// Block every route until `now + wait` (global 429).
    pub fn block_global(&self, now: Instant, wait: Duration) {
        let mut registry = self.lock();
        let until = now + wait;
        registry.global_until = Some(registry.global_until.map_or(until, |u| u.max(until)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snowflake::Snowflake;
    use serde_json::json;

    fn messages(channel: u64) -> Route {
        Route::ChannelMessages {
            channel_id: Snowflake(channel),
        }
    }

    fn limited(remaining: &str, reset_after: &str) -> HttpResponse {
        HttpResponse::json(200, &json!([]))
            .with_header(HEADER_REMAINING, remaining)
            .with_header(HEADER_RESET_AFTER, reset_after)
    }

    #[test]
    fn test_parse_headers() {
        let resp = limited("3", "1.5").with_header(HEADER_BUCKET, "abcd");
        let parsed = RateLimitHeaders::parse(&resp).expect("headers present");
        assert_eq!(parsed.remaining, Some(3));
        assert_eq!(parsed.reset_after, Some(Duration::from_millis(1500)));
        assert_eq!(parsed.bucket.as_deref(), Some("abcd"));
    }

    #[test]
    fn test_parse_headers_absent() {
        assert!(RateLimitHeaders::parse(&HttpResponse::json(200, &json!([]))).is_none());
    }

    #[test]
    fn test_parse_seconds_rejects_negative_and_garbage() {
        assert_eq!(parse_seconds("2"), Some(Duration::from_secs(2)));
        assert_eq!(parse_seconds("-1"), None);
        assert_eq!(parse_seconds("soon"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_bucket_delays_until_reset() {
        let registry = BucketRegistry::new();
        let now = Instant::now();
        registry.record(&messages(1), &limited("0", "2.5"), now);

        assert_eq!(
            registry.delay_for(&messages(1), now),
            Some(Duration::from_millis(2500))
        );
        // Another channel is a different bucket.
        assert_eq!(registry.delay_for(&messages(2), now), None);
        // After the reset time passes the bucket is usable again.
        assert_eq!(
            registry.delay_for(&messages(1), now + Duration::from_secs(3)),
            None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_budget_means_no_delay() {
        let registry = BucketRegistry::new();
        let now = Instant::now();
        registry.record(&messages(1), &limited("4", "10"), now);
        assert_eq!(registry.delay_for(&messages(1), now), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bucket_hash_carries_provisional_state() {
        let registry = BucketRegistry::new();
        let now = Instant::now();
        registry.record(&messages(1), &limited("0", "1"), now);
        registry.record(
            &messages(1),
            &HttpResponse::json(200, &json!([])).with_header(HEADER_BUCKET, "h1"),
            now,
        );
        assert_eq!(
            registry.delay_for(&messages(1), now),
            Some(Duration::from_secs(1))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_block_applies_to_all_routes() {
        let registry = BucketRegistry::new();
        let now = Instant::now();
        registry.block_global(now, Duration::from_secs(4));
        assert_eq!(
            registry.delay_for(&Route::CurrentUser, now),
            Some(Duration::from_secs(4))
        );
        assert_eq!(
            registry.delay_for(&messages(9), now),
            Some(Duration::from_secs(4))
        );
    }
}
