use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde_json::Value;
use tokio::time::Instant;
use url::Url;

use crate::http::{HttpRequest, HttpResponse, HttpTransport};

use super::bucket::{BucketRegistry, HEADER_GLOBAL, HEADER_RETRY_AFTER, parse_seconds};
use super::errors::{ApiError, Result};
use super::routes::{DEFAULT_API_BASE, Route};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default request rates (requests per second).
pub mod rate_limits {
    /// Discord allows 50 requests/second per credential across all routes.
    pub const DISCORD_GLOBAL_RPS: u32 = 50;
}

/// Wait applied to a 429 that carries no usable retry hint.
const DEFAULT_THROTTLE_WAIT: Duration = Duration::from_secs(1);

/// A proactive, credential-wide request rate limiter using the governor crate.
///
/// The per-route buckets react to what the server reports; this limiter keeps a
/// burst of requests across many routes from tripping the global limit at all.
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Create a new rate limiter with the specified requests per second.
    ///
    /// A rate of zero is treated as one request per second.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        }
    }

    /// Wait until a request is allowed by the rate limiter.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

/// Backoff policy for server errors and transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Failed attempts after which the request is abandoned.
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(64),
            max_attempts: 5,
        }
    }
}

impl BackoffConfig {
    /// One delay per allowed attempt: 1s, 2s, 4s, ... capped at `max_delay`.
    pub fn delays(&self) -> ExponentialBackoff {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_factor(2.0)
            .with_max_times(self.max_attempts as usize)
            .build()
    }
}

/// Connection settings for one credential.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub token: String,
    pub user_agent: String,
    pub backoff: BackoffConfig,
    /// Proactive global rate; `None` relies on server-reported buckets only.
    pub global_rps: Option<u32>,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            token: token.into(),
            user_agent: user_agent.into(),
            backoff: BackoffConfig::default(),
            global_rps: Some(rate_limits::DISCORD_GLOBAL_RPS),
        }
    }
}

/// The only component that talks to the remote API.
///
/// `fetch` suspends on exhausted buckets, waits out 429s for as long as the server
/// asks (without limit), backs off on 5xx and transport failures, and maps every
/// other outcome onto [`ApiError`]. Bucket state is owned by this instance alone.
pub struct RateLimitedClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    token: String,
    user_agent: String,
    backoff: BackoffConfig,
    buckets: BucketRegistry,
    limiter: Option<ApiRateLimiter>,
}

impl RateLimitedClient {
    pub fn new(transport: Arc<dyn HttpTransport>, config: ClientConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl {
            url: base_url.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            transport,
            base_url,
            token: config.token,
            user_agent: config.user_agent,
            backoff: config.backoff,
            buckets: BucketRegistry::new(),
            limiter: config.global_rps.map(ApiRateLimiter::new),
        })
    }

    /// Issue a GET for `route` and decode the JSON body.
    ///
    /// An empty 2xx body decodes as `Value::Null`.
    pub async fn fetch(&self, route: &Route, query: &[(&'static str, String)]) -> Result<Value> {
        let request = self.build_request(route, query)?;
        let mut delays = self.backoff.delays();
        let mut attempts = 0u32;

        loop {
            self.wait_for_capacity(route).await;

            let response = match self.transport.send(request.clone()).await {
                Ok(response) => response,
                Err(e) => {
                    attempts += 1;
                    self.back_off(route, attempts, &mut delays, e.to_string())
                        .await?;
                    continue;
                }
            };

            self.buckets.record(route, &response, Instant::now());
            if response.is_success() {
                return decode_body(route, &response);
            }

            match response.status {
                429 => {
                    let wait = retry_after(&response);
                    if is_global(&response) {
                        self.buckets.block_global(Instant::now(), wait);
                    }
                    tracing::warn!(
                        route = %route,
                        wait_ms = wait.as_millis() as u64,
                        "Throttled by server, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                }
                403 => {
                    return Err(ApiError::Forbidden {
                        route: route.to_string(),
                    });
                }
                status @ 500..=599 => {
                    attempts += 1;
                    let message = format!("HTTP {status}: {}", error_message(&response));
                    self.back_off(route, attempts, &mut delays, message).await?;
                }
                status => {
                    return Err(ApiError::ClientError {
                        status,
                        route: route.to_string(),
                        message: error_message(&response),
                    });
                }
            }
        }
    }

    fn build_request(&self, route: &Route, query: &[(&'static str, String)]) -> Result<HttpRequest> {
        let raw = format!("{}{}", self.base_url, route.path());
        let mut url = Url::parse(&raw).map_err(|e| ApiError::InvalidUrl {
            url: raw.clone(),
            message: e.to_string(),
        })?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }

        Ok(HttpRequest {
            method: route.method(),
            url: url.to_string(),
            headers: vec![
                ("Authorization".to_string(), self.token.clone()),
                ("User-Agent".to_string(), self.user_agent.clone()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
        })
    }

    async fn wait_for_capacity(&self, route: &Route) {
        if let Some(limiter) = &self.limiter {
            limiter.wait().await;
        }
        if let Some(delay) = self.buckets.delay_for(route, Instant::now()) {
            tracing::debug!(
                route = %route,
                wait_ms = delay.as_millis() as u64,
                "Rate-limit bucket exhausted, waiting for reset"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Sleep for the next backoff delay, or give up once the attempt budget is spent.
    async fn back_off(
        &self,
        route: &Route,
        attempts: u32,
        delays: &mut impl Iterator<Item = Duration>,
        message: String,
    ) -> Result<()> {
        let abandon = || ApiError::TransientFailure {
            route: route.to_string(),
            attempts,
            message: message.clone(),
        };

        let Some(delay) = delays.next() else {
            return Err(abandon());
        };

        tracing::warn!(
            route = %route,
            attempt = attempts,
            max_attempts = self.backoff.max_attempts,
            wait_ms = delay.as_millis() as u64,
            error = %message,
            "Transient failure, backing off"
        );
        tokio::time::sleep(delay).await;

        if attempts >= self.backoff.max_attempts {
            return Err(abandon());
        }
        Ok(())
    }
}

fn decode_body(route: &Route, response: &HttpResponse) -> Result<Value> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&response.body).map_err(|e| ApiError::decode(route.to_string(), e.to_string()))
}

/// Server-specified wait for a 429: JSON `retry_after`, then the `Retry-After`
/// header, then a one second default.
fn retry_after(response: &HttpResponse) -> Duration {
    serde_json::from_slice::<Value>(&response.body)
        .ok()
        .and_then(|body| body.get("retry_after").and_then(Value::as_f64))
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .or_else(|| response.header(HEADER_RETRY_AFTER).and_then(parse_seconds))
        .unwrap_or(DEFAULT_THROTTLE_WAIT)
}

fn is_global(response: &HttpResponse) -> bool {
    response
        .header(HEADER_GLOBAL)
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        || serde_json::from_slice::<Value>(&response.body)
            .ok()
            .and_then(|body| body.get("global").and_then(Value::as_bool))
            .unwrap_or(false)
}

/// Best-effort error text: the API's `message` field, else the raw body.
fn error_message(response: &HttpResponse) -> String {
    serde_json::from_slice::<Value>(&response.body)
        .ok()
        .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            let text = String::from_utf8_lossy(&response.body);
            text.chars().take(200).collect()
        })
}
