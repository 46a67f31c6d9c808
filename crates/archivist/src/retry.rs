//! Retry utilities for archive store writes.
//!
//! API retries live in the client itself (they follow server instructions); this
//! module covers the other transient failure source, a busy or briefly unreachable
//! database.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::sync::{ProgressCallback, SyncProgress, emit};

/// Initial delay before retrying a store write.
pub const INITIAL_STORE_BACKOFF_MS: u64 = 100;

/// Maximum delay between store write retries.
pub const MAX_STORE_BACKOFF_MS: u64 = 5_000;

/// Retries before a store error surfaces.
pub const MAX_STORE_RETRIES: usize = 3;

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_STORE_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_STORE_BACKOFF_MS),
            max_retries: MAX_STORE_RETRIES,
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            with_jitter: true,
        }
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }
}

/// Run `operation`, retrying errors `is_retryable` accepts.
///
/// Each retry is logged and reported as [`SyncProgress::StoreRetry`] under
/// `label`.
pub async fn with_retry<T, E, F, Fut, IsRetryable>(
    mut operation: F,
    config: &RetryConfig,
    is_retryable: IsRetryable,
    label: &str,
    on_progress: Option<&ProgressCallback>,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
    IsRetryable: Fn(&E) -> bool + Send + Sync + 'static,
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    retry_op
        .retry(config.clone().into_backoff())
        .notify(|err, dur| {
            let current_attempt = attempt.load(Ordering::SeqCst);
            emit(
                on_progress,
                SyncProgress::StoreRetry {
                    operation: label.to_string(),
                    retry_after_ms: u64::try_from(dur.as_millis()).unwrap_or(u64::MAX),
                    attempt: current_attempt,
                },
            );
            tracing::warn!(
                operation = label,
                attempt = current_attempt,
                wait_ms = dur.as_millis() as u64,
                error = %err,
                "Store write failed, retrying"
            );
        })
        .when(is_retryable)
        .await
}
