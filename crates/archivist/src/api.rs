//! Access to the remote REST API.
//!
//! [`RateLimitedClient`] is the only code that performs HTTP requests. It owns the
//! per-route rate-limit state for one credential and turns every response into a
//! decoded JSON value or one of the [`ApiError`] outcomes. The [`DiscordApi`] trait
//! is the typed, read-only surface the sync layer programs against.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use archivist::api::{ClientConfig, RateLimitedClient, Route};
//! use archivist::http::reqwest_transport::ReqwestTransport;
//!
//! let transport = Arc::new(ReqwestTransport::with_timeout(Duration::from_secs(30))?);
//! let client = RateLimitedClient::new(transport, ClientConfig::new(token, "archivist/0.1"))?;
//! let me = client.fetch(&Route::CurrentUser, &[]).await?;
//! ```

mod bucket;
mod errors;
mod rate_limit;
mod routes;
mod types;

pub use bucket::{BucketRegistry, RateLimitHeaders};
pub use errors::{ApiError, Result, short_error_message};
pub use rate_limit::{ApiRateLimiter, BackoffConfig, ClientConfig, RateLimitedClient, rate_limits};
pub use routes::{DEFAULT_API_BASE, Query, Route};
pub use types::{DiscordApi, MAX_PAGE_SIZE, MessageCursor, ThreadVisibility};
