use thiserror::Error;

/// Errors surfaced by the rate-limited API client.
///
/// Throttling (HTTP 429) never appears here: the client always waits and retries
/// it, so callers only ever see the outcomes below.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The credential may not read this resource (HTTP 403). Never retried.
    #[error("Forbidden: {route}")]
    Forbidden { route: String },

    /// Any other 4xx: malformed request, unknown resource, bad credential.
    #[error("Client error {status} on {route}: {message}")]
    ClientError {
        status: u16,
        route: String,
        message: String,
    },

    /// Server errors or transport failures that outlived the backoff budget.
    #[error("Transient failure on {route} after {attempts} attempts: {message}")]
    TransientFailure {
        route: String,
        attempts: u32,
        message: String,
    },

    /// The request URL could not be built from the configured base URL.
    #[error("Invalid API URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// The HTTP transport could not be constructed.
    #[error("Failed to initialise HTTP client: {message}")]
    Setup { message: String },

    /// A 2xx response whose body did not match the expected shape.
    #[error("Failed to decode {route}: {message}")]
    Decode { route: String, message: String },
}

impl ApiError {
    /// Create a decode error.
    #[inline]
    pub fn decode(route: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            route: route.into(),
            message: message.into(),
        }
    }

    #[inline]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    /// HTTP 401: the credential itself is invalid.
    #[inline]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::ClientError { status: 401, .. })
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ClientError { status: 404, .. })
    }

    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFailure { .. })
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which keeps summaries and progress
/// events readable when a server returns a multi-line body.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
