//! Cuecard error types

use std::time::Duration;

/// Cuecard error types
#[derive(Debug, thiserror::Error)]
pub enum CuecardError {
    // Registry errors
    #[error("no LLM provider available")]
    NoProviderAvailable,

    #[error("provider '{0}' not available")]
    UnknownProvider(String),

    // Adapter errors
    /// A remote call through one adapter failed. The only error class a
    /// caller may retry.
    #[error("{provider} call failed: {reason}")]
    ProviderCallFailed {
        provider: String,
        #[source]
        reason: CallFailure,
    },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Why a single adapter call failed.
#[derive(Debug, thiserror::Error)]
pub enum CallFailure {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timed out")]
    Timeout,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("empty response from model")]
    EmptyResponse,

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("request cancelled")]
    Cancelled,
}

impl CallFailure {
    /// Whether the failure is worth retrying against the same endpoint.
    ///
    /// Transport errors, timeouts, rate limits and 5xx responses are
    /// transient. Authentication, client errors, empty/malformed bodies and
    /// cancellation are not.
    pub fn is_transient(&self) -> bool {
        match self {
            CallFailure::Http(_) | CallFailure::Timeout | CallFailure::RateLimited { .. } => true,
            CallFailure::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Provider-supplied backoff hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CallFailure::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CallFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CallFailure::Timeout
        } else if err.is_decode() {
            CallFailure::Decode(err.to_string())
        } else {
            CallFailure::Http(err.to_string())
        }
    }
}

impl CuecardError {
    /// Wrap an adapter-level failure for `provider`.
    pub fn call_failed(provider: impl Into<String>, reason: impl Into<CallFailure>) -> Self {
        CuecardError::ProviderCallFailed {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Only adapter-level failures are retryable by the caller; registry
    /// and configuration errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CuecardError::ProviderCallFailed { .. })
    }

    /// Whether an immediate retry against the same provider may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CuecardError::ProviderCallFailed { reason, .. } => reason.is_transient(),
            _ => false,
        }
    }

    /// Backoff hint carried by a rate-limited call.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CuecardError::ProviderCallFailed { reason, .. } => reason.retry_after(),
            _ => None,
        }
    }
}

/// Result type alias for Cuecard operations
pub type Result<T> = std::result::Result<T, CuecardError>;
