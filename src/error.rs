use std::time::Duration;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code classified by [`crate::classify()`].
    #[error("http error {status}: {message}")]
    Http {
        status: u16,
        /// Response body text.
        message: String,
        /// Whether the status is in [`crate::TRANSIENT_STATUS_CODES`].
        transient: bool,
        /// Server hint taken from the `Retry-After` header.
        retry_after: Option<Duration>,
    },
    /// Quota or throttling rejection. Always transient.
    #[error("quota exceeded ({status}): {message}")]
    QuotaExceeded {
        status: u16,
        message: String,
        /// Server hint, or [`crate::DEFAULT_QUOTA_RETRY_AFTER`] when absent.
        retry_after: Duration,
    },
    /// A single attempt exceeded its `try_timeout`.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),
    /// `Retry-After` was neither integer seconds nor an HTTP-date.
    #[error("unsupported Retry-After value: {0:?}")]
    UnsupportedRetryAfter(String),
    /// The call was cancelled before it produced an outcome.
    #[error("operation was cancelled")]
    Cancelled,
    /// Failure of a non-hub kind delivered through a [`crate::Completion`].
    #[error("execution failed: {0}")]
    Execution(Box<dyn std::error::Error + Send + Sync>),
    /// Response body decoding error.
    #[error("decode error: {0}")]
    Decode(String),
    /// Invalid connection string or environment.
    #[error("configuration error: {0}")]
    Config(String),
}

impl HubError {
    /// Returns `true` when the failure is worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(err) => {
                err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
            }
            Self::Http { transient, .. } => *transient,
            Self::QuotaExceeded { .. } | Self::Timeout(_) => true,
            Self::UnsupportedRetryAfter(_)
            | Self::Cancelled
            | Self::Execution(_)
            | Self::Decode(_)
            | Self::Config(_) => false,
        }
    }

    /// HTTP status code, when the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } | Self::QuotaExceeded { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    /// Server-suggested wait before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Http { retry_after, .. } => *retry_after,
            Self::QuotaExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Returns `true` for [`HubError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
