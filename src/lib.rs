//! `notification-hubs-core` is the resilience and request-signing core of a
//! Notification Hubs REST client.
//!
//! - [`RetryPolicy`] decides whether and when a failed request is retried.
//! - [`classify()`] turns a failed response into a [`HubError`] with a
//!   transient flag and an optional `Retry-After` hint.
//! - [`run_with_retry`] drives attempts with per-attempt timeouts and
//!   non-blocking delays.
//! - [`SasTokenProvider`] signs every attempt with a fresh
//!   `SharedAccessSignature` token.
//! - [`PendingCall`] lets synchronous callers block on an async outcome.
//! - [`HubClient`] ties them together over `reqwest`.

mod bridge;
mod classify;
mod client;
mod connection;
mod error;
mod options;
mod policy;
mod retry;
mod sas;
mod types;

pub use bridge::{pending_call, Completion, PendingCall};
pub use classify::{
    classify, classify_response, is_transient_status, parse_retry_after, TRANSIENT_STATUS_CODES,
};
pub use client::{HubClient, API_VERSION, CONNECTION_STRING_ENV, HUB_NAME_ENV};
pub use connection::ConnectionString;
pub use error::HubError;
pub use options::{RetryMode, RetryOptions};
pub use policy::{RetryPolicy, DEFAULT_QUOTA_RETRY_AFTER, JITTER_FACTOR};
pub use retry::{run_with_retry, run_with_retry_cancellable};
pub use sas::{SasTokenProvider, TokenTtl, DEFAULT_TOKEN_TTL_MINUTES};
pub use types::{HubRequest, HubResponse};

pub type Result<T> = std::result::Result<T, HubError>;
