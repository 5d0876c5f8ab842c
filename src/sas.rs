use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{HubError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime in minutes.
pub const DEFAULT_TOKEN_TTL_MINUTES: u64 = 60;

/// Shared, adjustable token lifetime.
///
/// Clones observe the same value, so one handle can tune every provider
/// built from it. Providers read it each time they sign.
#[derive(Clone, Debug)]
pub struct TokenTtl(Arc<AtomicU64>);

impl Default for TokenTtl {
    fn default() -> Self {
        Self::from_minutes(DEFAULT_TOKEN_TTL_MINUTES)
    }
}

impl TokenTtl {
    /// Creates a handle holding `minutes`.
    pub fn from_minutes(minutes: u64) -> Self {
        Self(Arc::new(AtomicU64::new(minutes)))
    }

    /// Current lifetime in minutes.
    pub fn minutes(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Changes the lifetime for every provider sharing this handle.
    pub fn set_minutes(&self, minutes: u64) {
        self.0.store(minutes, Ordering::Relaxed);
    }
}

/// Signs request URIs with a `SharedAccessSignature` token.
#[derive(Clone)]
pub struct SasTokenProvider {
    key_name: String,
    key_value: String,
    ttl: TokenTtl,
}

impl fmt::Debug for SasTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SasTokenProvider")
            .field("key_name", &self.key_name)
            .field("key_value", &"<redacted>")
            .field("ttl_minutes", &self.ttl.minutes())
            .finish()
    }
}

impl SasTokenProvider {
    /// Creates a provider with the default 60 minute lifetime.
    pub fn new(key_name: impl Into<String>, key_value: impl Into<String>) -> Self {
        Self {
            key_name: key_name.into(),
            key_value: key_value.into(),
            ttl: TokenTtl::default(),
        }
    }

    /// Uses `ttl` instead of a private 60 minute default.
    pub fn with_ttl(mut self, ttl: TokenTtl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Name of the shared access key, sent as `skn`.
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Lifetime handle read at each signing.
    pub fn ttl(&self) -> &TokenTtl {
        &self.ttl
    }

    /// Builds an `Authorization` header value for `uri`, valid from now.
    pub fn generate(&self, uri: &str) -> Result<String> {
        self.generate_at(uri, SystemTime::now())
    }

    /// Builds an `Authorization` header value for `uri` as of `now`.
    ///
    /// Format:
    /// `SharedAccessSignature sr=<uri>&sig=<signature>&se=<expiry>&skn=<key name>`
    pub fn generate_at(&self, uri: &str, now: SystemTime) -> Result<String> {
        let target = encode_target_uri(uri);
        let expiry = expiry_epoch_secs(now, self.ttl.minutes());
        let signature = sign(&self.key_value, &string_to_sign(&target, expiry))?;

        Ok(format!(
            "SharedAccessSignature sr={target}&sig={}&se={expiry}&skn={}",
            urlencoding::encode(&signature),
            self.key_name
        ))
    }
}

// The service expects the URI lowercased both before and after encoding.
// `urlencoding` is RFC 3986: space becomes `%20`, `~` stays literal and `*`
// is escaped. A form encoder differs on all three and yields a different
// `sr`, so it is not a drop-in replacement here.
fn encode_target_uri(uri: &str) -> String {
    urlencoding::encode(&uri.to_lowercase()).to_lowercase()
}

fn expiry_epoch_secs(now: SystemTime, ttl_minutes: u64) -> u64 {
    let now_secs = now
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    now_secs.saturating_add(ttl_minutes.saturating_mul(60))
}

fn string_to_sign(target: &str, expiry: u64) -> String {
    format!("{target}\n{expiry}")
}

fn sign(key: &str, message: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|err| HubError::Config(format!("invalid signing key: {err}")))?;
    mac.update(message.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}
