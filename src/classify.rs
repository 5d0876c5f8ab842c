//! Maps non-success responses to [`HubError`] values.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

use crate::{HubError, DEFAULT_QUOTA_RETRY_AFTER};

/// Status codes worth retrying.
pub const TRANSIENT_STATUS_CODES: [u16; 6] = [403, 408, 429, 500, 503, 504];

/// Returns `true` when `status` is in [`TRANSIENT_STATUS_CODES`].
pub fn is_transient_status(status: u16) -> bool {
    TRANSIENT_STATUS_CODES.contains(&status)
}

/// Classifies a failed response from its status, headers and body text.
///
/// A `Retry-After` header that is neither integer seconds nor an HTTP-date
/// yields [`HubError::UnsupportedRetryAfter`] instead of a classified error.
pub fn classify(
    status: StatusCode,
    headers: &HeaderMap,
    message: impl Into<String>,
) -> HubError {
    classify_at(status, headers, message.into(), Utc::now())
}

/// Reads the body of `response` and classifies it.
pub async fn classify_response(response: reqwest::Response) -> HubError {
    let status = response.status();
    let headers = response.headers().clone();
    let message = match response.text().await {
        Ok(body) => body,
        Err(err) => return HubError::Transport(err),
    };
    classify(status, &headers, message)
}

fn classify_at(
    status: StatusCode,
    headers: &HeaderMap,
    message: String,
    now: DateTime<Utc>,
) -> HubError {
    let retry_after = match headers.get(RETRY_AFTER) {
        None => None,
        Some(value) => match value.to_str() {
            Ok(text) => match parse_retry_after(text, now) {
                Ok(hint) => hint,
                Err(err) => return err,
            },
            Err(_) => {
                return HubError::UnsupportedRetryAfter(
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            }
        },
    };

    if is_quota_exceeded(status, &message) {
        return HubError::QuotaExceeded {
            status: status.as_u16(),
            message,
            retry_after: retry_after.unwrap_or(DEFAULT_QUOTA_RETRY_AFTER),
        };
    }

    HubError::Http {
        status: status.as_u16(),
        message,
        transient: is_transient_status(status.as_u16()),
        retry_after,
    }
}

fn is_quota_exceeded(status: StatusCode, message: &str) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && message.to_ascii_lowercase().contains("quota"))
}

/// Parses a `Retry-After` value relative to `now`.
///
/// Integer seconds are tried first, then an HTTP-date in any of its three
/// forms (RFC 1123, RFC 850, asctime). Dates in the past yield a zero wait.
/// An empty value means no hint.
pub fn parse_retry_after(
    value: &str,
    now: DateTime<Utc>,
) -> std::result::Result<Option<Duration>, HubError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Some(Duration::from_secs(secs)));
    }

    match parse_http_date(trimmed) {
        Some(date) => Ok(Some((date - now).to_std().unwrap_or(Duration::ZERO))),
        None => Err(HubError::UnsupportedRetryAfter(trimmed.to_owned())),
    }
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    // Obsolete forms, both always GMT.
    NaiveDateTime::parse_from_str(value, "%A, %d-%b-%y %H:%M:%S GMT")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%a %b %e %H:%M:%S %Y"))
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
