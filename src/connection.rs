use std::fmt;

use crate::{HubError, Result};

/// Parsed `Endpoint=…;SharedAccessKeyName=…;SharedAccessKey=…` string.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    /// HTTPS namespace endpoint, always ending with `/`.
    pub endpoint: String,
    pub key_name: String,
    pub key_value: String,
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint)
            .field("key_name", &self.key_name)
            .field("key_value", &"<redacted>")
            .finish()
    }
}

impl ConnectionString {
    /// Parses a namespace connection string.
    ///
    /// Keys are matched case-insensitively and values are split on the
    /// first `=`, so base64 key padding survives. An `sb://` endpoint is
    /// rewritten to `https://`.
    pub fn parse(input: &str) -> Result<Self> {
        let mut endpoint = None;
        let mut key_name = None;
        let mut key_value = None;

        for segment in input.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                HubError::Config(format!("connection string segment without '=': {segment}"))
            })?;
            let value = value.trim().to_owned();
            match key.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value),
                "sharedaccesskeyname" => key_name = Some(value),
                "sharedaccesskey" => key_value = Some(value),
                _ => {}
            }
        }

        let endpoint = normalize_endpoint(&required(endpoint, "Endpoint")?);
        Ok(Self {
            endpoint,
            key_name: required(key_name, "SharedAccessKeyName")?,
            key_value: required(key_value, "SharedAccessKey")?,
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(HubError::Config(format!("connection string is missing {name}"))),
    }
}

fn normalize_endpoint(endpoint: &str) -> String {
    let mut url = match endpoint.strip_prefix("sb://") {
        Some(rest) => format!("https://{rest}"),
        None if endpoint.contains("://") => endpoint.to_owned(),
        None => format!("https://{endpoint}"),
    };
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

#[cfg(test)]
mod tests {
    use super::ConnectionString;
    use crate::HubError;

    #[test]
    fn parses_service_bus_connection_string() {
        let parsed = ConnectionString::parse(
            "Endpoint=sb://my-ns.servicebus.windows.net/;SharedAccessKeyName=DefaultFullSharedAccessSignature;SharedAccessKey=abc+def/ghi=",
        )
        .expect("must parse");

        assert_eq!(parsed.endpoint, "https://my-ns.servicebus.windows.net/");
        assert_eq!(parsed.key_name, "DefaultFullSharedAccessSignature");
        assert_eq!(parsed.key_value, "abc+def/ghi=");
    }

    #[test]
    fn keys_are_case_insensitive_and_order_free() {
        let parsed = ConnectionString::parse(
            "sharedaccesskey=k;ENDPOINT=sb://ns.example.net;SharedAccessKeyName=n;",
        )
        .expect("must parse");

        assert_eq!(parsed.endpoint, "https://ns.example.net/");
        assert_eq!(parsed.key_name, "n");
        assert_eq!(parsed.key_value, "k");
    }

    #[test]
    fn plain_http_endpoint_is_kept_for_local_testing() {
        let parsed = ConnectionString::parse(
            "Endpoint=http://127.0.0.1:8080;SharedAccessKeyName=n;SharedAccessKey=k",
        )
        .expect("must parse");
        assert_eq!(parsed.endpoint, "http://127.0.0.1:8080/");
    }

    #[test]
    fn missing_key_is_config_error() {
        let err = ConnectionString::parse("Endpoint=sb://ns/;SharedAccessKeyName=n")
            .expect_err("key is missing");
        match err {
            HubError::Config(message) => assert!(message.contains("SharedAccessKey")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn segment_without_separator_is_rejected() {
        let err = ConnectionString::parse("Endpoint=sb://ns/;garbage")
            .expect_err("segment is malformed");
        assert!(matches!(err, HubError::Config(_)));
    }

    #[test]
    fn debug_redacts_key_value() {
        let parsed = ConnectionString::parse(
            "Endpoint=sb://ns/;SharedAccessKeyName=n;SharedAccessKey=top-secret",
        )
        .expect("must parse");
        assert!(!format!("{parsed:?}").contains("top-secret"));
    }
}
