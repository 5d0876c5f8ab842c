use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::{HubError, Result};

/// A request relative to the hub path, e.g. `registrations/123`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl HubRequest {
    /// Creates a bodiless request.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            content_type: None,
            headers: Vec::new(),
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Shorthand for a `DELETE` request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attaches a body and its content type.
    pub fn with_body(mut self, content_type: impl Into<String>, body: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self.body = Some(body.into());
        self
    }

    /// Adds an extra header, sent after the authorization header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A successful (2xx) response.
#[derive(Clone, Debug)]
pub struct HubResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HubResponse {
    /// Returns a header value if it is present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|err| HubError::Decode(format!("invalid JSON response body: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderMap, HeaderValue, LOCATION};
    use reqwest::{Method, StatusCode};
    use serde::Deserialize;

    use super::{HubRequest, HubResponse};
    use crate::HubError;

    #[test]
    fn request_builder_collects_body_and_headers() {
        let request = HubRequest::new(Method::PUT, "installations/abc")
            .with_body("application/json", "{}")
            .with_header("If-Match", "*");

        assert_eq!(request.method, Method::PUT);
        assert_eq!(request.path, "installations/abc");
        assert_eq!(request.content_type.as_deref(), Some("application/json"));
        assert_eq!(request.body.as_deref(), Some("{}"));
        assert_eq!(request.headers, vec![("If-Match".to_owned(), "*".to_owned())]);
    }

    #[test]
    fn response_exposes_headers_and_json() {
        #[derive(Deserialize)]
        struct Body {
            id: String,
        }

        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static("https://ns/hub/messages/1"));
        let response = HubResponse {
            status: StatusCode::CREATED,
            headers,
            body: r#"{"id":"1"}"#.to_owned(),
        };

        assert_eq!(response.header("location"), Some("https://ns/hub/messages/1"));
        assert_eq!(response.json::<Body>().expect("must decode").id, "1");
    }

    #[test]
    fn invalid_json_is_decode_error() {
        let response = HubResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: "<xml/>".to_owned(),
        };
        assert!(matches!(
            response.json::<serde_json::Value>(),
            Err(HubError::Decode(_))
        ));
    }
}
