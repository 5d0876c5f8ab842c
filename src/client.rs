use std::fmt;
use std::sync::Arc;

use reqwest::header;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::{
    classify::classify_response, retry::run_with_retry_cancellable, ConnectionString, HubError,
    HubRequest, HubResponse, PendingCall, Result, RetryOptions, RetryPolicy, SasTokenProvider,
    TokenTtl,
};

/// REST API version sent with every request.
pub const API_VERSION: &str = "2015-01";

/// Environment variable holding the namespace connection string.
pub const CONNECTION_STRING_ENV: &str = "NOTIFICATIONHUBS_CONNECTION_STRING";
/// Environment variable holding the hub name.
pub const HUB_NAME_ENV: &str = "NOTIFICATIONHUBS_HUB_NAME";

#[derive(Clone)]
/// Signs, sends and retries requests against one notification hub.
pub struct HubClient {
    http: reqwest::Client,
    endpoint: String,
    hub_path: String,
    signer: SasTokenProvider,
    policy: Arc<RetryPolicy>,
}

impl fmt::Debug for HubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubClient")
            .field("endpoint", &self.endpoint)
            .field("hub_path", &self.hub_path)
            .field("signer", &self.signer)
            .field("policy", &self.policy)
            .finish()
    }
}

impl HubClient {
    /// Creates a client for `hub_path` under the namespace `endpoint`.
    pub fn new(
        endpoint: impl AsRef<str>,
        hub_path: impl AsRef<str>,
        key_name: impl Into<String>,
        key_value: impl Into<String>,
    ) -> Self {
        let mut endpoint = endpoint.as_ref().trim().to_owned();
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        Self {
            http: reqwest::Client::new(),
            endpoint,
            hub_path: hub_path.as_ref().trim().trim_matches('/').to_owned(),
            signer: SasTokenProvider::new(key_name, key_value),
            policy: Arc::new(RetryPolicy::default()),
        }
    }

    /// Creates a client from a namespace connection string.
    ///
    /// # Example
    ///
    /// ```
    /// use notification_hubs_core::HubClient;
    ///
    /// let hub = HubClient::from_connection_string(
    ///     "Endpoint=sb://my-ns.servicebus.windows.net/;SharedAccessKeyName=Full;SharedAccessKey=c2VjcmV0",
    ///     "my-hub",
    /// )
    /// .expect("valid connection string");
    /// assert!(hub.request_url("messages").starts_with("https://my-ns.servicebus.windows.net/my-hub/"));
    /// ```
    pub fn from_connection_string(
        connection_string: &str,
        hub_path: impl AsRef<str>,
    ) -> Result<Self> {
        let parsed = ConnectionString::parse(connection_string)?;
        Ok(Self::new(
            parsed.endpoint,
            hub_path,
            parsed.key_name,
            parsed.key_value,
        ))
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `NOTIFICATIONHUBS_CONNECTION_STRING` — namespace connection string
    /// - `NOTIFICATIONHUBS_HUB_NAME` — hub path
    pub fn from_env() -> Result<Self> {
        let connection_string = required_env(CONNECTION_STRING_ENV)?;
        let hub_name = required_env(HUB_NAME_ENV)?;
        Self::from_connection_string(&connection_string, hub_name)
    }

    /// Applies retry and per-attempt timeout behavior.
    pub fn with_retry_options(mut self, opts: RetryOptions) -> Self {
        self.policy = Arc::new(RetryPolicy::new(opts));
        self
    }

    /// Shares a token lifetime handle with this client's signer.
    pub fn with_token_ttl(mut self, ttl: TokenTtl) -> Self {
        self.signer = self.signer.with_ttl(ttl);
        self
    }

    /// Uses a preconfigured `reqwest` client (proxies, TLS roots, pools).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Retry policy shared by every request of this client.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Token provider used to sign each attempt.
    pub fn signer(&self) -> &SasTokenProvider {
        &self.signer
    }

    /// Full URL of `path` relative to the hub, including the API version.
    pub fn request_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        let base = if path.is_empty() {
            format!("{}{}", self.endpoint, self.hub_path)
        } else {
            format!("{}{}/{}", self.endpoint, self.hub_path, path)
        };
        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{base}{separator}api-version={API_VERSION}")
    }

    /// Sends `request`, retrying transient failures per the retry options.
    pub async fn send(&self, request: HubRequest) -> Result<HubResponse> {
        self.send_cancellable(request, &CancellationToken::new()).await
    }

    /// Like [`HubClient::send`], but gives up with [`HubError::Cancelled`]
    /// once `cancel` fires.
    pub async fn send_cancellable(
        &self,
        request: HubRequest,
        cancel: &CancellationToken,
    ) -> Result<HubResponse> {
        let url = self.request_url(&request.path);
        run_with_retry_cancellable(&self.policy, cancel, |attempt| {
            self.send_once(&request, &url, attempt)
        })
        .await
    }

    /// Blocking variant of [`HubClient::send`] for synchronous callers.
    ///
    /// The request runs on `runtime`; the calling thread waits for it. Must
    /// not be called from inside an async task.
    pub fn send_blocking(&self, runtime: &Handle, request: HubRequest) -> Result<HubResponse> {
        self.spawn_send(runtime, request, CancellationToken::new()).wait()
    }

    /// Starts `request` on `runtime` and returns a handle to wait on.
    ///
    /// Cancelling `cancel` releases the waiter with [`HubError::Cancelled`]
    /// and stops any further attempt.
    pub fn spawn_send(
        &self,
        runtime: &Handle,
        request: HubRequest,
        cancel: CancellationToken,
    ) -> PendingCall<HubResponse> {
        let client = self.clone();
        let token = cancel.clone();
        PendingCall::spawn_cancellable(runtime, cancel, async move {
            client.send_cancellable(request, &token).await
        })
    }

    async fn send_once(
        &self,
        request: &HubRequest,
        url: &str,
        attempt: u32,
    ) -> Result<HubResponse> {
        #[cfg(feature = "tracing")]
        tracing::debug!(method = %request.method, url, attempt, "sending hub request");
        #[cfg(not(feature = "tracing"))]
        let _ = attempt;

        // Signed per attempt: the token embeds its expiry.
        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .header(header::AUTHORIZATION, self.signer.generate(url)?);

        if let Some(content_type) = &request.content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type.as_str());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(HubError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_response(response).await);
        }

        let headers = response.headers().clone();
        let body = response.text().await.map_err(HubError::Transport)?;
        Ok(HubResponse {
            status,
            headers,
            body,
        })
    }
}

fn required_env(name: &str) -> Result<String> {
    let value = std::env::var(name)
        .map_err(|_| HubError::Config(format!("missing {name} environment variable")))?;
    if value.trim().is_empty() {
        return Err(HubError::Config(format!("{name} is set but empty")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::HubClient;
    use crate::{RetryMode, RetryOptions, TokenTtl};

    fn client() -> HubClient {
        HubClient::new(
            "https://my-ns.servicebus.windows.net",
            "/my-hub/",
            "DefaultFullSharedAccessSignature",
            "secret-key",
        )
    }

    #[test]
    fn request_url_joins_endpoint_hub_and_api_version() {
        let hub = client();
        assert_eq!(
            hub.request_url("/messages"),
            "https://my-ns.servicebus.windows.net/my-hub/messages?api-version=2015-01"
        );
        assert_eq!(
            hub.request_url(""),
            "https://my-ns.servicebus.windows.net/my-hub?api-version=2015-01"
        );
        assert_eq!(
            hub.request_url("registrations?$top=10"),
            "https://my-ns.servicebus.windows.net/my-hub/registrations?$top=10&api-version=2015-01"
        );
    }

    #[test]
    fn from_connection_string_derives_https_endpoint() {
        let hub = HubClient::from_connection_string(
            "Endpoint=sb://ns.servicebus.windows.net/;SharedAccessKeyName=Listen;SharedAccessKey=k",
            "hub",
        )
        .expect("must parse");
        assert_eq!(hub.signer().key_name(), "Listen");
        assert_eq!(
            hub.request_url("messages"),
            "https://ns.servicebus.windows.net/hub/messages?api-version=2015-01"
        );
    }

    #[test]
    fn options_and_ttl_are_applied() {
        let ttl = TokenTtl::from_minutes(5);
        let hub = client()
            .with_retry_options(
                RetryOptions::default()
                    .with_max_retries(7)
                    .with_mode(RetryMode::Fixed)
                    .with_delay(Duration::from_millis(250)),
            )
            .with_token_ttl(ttl.clone());

        assert_eq!(hub.policy().options().max_retries, 7);
        assert_eq!(hub.policy().options().mode, RetryMode::Fixed);
        ttl.set_minutes(9);
        assert_eq!(hub.signer().ttl().minutes(), 9);
    }

    #[test]
    fn debug_redacts_key_value() {
        let debug = format!("{:?}", client());
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-key"));
    }
}
