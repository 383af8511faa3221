//! Metric source client.

use anomaly_types::{ConfigurationError, Credentials, FetchError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use std::time::Duration;

use crate::raw::RawMetricData;
use crate::registry::BackendRegistry;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY_CHARS: usize = 320;

/// Fetches raw metric data from a named backend.
#[async_trait]
pub trait MetricSourceClient: Send + Sync {
    /// Fail with a configuration error if `source` is not a known backend.
    fn check_source(&self, source: &str) -> Result<(), ConfigurationError>;

    /// Fetch `query` from the backend at `url`.
    ///
    /// Credentials are applied exactly once. Either the whole response is
    /// returned or an error; never a partial result.
    async fn fetch(
        &self,
        source: &str,
        url: &str,
        query: &str,
        credentials: Option<&Credentials>,
    ) -> Result<RawMetricData, FetchError>;
}

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Per-request deadline, connect through body
    pub request_timeout: Duration,

    /// Honor HTTP(S)_PROXY from the environment
    pub use_system_proxy: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            use_system_proxy: false,
        }
    }
}

/// reqwest-backed client dispatching through a [`BackendRegistry`]
#[derive(Debug, Clone)]
pub struct HttpMetricSourceClient {
    client: Client,
    registry: BackendRegistry,
    request_timeout: Duration,
}

impl HttpMetricSourceClient {
    /// Client with every built-in backend registered
    pub fn new(config: SourceConfig) -> Result<Self, reqwest::Error> {
        Self::with_registry(config, BackendRegistry::with_defaults())
    }

    pub fn with_registry(
        config: SourceConfig,
        registry: BackendRegistry,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder().timeout(config.request_timeout);
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        Ok(Self {
            client: builder.build()?,
            registry,
            request_timeout: config.request_timeout,
        })
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }
}

#[async_trait]
impl MetricSourceClient for HttpMetricSourceClient {
    fn check_source(&self, source: &str) -> Result<(), ConfigurationError> {
        self.registry.resolve(source).map(|_| ())
    }

    async fn fetch(
        &self,
        source: &str,
        url: &str,
        query: &str,
        credentials: Option<&Credentials>,
    ) -> Result<RawMetricData, FetchError> {
        let backend = self
            .registry
            .get(source)
            .ok_or_else(|| FetchError::UnknownBackend(source.to_string()))?;
        let backend_id = backend.id();

        let mut request_url = backend.request_url(url, query)?;
        if credentials.is_some() {
            // declared auth replaces userinfo embedded in metricURL
            strip_userinfo(&mut request_url);
        }

        tracing::debug!(
            backend = backend_id,
            endpoint = %endpoint(&request_url),
            auth = credentials.map(Credentials::scheme).unwrap_or("none"),
            "Fetching metric data"
        );

        let request = apply_credentials(self.client.get(request_url), credentials);

        let response = request
            .send()
            .await
            .map_err(|e| self.classify(backend_id, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                backend: backend_id.to_string(),
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.timeout_error(backend_id)
            } else {
                FetchError::MalformedResponse {
                    backend: backend_id.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let series = backend
            .extract(body)
            .map_err(|message| FetchError::MalformedResponse {
                backend: backend_id.to_string(),
                message: truncate(&message, MAX_ERROR_BODY_CHARS),
            })?;

        Ok(RawMetricData::new(backend_id, series))
    }
}

impl HttpMetricSourceClient {
    fn classify(&self, backend: &str, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            return self.timeout_error(backend);
        }

        FetchError::Transport {
            backend: backend.to_string(),
            message: error.without_url().to_string(),
        }
    }

    fn timeout_error(&self, backend: &str) -> FetchError {
        FetchError::Timeout {
            backend: backend.to_string(),
            timeout_ms: self.request_timeout.as_millis().min(u64::MAX as u128) as u64,
        }
    }
}

fn apply_credentials(request: RequestBuilder, credentials: Option<&Credentials>) -> RequestBuilder {
    match credentials {
        Some(Credentials::Bearer(token)) => request.bearer_auth(token),
        Some(Credentials::Basic { username, password }) => {
            request.basic_auth(username, password.as_deref())
        }
        None => request,
    }
}

fn strip_userinfo(url: &mut Url) {
    // only fails for cannot-be-a-base URLs, which carry no userinfo
    let _ = url.set_password(None);
    let _ = url.set_username("");
}

/// Rendering of a configured metric URL that is safe to publish.
///
/// Parsed URLs are shown as their endpoint. Unparseable input is shown
/// verbatim only if it cannot hold userinfo.
pub(crate) fn display_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(url) if !url.cannot_be_a_base() => endpoint(&url),
        _ if raw.contains('@') => "<redacted>".to_string(),
        _ => raw.to_string(),
    }
}

/// Scheme, host and path of `url`, without user info or query.
fn endpoint(url: &Url) -> String {
    format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.path()
    )
}

fn truncate(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}
