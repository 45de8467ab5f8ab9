//! HTTP client with rate limiting
//!
//! Sends one prepared request per call and buffers the response. Retry
//! decisions belong to the requester's error handler; the client only
//! provides the backoff schedule.

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::Authenticator;
use crate::error::{Error, Result};
use crate::types::{BackoffType, JsonValue, Method};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            rate_limit: Some(RateLimiterConfig::default()),
            default_headers: HashMap::new(),
            user_agent: format!("solidafy-retriever/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

// ============================================================================
// Request / Response
// ============================================================================

/// Request body as sent on the wire
#[derive(Debug, Clone, Default, PartialEq)]
pub enum HttpBody {
    /// No body
    #[default]
    None,
    /// JSON body
    Json(JsonValue),
    /// URL-encoded form
    Form(Vec<(String, String)>),
    /// Raw text
    Text(String),
}

/// A fully prepared HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// Headers
    pub headers: Vec<(String, String)>,
    /// Body
    pub body: HttpBody,
}

impl HttpRequest {
    /// Create a request without parameters or body
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: HttpBody::None,
        }
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set the body
    #[must_use]
    pub fn body(mut self, body: HttpBody) -> Self {
        self.body = body;
        self
    }
}

/// A buffered HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: u16,
    headers: HeaderMap,
    body: Bytes,
    url: String,
}

impl HttpResponse {
    /// Create a response from its parts
    pub fn new(status: u16, headers: HeaderMap, body: impl Into<Bytes>, url: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            url: url.into(),
        }
    }

    /// A 200 response carrying a JSON body
    pub fn json_ok(body: &JsonValue) -> Self {
        Self::new(200, HeaderMap::new(), body.to_string(), "")
    }

    /// Status code
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Check for a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A header value as text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Raw body
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as (lossy) text
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON
    pub fn json(&self) -> Result<JsonValue> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::decode(format!("Invalid JSON response from {}: {e}", self.url)))
    }

    /// URL the response came from
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Delay requested by the server via `Retry-After` (seconds form)
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client with rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Send a single attempt and buffer the response
    ///
    /// Any status is returned as a response; only transport failures are errors.
    pub async fn execute(
        &self,
        request: &HttpRequest,
        authenticator: Option<&Authenticator>,
    ) -> Result<HttpResponse> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let mut req = self
            .client
            .request(request.method.into(), &request.url)
            .timeout(self.config.timeout);

        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }
        for (key, value) in &request.headers {
            req = req.header(key.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        req = match &request.body {
            HttpBody::None => req,
            HttpBody::Json(body) => req.json(body),
            HttpBody::Form(fields) => req.form(fields),
            HttpBody::Text(text) => req.body(text.clone()),
        };

        if let Some(auth) = authenticator {
            req = auth.apply(req).await?;
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                #[allow(clippy::cast_possible_truncation)]
                Error::Timeout {
                    timeout_ms: self.config.timeout.as_millis() as u64,
                }
            } else {
                Error::Http(e)
            }
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = response.bytes().await?;

        debug!(method = ?request.method, %url, status, "HTTP request completed");
        Ok(HttpResponse::new(status, headers, body, url))
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff * (attempt + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.config.initial_backoff * factor
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Check if an HTTP status is worth retrying
pub fn is_retryable_status(status: u16) -> bool {
    matches!(
        status,
        429 | 500 | 502 | 503 | 504 | 520 | 521 | 522 | 523 | 524
    )
}
