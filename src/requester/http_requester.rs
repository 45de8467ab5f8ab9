//! HTTP requester
//!
//! Builds requests from a URL base, a templated path and merged request
//! options, sends them through the shared `HttpClient` and retries what the
//! error handler classifies as transient.

use super::types::{DefaultErrorHandler, ErrorHandler, Requester, ResponseAction};
use crate::auth::Authenticator;
use crate::error::{Error, Result};
use crate::http::{HttpBody, HttpClient, HttpRequest, HttpResponse};
use crate::record::{NextPageToken, StreamSlice, StreamState};
use crate::request_options::{
    combine_options, into_headers, RequestBody, RequestOptions, RequestOptionsProvider,
    StaticRequestOptions,
};
use crate::template::{self, TemplateContext};
use crate::types::{value_to_string, JsonObject, JsonValue, Method};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default number of retries for transient failures
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Requester for one stream of an HTTP API
#[derive(Debug)]
pub struct HttpRequester {
    name: String,
    url_base: String,
    path: String,
    method: Method,
    request_options: StaticRequestOptions,
    authenticator: Option<Arc<Authenticator>>,
    client: Arc<HttpClient>,
    error_handler: Box<dyn ErrorHandler>,
    max_retries: u32,
    config: JsonValue,
}

impl HttpRequester {
    /// Create a GET requester
    ///
    /// `url_base` and `path` may be templates; `url_base` is rendered
    /// against `config` once, `path` per request.
    pub fn new(
        name: impl Into<String>,
        url_base: impl Into<String>,
        path: impl Into<String>,
        client: Arc<HttpClient>,
    ) -> Self {
        Self {
            name: name.into(),
            url_base: url_base.into(),
            path: path.into(),
            method: Method::GET,
            request_options: StaticRequestOptions::default(),
            authenticator: None,
            client,
            error_handler: Box::new(DefaultErrorHandler::default()),
            max_retries: DEFAULT_MAX_RETRIES,
            config: JsonValue::Null,
        }
    }

    /// Bind the connector configuration and render the URL base
    pub fn with_config(mut self, config: JsonValue) -> Result<Self> {
        if template::has_templates(&self.url_base) {
            let ctx = TemplateContext::with_config(config.clone());
            self.url_base = template::render(&self.url_base, &ctx)?;
        }
        self.request_options.config = config.clone();
        self.config = config;
        Ok(self)
    }

    /// Set the HTTP method
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the static request options
    #[must_use]
    pub fn with_request_options(mut self, options: StaticRequestOptions) -> Self {
        let config = std::mem::take(&mut self.request_options.config);
        self.request_options = options;
        if self.request_options.config.is_null() {
            self.request_options.config = config;
        }
        self
    }

    /// Authenticate requests
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Use another error handler
    #[must_use]
    pub fn with_error_handler(mut self, handler: Box<dyn ErrorHandler>) -> Self {
        self.error_handler = handler;
        self
    }

    /// Set the number of retries for transient failures
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Join a path to the URL base; absolute URLs are used as they are
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.url_base.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }

    /// Turn merged options into a wire request
    fn build_request(&self, path: &str, options: &RequestOptions) -> Result<HttpRequest> {
        let mut request = HttpRequest::new(self.method, self.build_url(path));

        for (key, value) in &options.params {
            request = request.query(key.clone(), value_to_string(value));
        }
        for (key, value) in into_headers(&options.headers)? {
            request = request.header(key, value);
        }

        let body = match (&options.body_data, options.body_json.is_empty()) {
            (RequestBody::Empty, true) => HttpBody::None,
            (RequestBody::Empty, false) => {
                HttpBody::Json(JsonValue::Object(options.body_json.clone()))
            }
            (RequestBody::Form(fields), true) => HttpBody::Form(form_fields(fields)),
            (RequestBody::Text(text), true) => HttpBody::Text(text.clone()),
            (_, false) => {
                return Err(Error::invalid_option(
                    "request_body_data and request_body_json cannot both be set",
                ))
            }
        };
        Ok(request.body(body))
    }
}

fn form_fields(fields: &JsonObject) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), value_to_string(value)))
        .collect()
}

impl RequestOptionsProvider for HttpRequester {
    fn request_options(
        &self,
        stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestOptions> {
        self.request_options
            .request_options(stream_slice, next_page_token)
    }
}

#[async_trait]
impl Requester for HttpRequester {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_path(
        &self,
        stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<String> {
        let ctx = TemplateContext::with_config(self.config.clone())
            .slice(stream_slice)
            .token(next_page_token);
        template::render(&self.path, &ctx)
    }

    fn get_method(&self) -> Method {
        self.method
    }

    fn get_url_base(&self) -> &str {
        &self.url_base
    }

    fn interpret_response_status(&self, response: &HttpResponse) -> ResponseAction {
        self.error_handler.interpret_response(response)
    }

    async fn send_request(
        &self,
        path: &str,
        stream_state: &StreamState,
        stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
        options: &RequestOptions,
    ) -> Result<Option<HttpResponse>> {
        let own = self
            .request_options
            .render(stream_state, stream_slice, next_page_token)?;
        let merged = combine_options(&[own, options.clone()])?;
        let request = self.build_request(path, &merged)?;

        let mut attempt = 0;
        loop {
            debug!(
                stream = %self.name,
                method = ?request.method,
                url = %request.url,
                attempt,
                "Sending request"
            );

            let response = match self
                .client
                .execute(&request, self.authenticator.as_deref())
                .await
            {
                Ok(response) => response,
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.client.calculate_backoff(attempt);
                    warn!(
                        stream = %self.name,
                        error = %e,
                        "Request failed, attempt {}/{}, retrying in {:?}",
                        attempt + 1,
                        self.max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self.interpret_response_status(&response) {
                ResponseAction::Success => return Ok(Some(response)),
                ResponseAction::Ignore => {
                    debug!(stream = %self.name, status = response.status(), "Ignoring response");
                    return Ok(None);
                }
                ResponseAction::Fail => {
                    return Err(Error::http_status(response.status(), response.text()));
                }
                ResponseAction::Retry { backoff } => {
                    if attempt >= self.max_retries {
                        warn!(
                            stream = %self.name,
                            status = response.status(),
                            "Giving up after {} retries",
                            self.max_retries
                        );
                        return Err(Error::MaxRetriesExceeded {
                            max_retries: self.max_retries,
                        });
                    }
                    let delay = backoff.unwrap_or_else(|| self.client.calculate_backoff(attempt));
                    warn!(
                        stream = %self.name,
                        status = response.status(),
                        "Retryable response, attempt {}/{}, retrying in {:?}",
                        attempt + 1,
                        self.max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
