//! Requester types and traits

use crate::error::Result;
use crate::http::{is_retryable_status, HttpResponse};
use crate::record::{NextPageToken, StreamSlice, StreamState};
use crate::request_options::{RequestOptions, RequestOptionsProvider};
use crate::types::Method;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do with a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseAction {
    /// Use the response
    Success,
    /// Send the request again, after `backoff` if the server asked for one
    Retry {
        /// Server-requested delay (`Retry-After`)
        backoff: Option<Duration>,
    },
    /// Give up with an error
    Fail,
    /// Treat the slice as empty
    Ignore,
}

/// Classifies responses
pub trait ErrorHandler: Send + Sync + std::fmt::Debug {
    /// Decide what to do with a response
    fn interpret_response(&self, response: &HttpResponse) -> ResponseAction;
}

/// Status-based error handling
///
/// 2xx succeed, 429 and transient 5xx are retried, 404 is ignored when
/// `ignore_not_found` is set, everything else fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultErrorHandler {
    /// Treat 404 as an empty result
    #[serde(default)]
    pub ignore_not_found: bool,
}

impl DefaultErrorHandler {
    /// Handler that ignores 404 responses
    pub fn ignoring_not_found() -> Self {
        Self {
            ignore_not_found: true,
        }
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn interpret_response(&self, response: &HttpResponse) -> ResponseAction {
        match response.status() {
            200..=299 => ResponseAction::Success,
            404 if self.ignore_not_found => ResponseAction::Ignore,
            status if is_retryable_status(status) => ResponseAction::Retry {
                backoff: response.retry_after(),
            },
            _ => ResponseAction::Fail,
        }
    }
}

/// Sends the requests of a stream
///
/// The requester's own options (static, templated) are part of its
/// `RequestOptionsProvider` implementation and are merged with the options
/// passed to `send_request`.
#[async_trait]
pub trait Requester: RequestOptionsProvider + std::fmt::Debug {
    /// Name of the stream this requester serves
    fn name(&self) -> &str;

    /// Request path for a slice and page
    fn get_path(
        &self,
        stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<String>;

    /// HTTP method
    fn get_method(&self) -> Method;

    /// Base URL paths are joined to
    fn get_url_base(&self) -> &str;

    /// Classify a response
    fn interpret_response_status(&self, response: &HttpResponse) -> ResponseAction;

    /// Send a request, retrying transient failures
    ///
    /// `stream_state` is the stream's current state, visible to templated
    /// options. Returns `None` when the response is to be ignored.
    async fn send_request(
        &self,
        path: &str,
        stream_state: &StreamState,
        stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
        options: &RequestOptions,
    ) -> Result<Option<HttpResponse>>;
}
