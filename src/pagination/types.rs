//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use crate::error::Result;
use crate::http::HttpResponse;
use crate::record::{NextPageToken, Record};
use crate::request_options::{RequestOption, RequestOptionsProvider};
use crate::types::{lookup_path, JsonValue};
use serde::{Deserialize, Serialize};

/// Computes the raw token value for the next page
///
/// Implementations are pure: all bookkeeping arrives through `last_token`.
pub trait PaginationStrategy: Send + Sync + std::fmt::Debug {
    /// Token value for the first request, if the strategy injects one
    fn initial_token(&self) -> Option<JsonValue> {
        None
    }

    /// Token value for the page after `response`, or `None` when done
    fn next_page_token(
        &self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
        last_token: Option<&JsonValue>,
    ) -> Result<Option<JsonValue>>;

    /// Page size to request, if the strategy has one
    fn page_size(&self) -> Option<u64> {
        None
    }
}

/// Drives pagination for the retriever and injects its token into requests
pub trait Paginator: RequestOptionsProvider + std::fmt::Debug {
    /// Token for the first request of a slice
    fn initial_token(&self) -> Option<NextPageToken>;

    /// Token for the page after `response`, or `None` when the slice is done
    ///
    /// Calling it twice with the same arguments yields the same token.
    fn next_page_token(
        &self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
        last_token: Option<&NextPageToken>,
    ) -> Result<Option<NextPageToken>>;

    /// Path (or absolute URL) replacing the requester's path, if any
    fn path(&self, next_page_token: Option<&NextPageToken>) -> Option<String>;
}

/// Where the page token goes on the next request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageTokenOption {
    /// Injected as a parameter, header or body field
    RequestOption {
        /// Target of the injection
        #[serde(flatten)]
        option: RequestOption,
    },
    /// The token is a path or URL that replaces the request path
    RequestPath,
}

impl PageTokenOption {
    /// Inject the token as the given option
    pub fn option(option: RequestOption) -> Self {
        Self::RequestOption { option }
    }
}

/// Stop conditions for pagination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopCondition {
    /// Stop when page is empty (no records)
    #[default]
    EmptyPage,

    /// Stop when a response field has a specific value
    Field {
        /// Dotted path to the field in the response body
        path: String,
        /// Value that means "no more pages"
        value: JsonValue,
    },
}

impl StopCondition {
    /// Create a field-based stop condition
    pub fn field(path: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::Field {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Check the condition against a page
    pub fn should_stop(&self, body: Option<&JsonValue>, last_page_size: usize) -> bool {
        match self {
            Self::EmptyPage => last_page_size == 0,
            Self::Field { path, value } => body
                .and_then(|body| lookup_path(body, path))
                .is_some_and(|found| found == value),
        }
    }
}
