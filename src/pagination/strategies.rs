//! Pagination strategy implementations
//!
//! Each strategy computes the raw token value for one pagination pattern.

use super::types::{PaginationStrategy, StopCondition};
use crate::error::Result;
use crate::http::HttpResponse;
use crate::record::Record;
use crate::types::{lookup_path, JsonValue};
use serde::{Deserialize, Serialize};

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Where a cursor strategy reads the next cursor from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CursorSource {
    /// Dotted path into the response body (e.g. `meta.next_cursor`)
    BodyPath {
        /// Path to the cursor
        path: String,
    },
    /// A response header
    Header {
        /// Header name
        name: String,
    },
    /// A relation of the RFC 8288 `Link` header
    LinkHeader {
        /// Relation to follow
        #[serde(default = "default_rel")]
        rel: String,
    },
    /// A field of the last record on the page (e.g. Stripe's `starting_after`)
    LastRecord {
        /// Dotted path into the record
        path: String,
    },
}

fn default_rel() -> String {
    "next".to_string()
}

/// Cursor-based pagination (e.g., Stripe, Slack, GitHub)
///
/// The next token is read from the response or the last record. A missing,
/// null or empty cursor ends the slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPagination {
    /// Where the cursor comes from
    pub cursor_value: CursorSource,
    /// Optional condition that ends pagination early
    #[serde(default)]
    pub stop_condition: Option<StopCondition>,
    /// Optional page size to request
    #[serde(default)]
    pub page_size: Option<u64>,
}

impl CursorPagination {
    /// Create a cursor strategy reading from the response body
    pub fn from_body(path: impl Into<String>) -> Self {
        Self::new(CursorSource::BodyPath { path: path.into() })
    }

    /// Create a cursor strategy following the `Link` header
    pub fn from_link_header() -> Self {
        Self::new(CursorSource::LinkHeader { rel: default_rel() })
    }

    /// Create a cursor strategy from a source
    pub fn new(cursor_value: CursorSource) -> Self {
        Self {
            cursor_value,
            stop_condition: None,
            page_size: None,
        }
    }

    /// Set stop condition
    #[must_use]
    pub fn with_stop_condition(mut self, condition: StopCondition) -> Self {
        self.stop_condition = Some(condition);
        self
    }

    /// Set page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }

    fn needs_body(&self) -> bool {
        matches!(self.cursor_value, CursorSource::BodyPath { .. })
            || matches!(self.stop_condition, Some(StopCondition::Field { .. }))
    }
}

impl PaginationStrategy for CursorPagination {
    fn next_page_token(
        &self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
        _last_token: Option<&JsonValue>,
    ) -> Result<Option<JsonValue>> {
        let body = if self.needs_body() {
            Some(response.json()?)
        } else {
            None
        };

        if let Some(condition) = &self.stop_condition {
            if condition.should_stop(body.as_ref(), last_page_size) {
                return Ok(None);
            }
        }

        let cursor = match &self.cursor_value {
            CursorSource::BodyPath { path } => body
                .as_ref()
                .and_then(|body| lookup_path(body, path))
                .cloned(),
            CursorSource::Header { name } => response
                .header(name)
                .map(|v| JsonValue::String(v.to_string())),
            CursorSource::LinkHeader { rel } => response
                .header("link")
                .and_then(|link| parse_link_header(link, rel))
                .map(JsonValue::String),
            CursorSource::LastRecord { path } => {
                last_record.and_then(|record| record.get_path(path)).cloned()
            }
        };

        Ok(cursor.filter(|value| match value {
            JsonValue::Null => false,
            JsonValue::String(s) => !s.is_empty(),
            _ => true,
        }))
    }

    fn page_size(&self) -> Option<u64> {
        self.page_size
    }
}

/// Parse a Link header and extract the URL for the given rel
pub(crate) fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    // <url>; rel="next", <url>; rel="prev"
    for part in header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.trim().split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(stripped) = segment.strip_prefix("rel=") {
                rel = Some(stripped.trim_matches('"').trim_matches('\''));
            }
        }

        if let (Some(u), Some(r)) = (url, rel) {
            if r.split_whitespace().any(|r| r == target_rel) {
                return Some(u.to_string());
            }
        }
    }

    None
}

// ============================================================================
// Offset Increment
// ============================================================================

/// Offset-based pagination (`?offset=100&limit=50`)
///
/// The next offset is the previous offset plus the size of the last page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetIncrement {
    /// Records per page; a shorter page ends the slice
    #[serde(default)]
    pub page_size: Option<u64>,
    /// Send `offset=0` on the first request
    #[serde(default)]
    pub inject_on_first_request: bool,
}

impl OffsetIncrement {
    /// Create an offset strategy with a page size
    pub fn new(page_size: u64) -> Self {
        Self {
            page_size: Some(page_size),
            inject_on_first_request: false,
        }
    }

    /// Inject the zero offset on the first request
    #[must_use]
    pub fn inject_on_first_request(mut self) -> Self {
        self.inject_on_first_request = true;
        self
    }
}

impl PaginationStrategy for OffsetIncrement {
    fn initial_token(&self) -> Option<JsonValue> {
        self.inject_on_first_request.then(|| JsonValue::from(0u64))
    }

    fn next_page_token(
        &self,
        _response: &HttpResponse,
        last_page_size: usize,
        _last_record: Option<&Record>,
        last_token: Option<&JsonValue>,
    ) -> Result<Option<JsonValue>> {
        if is_last_page(self.page_size, last_page_size) {
            return Ok(None);
        }

        let previous = last_token.and_then(token_as_u64).unwrap_or(0);
        Ok(Some(JsonValue::from(previous + last_page_size as u64)))
    }

    fn page_size(&self) -> Option<u64> {
        self.page_size
    }
}

// ============================================================================
// Page Increment
// ============================================================================

/// Page number pagination (`?page=2&per_page=50`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageIncrement {
    /// Records per page; a shorter page ends the slice
    #[serde(default)]
    pub page_size: Option<u64>,
    /// Number of the first page (usually 0 or 1)
    #[serde(default = "default_start_page")]
    pub start_from_page: u64,
    /// Send the first page number on the first request
    #[serde(default)]
    pub inject_on_first_request: bool,
}

fn default_start_page() -> u64 {
    1
}

impl Default for PageIncrement {
    fn default() -> Self {
        Self {
            page_size: None,
            start_from_page: default_start_page(),
            inject_on_first_request: false,
        }
    }
}

impl PageIncrement {
    /// Create a page strategy starting at `start_from_page`
    pub fn new(start_from_page: u64) -> Self {
        Self {
            start_from_page,
            ..Default::default()
        }
    }

    /// Set page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

impl PaginationStrategy for PageIncrement {
    fn initial_token(&self) -> Option<JsonValue> {
        self.inject_on_first_request
            .then(|| JsonValue::from(self.start_from_page))
    }

    fn next_page_token(
        &self,
        _response: &HttpResponse,
        last_page_size: usize,
        _last_record: Option<&Record>,
        last_token: Option<&JsonValue>,
    ) -> Result<Option<JsonValue>> {
        if is_last_page(self.page_size, last_page_size) {
            return Ok(None);
        }

        let current = last_token
            .and_then(token_as_u64)
            .unwrap_or(self.start_from_page);
        Ok(Some(JsonValue::from(current + 1)))
    }

    fn page_size(&self) -> Option<u64> {
        self.page_size
    }
}

/// A short page (or an empty one when the page size is unknown) is the last
fn is_last_page(page_size: Option<u64>, last_page_size: usize) -> bool {
    match page_size {
        Some(size) => (last_page_size as u64) < size,
        None => last_page_size == 0,
    }
}

fn token_as_u64(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n.as_u64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}
