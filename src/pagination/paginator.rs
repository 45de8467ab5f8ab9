//! Paginator implementations

use super::types::{PageTokenOption, PaginationStrategy, Paginator};
use crate::error::{Error, Result};
use crate::http::HttpResponse;
use crate::record::{NextPageToken, Record, StreamSlice};
use crate::request_options::{RequestOption, RequestOptions, RequestOptionsProvider};
use crate::types::{value_to_string, JsonValue};
use tracing::debug;

/// Token key holding the number of pages read so far in test reads
pub const TEST_READ_PAGE_COUNT_KEY: &str = "__test_read_page_count";

// ============================================================================
// Default Paginator
// ============================================================================

/// Paginator driven by a strategy, injecting the token and page size
#[derive(Debug)]
pub struct DefaultPaginator {
    strategy: Box<dyn PaginationStrategy>,
    page_token_option: PageTokenOption,
    page_size_option: Option<RequestOption>,
}

impl DefaultPaginator {
    /// Create a paginator
    pub fn new(strategy: impl PaginationStrategy + 'static, page_token_option: PageTokenOption) -> Self {
        Self::from_boxed(Box::new(strategy), page_token_option)
    }

    /// Create a paginator from a boxed strategy
    pub fn from_boxed(strategy: Box<dyn PaginationStrategy>, page_token_option: PageTokenOption) -> Self {
        Self {
            strategy,
            page_token_option,
            page_size_option: None,
        }
    }

    /// Inject the strategy's page size with this option
    #[must_use]
    pub fn with_page_size_option(mut self, option: RequestOption) -> Self {
        self.page_size_option = Some(option);
        self
    }
}

impl RequestOptionsProvider for DefaultPaginator {
    fn request_options(
        &self,
        _stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestOptions> {
        let mut options = RequestOptions::new();

        if let PageTokenOption::RequestOption { option } = &self.page_token_option {
            if let Some(token) = next_page_token.and_then(NextPageToken::value) {
                option.inject(token.clone(), &mut options);
            }
        }

        if let (Some(option), Some(size)) = (&self.page_size_option, self.strategy.page_size()) {
            option.inject(JsonValue::from(size), &mut options);
        }

        Ok(options)
    }
}

impl Paginator for DefaultPaginator {
    fn initial_token(&self) -> Option<NextPageToken> {
        self.strategy.initial_token().map(NextPageToken::new)
    }

    fn next_page_token(
        &self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
        last_token: Option<&NextPageToken>,
    ) -> Result<Option<NextPageToken>> {
        let next = self.strategy.next_page_token(
            response,
            last_page_size,
            last_record,
            last_token.and_then(NextPageToken::value),
        )?;

        debug!(?next, last_page_size, "Computed next page token");
        Ok(next.map(NextPageToken::new))
    }

    fn path(&self, next_page_token: Option<&NextPageToken>) -> Option<String> {
        match self.page_token_option {
            PageTokenOption::RequestPath => next_page_token
                .and_then(NextPageToken::value)
                .map(value_to_string)
                .filter(|path| !path.is_empty()),
            PageTokenOption::RequestOption { .. } => None,
        }
    }
}

// ============================================================================
// No Pagination
// ============================================================================

/// No pagination - one request per slice
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPagination;

impl RequestOptionsProvider for NoPagination {}

impl Paginator for NoPagination {
    fn initial_token(&self) -> Option<NextPageToken> {
        None
    }

    fn next_page_token(
        &self,
        _response: &HttpResponse,
        _last_page_size: usize,
        _last_record: Option<&Record>,
        _last_token: Option<&NextPageToken>,
    ) -> Result<Option<NextPageToken>> {
        Ok(None)
    }

    fn path(&self, _next_page_token: Option<&NextPageToken>) -> Option<String> {
        None
    }
}

// ============================================================================
// Test Read Decorator
// ============================================================================

/// Caps the number of pages read per slice during test reads
///
/// The page count travels inside the token, so the decorator holds no state
/// and can be shared across slices.
#[derive(Debug)]
pub struct PaginatorTestReadDecorator {
    inner: Box<dyn Paginator>,
    max_pages: u64,
}

impl PaginatorTestReadDecorator {
    /// Wrap a paginator; `max_pages` must be at least one
    pub fn new(inner: Box<dyn Paginator>, max_pages: u64) -> Result<Self> {
        if max_pages == 0 {
            return Err(Error::invalid_value(
                "max_pages",
                "must be a positive integer",
            ));
        }
        Ok(Self { inner, max_pages })
    }

    fn page_count(token: Option<&NextPageToken>) -> u64 {
        token
            .and_then(|t| t.get(TEST_READ_PAGE_COUNT_KEY))
            .and_then(JsonValue::as_u64)
            .unwrap_or(1)
    }
}

impl RequestOptionsProvider for PaginatorTestReadDecorator {
    fn request_options(
        &self,
        stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestOptions> {
        self.inner.request_options(stream_slice, next_page_token)
    }
}

impl Paginator for PaginatorTestReadDecorator {
    fn initial_token(&self) -> Option<NextPageToken> {
        self.inner
            .initial_token()
            .map(|token| token.with(TEST_READ_PAGE_COUNT_KEY, 1u64))
    }

    fn next_page_token(
        &self,
        response: &HttpResponse,
        last_page_size: usize,
        last_record: Option<&Record>,
        last_token: Option<&NextPageToken>,
    ) -> Result<Option<NextPageToken>> {
        let pages_read = Self::page_count(last_token);
        if pages_read >= self.max_pages {
            debug!(pages_read, "Test read page limit reached");
            return Ok(None);
        }

        let next = self
            .inner
            .next_page_token(response, last_page_size, last_record, last_token)?;
        Ok(next.map(|token| token.with(TEST_READ_PAGE_COUNT_KEY, pages_read + 1)))
    }

    fn path(&self, next_page_token: Option<&NextPageToken>) -> Option<String> {
        self.inner.path(next_page_token)
    }
}
