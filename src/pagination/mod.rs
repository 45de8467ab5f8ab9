//! Pagination module
//!
//! Supports: Cursor (body, header, Link header, last record), Offset
//! Increment, Page Increment, No Pagination
//!
//! # Overview
//!
//! A `Paginator` computes the token for the next page from the last
//! response and injects it into the following request. Strategies are pure:
//! the page bookkeeping (current offset, page number, test-read page count)
//! is carried in the token, never in the paginator, so the same paginator
//! can be shared by every slice of a stream.

mod paginator;
mod strategies;
mod types;

pub use paginator::{
    DefaultPaginator, NoPagination, PaginatorTestReadDecorator, TEST_READ_PAGE_COUNT_KEY,
};
pub use strategies::{CursorPagination, CursorSource, OffsetIncrement, PageIncrement};
pub use types::{PageTokenOption, PaginationStrategy, Paginator, StopCondition};
