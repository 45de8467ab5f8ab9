//! Retriever module
//!
//! Reads a stream from an HTTP API.
//!
//! # Overview
//!
//! A retriever ties the other components together. For every slice the
//! slicer (or cursor) produces, it fetches pages through the requester,
//! hands each page to the record selector, asks the paginator for the next
//! token, and finally closes the slice on the cursor with the most recent
//! record it saw.
//!
//! ```text
//! FETCH_PAGE -> PARSE_RECORDS -> (next token? FETCH_PAGE : CLOSE_SLICE)
//! ```

mod simple;
mod test_read;
mod types;

pub use simple::SimpleRetriever;
pub use test_read::TestReadRetriever;
pub use types::Retriever;
