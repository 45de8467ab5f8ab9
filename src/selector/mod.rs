//! Record selection module
//!
//! Turns an HTTP response into the records of one page.
//!
//! # Overview
//!
//! - `DpathExtractor` - locates records in a decoded document
//! - `RecordFilter` - field filters and the client-side cursor filter
//! - `RecordTransformation` - add, remove and rename fields
//! - `DefaultRecordSelector` - the full pipeline

mod extractor;
mod filter;
mod record_selector;
mod transform;

pub use extractor::{DpathExtractor, WILDCARD};
pub use filter::{CursorFilter, FieldFilter, RecordFilter};
pub use record_selector::{DefaultRecordSelector, RecordSelector, SchemaNormalization};
pub use transform::{AddedField, RecordTransformation};

#[cfg(test)]
mod tests;
