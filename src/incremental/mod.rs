//! Incremental sync module
//!
//! Cursors decide which slices to read and remember how far a stream has
//! been synced.
//!
//! # Overview
//!
//! - `DatetimeBasedCursor` - date windows over a datetime field
//! - `IncrementingCountCursor` - a single slice over a numeric field
//! - `PerPartitionCursor` - one child cursor per partition
//!
//! A cursor only moves forward: `close_slice` stores the most recent
//! record's value when it is not smaller than the stored one.

mod datetime;
mod incrementing;
mod per_partition;
mod types;

pub use datetime::{
    format_datetime, parse_datetime, parse_datetime_any, CalendarDuration, DatetimeBasedCursor,
    DatetimeCursorConfig, DatetimeWindows, DEFAULT_DATETIME_FORMAT,
};
pub use incrementing::{IncrementingCountCursor, IncrementingCursorConfig, INCREMENTING_START_KEY};
pub use per_partition::{CursorFactory, PerPartitionCursor, STATES_KEY};
pub use types::{CursorValue, DeclarativeCursor};

#[cfg(test)]
mod tests;
