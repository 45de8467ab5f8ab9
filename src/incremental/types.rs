//! Cursor types and traits

use crate::error::Result;
use crate::partition::StreamSlicer;
use crate::record::{Record, StreamSlice, StreamState};
use crate::types::JsonValue;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A parsed cursor value with its natural ordering
///
/// Values of different kinds are not comparable.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorValue {
    /// Numeric cursor (ids, counters, epoch values)
    Number(f64),
    /// Datetime cursor
    DateTime(DateTime<Utc>),
    /// Opaque string cursor, ordered lexicographically
    Text(String),
}

impl PartialOrd for CursorValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.partial_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl CursorValue {
    /// Read a numeric cursor from a JSON number or numeric string
    pub fn number_from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => n.as_f64().map(Self::Number),
            JsonValue::String(s) => s.trim().parse().ok().map(Self::Number),
            _ => None,
        }
    }

    /// JSON representation for state; integral numbers stay integers
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                JsonValue::from(*n as i64)
            }
            Self::Number(n) => JsonValue::from(*n),
            Self::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            Self::Text(s) => JsonValue::String(s.clone()),
        }
    }
}

/// A stream slicer that also tracks incremental state
///
/// Cursors are shared between the retriever, the record filter and the
/// engine, so every method takes `&self` and state lives behind a lock.
pub trait DeclarativeCursor: StreamSlicer {
    /// Name of the record field holding the cursor value
    fn cursor_field(&self) -> &str;

    /// Load previously persisted state
    fn set_initial_state(&self, stream_state: &StreamState) -> Result<()>;

    /// Current state, in the shape it is persisted in
    fn get_stream_state(&self) -> StreamState;

    /// Record that a slice finished
    ///
    /// `most_recent_record` is `None` when the slice produced no records,
    /// in which case the state is left unchanged. State never moves
    /// backwards.
    fn close_slice(
        &self,
        stream_slice: &StreamSlice,
        most_recent_record: Option<&Record>,
    ) -> Result<()>;

    /// Whether a record falls inside the range this cursor still has to sync
    fn should_be_synced(&self, record: &Record) -> bool;

    /// Parse the record's cursor value, if it has a usable one
    fn record_cursor_value(&self, record: &Record) -> Option<CursorValue>;

    /// Compare two records by cursor value
    ///
    /// A record without a usable cursor value never wins over one that has
    /// one.
    fn is_greater_than_or_equal(&self, first: &Record, second: &Record) -> bool {
        match (
            self.record_cursor_value(first),
            self.record_cursor_value(second),
        ) {
            (Some(a), Some(b)) => a >= b,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// Lock a cursor's state, recovering from a poisoned lock
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Store `value` unless it is smaller than the current value
///
/// Returns whether the state moved.
pub(crate) fn advance(slot: &Mutex<Option<CursorValue>>, value: CursorValue) -> bool {
    let mut current = lock(slot);
    let moves = match current.as_ref() {
        None => true,
        Some(existing) => value >= *existing,
    };
    if moves {
        *current = Some(value);
    }
    moves
}
