//! Per-partition cursor
//!
//! Keeps one child cursor per partition of a partition router. State is
//! persisted as `{"states": [{"partition": {..}, "cursor": {..}}]}`.

use super::types::{lock, CursorValue, DeclarativeCursor};
use crate::error::{Error, Result};
use crate::partition::StreamSlicer;
use crate::record::{NextPageToken, Record, SliceStream, StreamSlice, StreamState};
use crate::request_options::{combine_options, RequestOptions, RequestOptionsProvider};
use crate::types::{JsonObject, JsonValue};
use async_stream::try_stream;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Key of the per-partition state list
pub const STATES_KEY: &str = "states";

/// Builds a fresh child cursor
pub type CursorFactory = Arc<dyn Fn() -> Result<Arc<dyn DeclarativeCursor>> + Send + Sync>;

struct PartitionCursor {
    partition: JsonObject,
    cursor: Arc<dyn DeclarativeCursor>,
}

/// Cursor that tracks state separately for every partition
pub struct PerPartitionCursor {
    partition_router: Arc<dyn StreamSlicer>,
    factory: CursorFactory,
    prototype: Arc<dyn DeclarativeCursor>,
    cursors: Mutex<BTreeMap<String, PartitionCursor>>,
    /// State applied to partitions that have none of their own
    fallback_state: Mutex<StreamState>,
}

impl PerPartitionCursor {
    /// Create a per-partition cursor
    pub fn new(partition_router: Arc<dyn StreamSlicer>, factory: CursorFactory) -> Result<Self> {
        let prototype = factory()?;
        Ok(Self {
            partition_router,
            factory,
            prototype,
            cursors: Mutex::new(BTreeMap::new()),
            fallback_state: Mutex::new(StreamState::new()),
        })
    }

    /// Number of partitions with a cursor
    pub fn partition_count(&self) -> usize {
        lock(&self.cursors).len()
    }

    /// Child cursor of a partition, created on first use
    fn cursor_for(&self, partition: &JsonObject) -> Result<Arc<dyn DeclarativeCursor>> {
        let key = crate::record::partition_key(partition);
        let mut cursors = lock(&self.cursors);
        if let Some(existing) = cursors.get(&key) {
            return Ok(Arc::clone(&existing.cursor));
        }

        let cursor = (self.factory)()?;
        let fallback = lock(&self.fallback_state).clone();
        if !fallback.is_empty() {
            cursor.set_initial_state(&fallback)?;
        }
        debug!(partition = %key, "Created cursor for new partition");
        cursors.insert(
            key,
            PartitionCursor {
                partition: partition.clone(),
                cursor: Arc::clone(&cursor),
            },
        );
        Ok(cursor)
    }

    fn existing_cursor(&self, partition: &JsonObject) -> Option<Arc<dyn DeclarativeCursor>> {
        lock(&self.cursors)
            .get(&crate::record::partition_key(partition))
            .map(|c| Arc::clone(&c.cursor))
    }

    fn record_cursor(&self, record: &Record) -> Option<Arc<dyn DeclarativeCursor>> {
        record
            .associated_slice()
            .and_then(|slice| self.existing_cursor(&slice.partition))
    }
}

impl std::fmt::Debug for PerPartitionCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerPartitionCursor")
            .field("partition_router", &self.partition_router)
            .field("cursor_field", &self.prototype.cursor_field())
            .field("partitions", &self.partition_count())
            .finish_non_exhaustive()
    }
}

impl RequestOptionsProvider for PerPartitionCursor {
    fn request_options(
        &self,
        stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestOptions> {
        let router = self
            .partition_router
            .request_options(stream_slice, next_page_token)?;
        let cursor = stream_slice
            .and_then(|slice| self.existing_cursor(&slice.partition))
            .unwrap_or_else(|| Arc::clone(&self.prototype))
            .request_options(stream_slice, next_page_token)?;
        combine_options(&[router, cursor])
    }
}

impl StreamSlicer for PerPartitionCursor {
    fn stream_slices(&self) -> SliceStream<'_> {
        Box::pin(try_stream! {
            let mut partitions = self.partition_router.stream_slices();
            while let Some(partition_slice) = partitions.next().await {
                let partition_slice = partition_slice?;
                let cursor = self.cursor_for(&partition_slice.partition)?;

                let mut cursor_slices = cursor.stream_slices();
                while let Some(cursor_slice) = cursor_slices.next().await {
                    let cursor_slice = cursor_slice?;
                    yield StreamSlice {
                        partition: partition_slice.partition.clone(),
                        cursor_slice: cursor_slice.cursor_slice,
                        extra_fields: partition_slice.extra_fields.clone(),
                    };
                }
            }
        })
    }
}

impl DeclarativeCursor for PerPartitionCursor {
    fn cursor_field(&self) -> &str {
        self.prototype.cursor_field()
    }

    fn set_initial_state(&self, stream_state: &StreamState) -> Result<()> {
        lock(&self.cursors).clear();

        let Some(states) = stream_state.get(STATES_KEY) else {
            if !stream_state.is_empty() {
                warn!("State is not per-partition, applying it to every partition");
            }
            *lock(&self.fallback_state) = stream_state.clone();
            return Ok(());
        };
        *lock(&self.fallback_state) = StreamState::new();

        let states = states
            .as_array()
            .ok_or_else(|| Error::state(format!("'{STATES_KEY}' must be a list")))?;
        for entry in states {
            let partition = entry
                .get("partition")
                .and_then(JsonValue::as_object)
                .ok_or_else(|| Error::state("per-partition state entry has no partition"))?;
            let cursor_state = entry
                .get("cursor")
                .and_then(JsonValue::as_object)
                .ok_or_else(|| Error::state("per-partition state entry has no cursor"))?;

            self.cursor_for(partition)?.set_initial_state(cursor_state)?;
        }
        Ok(())
    }

    fn get_stream_state(&self) -> StreamState {
        let states: Vec<JsonValue> = lock(&self.cursors)
            .values()
            .map(|entry| {
                let mut state = JsonObject::new();
                state.insert(
                    "partition".to_string(),
                    JsonValue::Object(entry.partition.clone()),
                );
                state.insert(
                    "cursor".to_string(),
                    JsonValue::Object(entry.cursor.get_stream_state()),
                );
                JsonValue::Object(state)
            })
            .collect();

        let mut state = StreamState::new();
        state.insert(STATES_KEY.to_string(), JsonValue::Array(states));
        state
    }

    fn close_slice(
        &self,
        stream_slice: &StreamSlice,
        most_recent_record: Option<&Record>,
    ) -> Result<()> {
        let cursor = self.cursor_for(&stream_slice.partition)?;
        cursor.close_slice(
            &StreamSlice::from_cursor(stream_slice.cursor_slice.clone()),
            most_recent_record,
        )
    }

    fn should_be_synced(&self, record: &Record) -> bool {
        self.record_cursor(record)
            .map_or(true, |cursor| cursor.should_be_synced(record))
    }

    fn record_cursor_value(&self, record: &Record) -> Option<CursorValue> {
        self.prototype.record_cursor_value(record)
    }
}
