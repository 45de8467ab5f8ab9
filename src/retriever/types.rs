//! Retriever trait

use crate::error::Result;
use crate::record::{SliceStream, StreamDataStream, StreamSlice, StreamState};
use crate::types::JsonValue;
use async_stream::try_stream;
use futures::StreamExt;

/// Reads one stream, slice by slice
///
/// Streams returned by a retriever are lazy: no request is sent before the
/// consumer polls.
pub trait Retriever: Send + Sync {
    /// Name of the stream
    fn name(&self) -> &str;

    /// Records and log messages of one slice
    ///
    /// The cursor, if any, has closed the slice once the stream ends.
    fn read_records<'a>(
        &'a self,
        records_schema: &'a JsonValue,
        stream_slice: StreamSlice,
    ) -> StreamDataStream<'a>;

    /// Slices the stream is read in
    fn stream_slices(&self) -> SliceStream<'_>;

    /// Current incremental state; empty without a cursor
    fn state(&self) -> StreamState;

    /// Restore incremental state from a previous sync
    fn set_state(&self, state: &StreamState) -> Result<()>;

    /// Read every slice in order
    fn read_stream<'a>(&'a self, records_schema: &'a JsonValue) -> StreamDataStream<'a> {
        Box::pin(try_stream! {
            let mut slices = self.stream_slices();
            while let Some(slice) = slices.next().await {
                let mut items = self.read_records(records_schema, slice?);
                while let Some(item) = items.next().await {
                    yield item?;
                }
            }
        })
    }
}
