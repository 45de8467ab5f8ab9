//! Slice-limited retriever for connection tests and previews

use super::types::Retriever;
use crate::error::{Error, Result};
use crate::record::{SliceStream, StreamDataStream, StreamSlice, StreamState};
use crate::types::JsonValue;
use futures::StreamExt;
use std::sync::Arc;

/// Reads only the first `maximum_number_of_slices` slices of a stream
///
/// Pages per slice are capped separately, with a
/// `PaginatorTestReadDecorator` on the inner retriever's paginator.
pub struct TestReadRetriever {
    inner: Arc<dyn Retriever>,
    maximum_number_of_slices: usize,
}

impl TestReadRetriever {
    /// Wrap a retriever; the limit must be at least one
    pub fn new(inner: Arc<dyn Retriever>, maximum_number_of_slices: usize) -> Result<Self> {
        if maximum_number_of_slices == 0 {
            return Err(Error::invalid_value(
                "maximum_number_of_slices",
                "must be a positive integer",
            ));
        }
        Ok(Self {
            inner,
            maximum_number_of_slices,
        })
    }

    /// Slice limit
    pub fn maximum_number_of_slices(&self) -> usize {
        self.maximum_number_of_slices
    }
}

impl std::fmt::Debug for TestReadRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestReadRetriever")
            .field("inner", &self.inner.name())
            .field("maximum_number_of_slices", &self.maximum_number_of_slices)
            .finish()
    }
}

impl Retriever for TestReadRetriever {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn read_records<'a>(
        &'a self,
        records_schema: &'a JsonValue,
        stream_slice: StreamSlice,
    ) -> StreamDataStream<'a> {
        self.inner.read_records(records_schema, stream_slice)
    }

    fn stream_slices(&self) -> SliceStream<'_> {
        self.inner
            .stream_slices()
            .take(self.maximum_number_of_slices)
            .boxed()
    }

    fn state(&self) -> StreamState {
        self.inner.state()
    }

    fn set_state(&self, state: &StreamState) -> Result<()> {
        self.inner.set_state(state)
    }
}
