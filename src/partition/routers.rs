//! Partition router implementations
//!
//! Each router handles a specific partitioning strategy.

use super::types::{ParentStreamConfig, StreamSlicer};
use crate::error::Result;
use crate::record::{NextPageToken, SliceStream, StreamData, StreamSlice};
use crate::request_options::{
    combine_options, RequestOption, RequestOptions, RequestOptionsProvider,
};
use crate::types::{JsonObject, JsonValue};
use async_stream::try_stream;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Key under which a child partition carries its parent's partition
pub const PARENT_SLICE_KEY: &str = "parent_slice";

/// Schema passed to parent retrievers; parents are read for keys only
static PARENT_RECORDS_SCHEMA: JsonValue = JsonValue::Null;

// ============================================================================
// Single Partition Router
// ============================================================================

/// Unpartitioned stream: exactly one empty slice
#[derive(Debug, Clone, Copy, Default)]
pub struct SinglePartitionRouter;

impl RequestOptionsProvider for SinglePartitionRouter {}

impl StreamSlicer for SinglePartitionRouter {
    fn stream_slices(&self) -> SliceStream<'_> {
        stream::once(async { Ok(StreamSlice::empty()) }).boxed()
    }
}

// ============================================================================
// List Partition Router
// ============================================================================

/// One slice per value of a static list
#[derive(Debug, Clone)]
pub struct ListPartitionRouter {
    values: Vec<JsonValue>,
    cursor_field: String,
    request_option: Option<RequestOption>,
}

impl ListPartitionRouter {
    /// Create a list router; each slice is `{cursor_field: value}`
    pub fn new(values: Vec<JsonValue>, cursor_field: impl Into<String>) -> Self {
        Self {
            values,
            cursor_field: cursor_field.into(),
            request_option: None,
        }
    }

    /// Inject the current value into requests
    #[must_use]
    pub fn with_request_option(mut self, option: RequestOption) -> Self {
        self.request_option = Some(option);
        self
    }
}

impl RequestOptionsProvider for ListPartitionRouter {
    fn request_options(
        &self,
        stream_slice: Option<&StreamSlice>,
        _next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestOptions> {
        let mut options = RequestOptions::new();
        if let (Some(option), Some(value)) = (
            &self.request_option,
            stream_slice.and_then(|s| s.partition.get(&self.cursor_field)),
        ) {
            option.inject(value.clone(), &mut options);
        }
        Ok(options)
    }
}

impl StreamSlicer for ListPartitionRouter {
    fn stream_slices(&self) -> SliceStream<'_> {
        stream::iter(self.values.iter().map(|value| {
            let mut partition = JsonObject::new();
            partition.insert(self.cursor_field.clone(), value.clone());
            Ok(StreamSlice::from_partition(partition))
        }))
        .boxed()
    }
}

// ============================================================================
// Substream Partition Router
// ============================================================================

/// One slice per record of one or more parent streams
///
/// Parents are read lazily, slice by slice, while the child consumes its
/// slices. Each child partition carries the parent's partition under
/// `parent_slice`.
#[derive(Debug, Clone)]
pub struct SubstreamPartitionRouter {
    parent_stream_configs: Vec<ParentStreamConfig>,
}

impl SubstreamPartitionRouter {
    /// Create a substream router
    pub fn new(parent_stream_configs: Vec<ParentStreamConfig>) -> Self {
        Self {
            parent_stream_configs,
        }
    }

    /// The parent configurations
    pub fn parent_stream_configs(&self) -> &[ParentStreamConfig] {
        &self.parent_stream_configs
    }
}

impl RequestOptionsProvider for SubstreamPartitionRouter {
    fn request_options(
        &self,
        stream_slice: Option<&StreamSlice>,
        _next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestOptions> {
        let mut options = RequestOptions::new();
        let Some(slice) = stream_slice else {
            return Ok(options);
        };

        for config in &self.parent_stream_configs {
            if let (Some(option), Some(value)) = (
                &config.request_option,
                slice.partition.get(&config.partition_field),
            ) {
                option.inject(value.clone(), &mut options);
            }
        }
        Ok(options)
    }
}

impl StreamSlicer for SubstreamPartitionRouter {
    fn stream_slices(&self) -> SliceStream<'_> {
        Box::pin(try_stream! {
            for config in &self.parent_stream_configs {
                debug!(parent = config.stream.name(), "Reading parent stream for partitions");

                let mut parent_slices = config.stream.stream_slices();
                while let Some(parent_slice) = parent_slices.next().await {
                    let parent_slice = parent_slice?;
                    let parent_partition = JsonValue::Object(parent_slice.partition.clone());

                    let mut records = config
                        .stream
                        .read_records(&PARENT_RECORDS_SCHEMA, parent_slice);
                    while let Some(item) = records.next().await {
                        let StreamData::Record(record) = item? else {
                            continue;
                        };

                        let Some(value) = record.get_path(&config.parent_key) else {
                            warn!(
                                parent = config.stream.name(),
                                parent_key = %config.parent_key,
                                "Parent record is missing the partition key, skipping"
                            );
                            continue;
                        };

                        let mut partition = JsonObject::new();
                        partition.insert(config.partition_field.clone(), value.clone());
                        partition.insert(PARENT_SLICE_KEY.to_string(), parent_partition.clone());
                        yield StreamSlice::from_partition(partition);
                    }
                }
            }
        })
    }
}

// ============================================================================
// Cartesian Product Stream Slicer
// ============================================================================

/// Every combination of the slices of several slicers
///
/// Combinations follow the order of the slicers, the first one varying
/// slowest. Partitions, cursor slices and extra fields are merged; on a
/// shared key the earlier slicer wins. The slices of every slicer are
/// collected before the first combination is produced.
#[derive(Debug, Clone)]
pub struct CartesianProductStreamSlicer {
    stream_slicers: Vec<Arc<dyn StreamSlicer>>,
}

impl CartesianProductStreamSlicer {
    /// Combine slicers
    pub fn new(stream_slicers: Vec<Arc<dyn StreamSlicer>>) -> Self {
        Self { stream_slicers }
    }
}

impl RequestOptionsProvider for CartesianProductStreamSlicer {
    fn request_options(
        &self,
        stream_slice: Option<&StreamSlice>,
        next_page_token: Option<&NextPageToken>,
    ) -> Result<RequestOptions> {
        let option_sets = self
            .stream_slicers
            .iter()
            .map(|slicer| slicer.request_options(stream_slice, next_page_token))
            .collect::<Result<Vec<_>>>()?;
        combine_options(&option_sets)
    }
}

impl StreamSlicer for CartesianProductStreamSlicer {
    fn stream_slices(&self) -> SliceStream<'_> {
        Box::pin(try_stream! {
            let mut combinations = vec![StreamSlice::empty()];
            for slicer in &self.stream_slicers {
                let slices: Vec<StreamSlice> = slicer.stream_slices().try_collect().await?;
                combinations = combinations
                    .iter()
                    .flat_map(|prefix| slices.iter().map(move |slice| merge_slices(prefix, slice)))
                    .collect();
            }

            debug!(slices = combinations.len(), "Combined stream slices");
            for slice in combinations {
                yield slice;
            }
        })
    }
}

fn merge_slices(first: &StreamSlice, second: &StreamSlice) -> StreamSlice {
    let mut merged = first.clone();
    for (target, source) in [
        (&mut merged.partition, &second.partition),
        (&mut merged.cursor_slice, &second.cursor_slice),
        (&mut merged.extra_fields, &second.extra_fields),
    ] {
        for (key, value) in source {
            target.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    merged
}
