//! Partition types and traits
//!
//! Defines the core slicing abstractions.

use crate::record::SliceStream;
use crate::request_options::{RequestOption, RequestOptionsProvider};
use crate::retriever::Retriever;
use std::sync::Arc;

/// Produces the slices a stream is read in
///
/// Slicers also contribute request options for the slice being read (e.g.
/// the partition id as a query parameter).
pub trait StreamSlicer: RequestOptionsProvider + std::fmt::Debug {
    /// Lazily enumerate slices. The stream is finite and not restartable;
    /// call again for a fresh enumeration.
    fn stream_slices(&self) -> SliceStream<'_>;
}

/// How a child stream is partitioned by one parent stream
#[derive(Clone)]
pub struct ParentStreamConfig {
    /// Retriever of the parent stream
    pub stream: Arc<dyn Retriever>,
    /// Dotted path of the value to take from each parent record
    pub parent_key: String,
    /// Name of the value in the child partition
    pub partition_field: String,
    /// Optional injection of the value into child requests
    pub request_option: Option<RequestOption>,
}

impl ParentStreamConfig {
    /// Create a parent config
    pub fn new(
        stream: Arc<dyn Retriever>,
        parent_key: impl Into<String>,
        partition_field: impl Into<String>,
    ) -> Self {
        Self {
            stream,
            parent_key: parent_key.into(),
            partition_field: partition_field.into(),
            request_option: None,
        }
    }

    /// Inject the partition value into child requests
    #[must_use]
    pub fn with_request_option(mut self, option: RequestOption) -> Self {
        self.request_option = Some(option);
        self
    }
}

impl std::fmt::Debug for ParentStreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParentStreamConfig")
            .field("stream", &self.stream.name())
            .field("parent_key", &self.parent_key)
            .field("partition_field", &self.partition_field)
            .field("request_option", &self.request_option)
            .finish()
    }
}
