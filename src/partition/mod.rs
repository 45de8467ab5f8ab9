//! Partition routing module
//!
//! Supports: Single partition, Static list, Parent stream (substream),
//! Cartesian product of several slicers
//!
//! # Overview
//!
//! Partitions split a stream into slices that are read one after another.
//! This is useful for:
//! - Child resources that require a parent ID
//! - Static list of values (e.g., regions, accounts)
//!
//! Date-window slicing lives with the cursors in the `incremental` module,
//! since cursors are stream slicers too.

mod routers;
mod types;

pub use routers::{
    CartesianProductStreamSlicer, ListPartitionRouter, SinglePartitionRouter,
    SubstreamPartitionRouter, PARENT_SLICE_KEY,
};
pub use types::{ParentStreamConfig, StreamSlicer};
