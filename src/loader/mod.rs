//! YAML Loader module
//!
//! Parse connector manifests from YAML files and build their streams.
//!
//! # Overview
//!
//! The loader module provides:
//! - `ConnectorManifest` - Declarative connector manifest
//! - `StreamDefinition` - Stream configuration
//! - `ComponentFactory` - Builds `DeclarativeStream`s from a manifest
//! - YAML parsing with validation

mod factory;
mod parser;
mod types;

pub use factory::{ComponentFactory, TestReadLimits};
pub use parser::{load_manifest, load_manifest_from_str};
pub use types::{
    CheckDefinition, ConnectorManifest, HttpDefinition, IncrementalDefinition,
    PaginationStrategyDefinition, PaginatorDefinition, ParentStreamDefinition,
    PartitionRouterDefinition, RecordSelectorDefinition, RequesterDefinition, StreamDefinition,
};
