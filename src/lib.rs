// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Solidafy Retriever
//!
//! A declarative retrieval engine for HTTP/JSON APIs: it reads one logical
//! resource ("stream") as a lazy sequence of records, slicing the work into
//! partitions, paginating each slice and keeping per-partition incremental
//! state that only moves forward.
//!
//! ## Features
//!
//! - **Partition routing**: static lists, parent streams and their cartesian product
//! - **Pagination**: cursor, offset, page number, Link header, request path
//! - **Incremental sync**: datetime windows, incrementing counters, per-partition state
//! - **Request option merging**: paginator and slicer options, conflicts are errors
//! - **Test reads**: truncate slices and pages, log HTTP traffic
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use solidafy_retriever::engine::SyncEngine;
//! use solidafy_retriever::loader::{load_manifest, ComponentFactory};
//! use solidafy_retriever::state::StateManager;
//!
//! #[tokio::main]
//! async fn main() -> solidafy_retriever::Result<()> {
//!     let manifest = load_manifest("manifest.yaml")?;
//!     let config = serde_json::json!({ "api_key": "sk_test_..." });
//!     let streams = ComponentFactory::new(manifest, config)?.build_streams()?;
//!
//!     let mut engine = SyncEngine::new(StateManager::in_memory());
//!     for message in engine.sync_streams(&streams).await? {
//!         println!("{}", serde_json::to_string(&message)?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │        SyncEngine: slices → records → checkpoints → state       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//!                         SimpleRetriever
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │ Requester│ Paginator │ StreamSlicer  │  Cursor   │  Selector   │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Auth     │ Cursor    │ Single        │ Datetime  │ Decoder     │
//! │ Retry    │ Offset    │ List          │ Counter   │ Extractor   │
//! │ Rate     │ Page      │ Substream     │ Partition │ Filters     │
//! │ limit    │ Test read │               │           │ Transforms  │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Records, slices, page tokens and stream data
pub mod record;

/// Template interpolation
pub mod template;

/// Authentication implementations
pub mod auth;

/// HTTP client with rate limiting
pub mod http;

/// Request options and their merging
pub mod request_options;

/// Pagination strategies
pub mod pagination;

/// Partition routing
pub mod partition;

/// Response decoders (JSON, JSON Lines)
pub mod decode;

/// Record extraction, filtering and transformation
pub mod selector;

/// Incremental cursors
pub mod incremental;

/// HTTP requester with retries
pub mod requester;

/// Stream retrievers
pub mod retriever;

/// State management and checkpointing
pub mod state;

/// Stream orchestration
pub mod engine;

/// YAML manifest loader
pub mod loader;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use loader::{load_manifest, load_manifest_from_str, ComponentFactory, ConnectorManifest};
pub use record::{Record, StreamData, StreamSlice};
pub use retriever::{Retriever, SimpleRetriever};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
