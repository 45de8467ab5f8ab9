//! State management module
//!
//! Persists the incremental state of every stream between sync runs.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - Stream name to cursor state, in the shape cursors report it
//! - `StateManager` - In-memory or file-backed persistence with atomic writes
//!
//! A stream's state is opaque here: `{cursor_field: value}` for a single
//! cursor, `{"states": [{partition, cursor}]}` for per-partition cursors.

mod manager;
mod types;

pub use manager::StateManager;
pub use types::State;
