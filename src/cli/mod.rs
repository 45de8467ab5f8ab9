//! CLI module
//!
//! Command-line interface for running connector manifests.
//!
//! # Commands
//!
//! - `check` - Test connection to the API
//! - `streams` - List stream names
//! - `read` - Extract data from streams as JSON lines

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;

#[cfg(test)]
mod tests;
