//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Declarative retriever CLI
#[derive(Parser, Debug)]
#[command(name = "solidafy-retriever")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Connector manifest (YAML)
    #[arg(short, long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Configuration file (JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline config JSON
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// State file (JSON)
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Inline state JSON
    #[arg(long, global = true)]
    pub state_json: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Test connection to the API
    Check,

    /// List the streams of the manifest
    Streams,

    /// Read data from streams
    Read {
        /// Stream to read (repeatable, empty = all)
        #[arg(long = "stream")]
        streams: Vec<String>,

        /// Resume from and checkpoint incremental state
        #[arg(long)]
        incremental: bool,

        /// Maximum records per stream
        #[arg(long)]
        max_records: Option<usize>,

        /// Read at most this many slices per stream
        #[arg(long)]
        limit_slices: Option<usize>,

        /// Read at most this many pages per slice
        #[arg(long)]
        limit_pages: Option<u64>,
    },
}
