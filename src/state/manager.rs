//! State manager implementation
//!
//! Provides file-based state persistence with atomic writes.

use super::types::State;
use crate::error::{Error, Result};
use crate::record::StreamState;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// State manager for persisting and loading state
#[derive(Debug)]
pub struct StateManager {
    /// Path to the state file
    path: PathBuf,
    /// Current state (cached)
    state: Arc<RwLock<State>>,
    /// Whether to auto-save on every update
    auto_save: bool,
}

impl StateManager {
    /// Create a new state manager with the given path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Arc::new(RwLock::new(State::new())),
            auto_save: true,
        }
    }

    /// Create a state manager with auto-save disabled
    pub fn without_auto_save(path: impl AsRef<Path>) -> Self {
        Self {
            auto_save: false,
            ..Self::new(path)
        }
    }

    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(State::new())),
            auto_save: false,
        }
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            parse_state(&contents)?
        } else {
            State::new()
        };

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
            auto_save: true,
        })
    }

    /// Create an in-memory state manager from inline JSON
    ///
    /// Accepts the `{"streams": {...}}` document this manager writes.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(parse_state(json)?)),
            auto_save: false,
        })
    }

    /// Load state from file
    pub async fn load(&self) -> Result<()> {
        if self.is_in_memory() || !self.path.exists() {
            return Ok(());
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
        let loaded = parse_state(&contents)?;

        *self.state.write().await = loaded;
        Ok(())
    }

    /// Save current state to file
    pub async fn save(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }
        self.save_to_file(&self.path).await
    }

    /// Save state to a specific file path
    pub async fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = self.to_json_pretty().await?;

        // Write to temp file first, then rename for atomicity
        let path = path.as_ref();
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;
        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

        debug!(path = %path.display(), "State saved");
        Ok(())
    }

    /// Get a read lock on the current state
    pub async fn state(&self) -> tokio::sync::RwLockReadGuard<'_, State> {
        self.state.read().await
    }

    /// Export state as JSON string
    pub async fn to_json(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// Export state as pretty-printed JSON string
    pub async fn to_json_pretty(&self) -> Result<String> {
        let state = self.state.read().await;
        serde_json::to_string_pretty(&*state)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }

    /// State of a stream; empty when the stream has none
    pub async fn get_stream_state(&self, stream: &str) -> StreamState {
        self.state
            .read()
            .await
            .get_stream(stream)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace the state of a stream
    pub async fn set_stream_state(&self, stream: &str, stream_state: StreamState) -> Result<()> {
        self.state.write().await.set_stream(stream, stream_state);

        if self.auto_save {
            self.save().await?;
        }
        Ok(())
    }

    /// Clear all state
    pub async fn clear(&self) -> Result<()> {
        *self.state.write().await = State::new();

        if self.auto_save {
            self.save().await?;
        }
        Ok(())
    }

    /// Clear state for a specific stream
    pub async fn clear_stream(&self, stream: &str) -> Result<()> {
        self.state.write().await.streams.remove(stream);

        if self.auto_save {
            self.save().await?;
        }
        Ok(())
    }

    /// Get the state file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }

    /// Create a checkpoint (alias for save)
    pub async fn checkpoint(&self) -> Result<()> {
        self.save().await
    }
}

fn parse_state(contents: &str) -> Result<State> {
    serde_json::from_str(contents)
        .map_err(|e| Error::state(format!("Failed to parse state: {e}")))
}

impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            state: Arc::clone(&self.state),
            auto_save: self.auto_save,
        }
    }
}
