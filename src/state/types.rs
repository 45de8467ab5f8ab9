//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs.

use crate::record::StreamState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete state for a connector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream state
    #[serde(default)]
    pub streams: HashMap<String, StreamState>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get state for a stream
    pub fn get_stream(&self, stream: &str) -> Option<&StreamState> {
        self.streams.get(stream)
    }

    /// Replace the state of a stream; an empty state removes the entry
    pub fn set_stream(&mut self, stream: &str, state: StreamState) {
        if state.is_empty() {
            self.streams.remove(stream);
        } else {
            self.streams.insert(stream.to_string(), state);
        }
    }

    /// Check if no stream has state
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stream_state(value: serde_json::Value) -> StreamState {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_state_default() {
        let state = State::new();
        assert!(state.is_empty());
        assert!(state.get_stream("users").is_none());
    }

    #[test]
    fn test_set_stream() {
        let mut state = State::new();
        state.set_stream("users", stream_state(json!({"updated_at": "2024-01-01"})));
        assert_eq!(
            state.get_stream("users"),
            Some(&stream_state(json!({"updated_at": "2024-01-01"})))
        );

        state.set_stream("users", StreamState::new());
        assert!(state.get_stream("users").is_none());
    }

    #[test]
    fn test_state_serialization() {
        let mut state = State::new();
        state.set_stream(
            "issues",
            stream_state(json!({"states": [
                {"partition": {"repo": "a"}, "cursor": {"updated_at": "2024-02-01"}}
            ]})),
        );

        let json = serde_json::to_string(&state).unwrap();
        let restored: State = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_state_missing_streams_field() {
        let state: State = serde_json::from_str("{}").unwrap();
        assert!(state.is_empty());
    }
}
