//! Error types for the autoforge state layer.

use thiserror::Error;

/// Errors produced by agent/task store backends.
#[derive(Error, Debug)]
pub enum StateError {
    /// Agent record does not exist
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// Task record does not exist
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// Another iteration already holds the per-agent lease
    #[error("iteration lease already held for agent: {agent_id}")]
    LeaseHeld { agent_id: String },

    /// A lease release was attempted with a token that does not match
    #[error("stale lease token for agent: {agent_id}")]
    StaleLease { agent_id: String },

    /// Serialization failure while persisting a record
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Backend-specific failure (connection, query, etc.)
    #[error("storage backend failed: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

/// Result type for state operations
pub type StateResult<T> = std::result::Result<T, StateError>;
