//! Engine-level error taxonomy.

use autoforge_state::StateError;

/// Errors surfaced by the patch execution engine.
///
/// Validation failures are never errors (they are reason codes); these
/// cover collaborator and environment failures only.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("git operation failed: {0}")]
    Git(String),

    #[error("generative provider failed: {0}")]
    Provider(String),

    #[error("memory subsystem failed: {0}")]
    Memory(String),

    #[error("change-request service failed: {0}")]
    ChangeRequest(String),

    #[error("iteration lease already held for agent: {agent_id}")]
    LeaseHeld { agent_id: String },

    #[error("state store failed: {0}")]
    State(#[from] StateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
