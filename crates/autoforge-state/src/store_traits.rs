//! Storage trait definitions for autoforge.
//!
//! `AgentStore` is the seam the external persistence layer implements:
//! agent control state, task backlog, append-only iteration outcomes, and
//! the per-agent iteration lease that guards against overlapping
//! scheduler ticks. All methods are async and backend-agnostic; an
//! in-memory fake is provided for tests via the `fakes` module.
//!
//! Consistency is last-writer-wins per update call. The engine performs
//! no optimistic concurrency of its own beyond the lease.

use async_trait::async_trait;

use crate::error::StateResult;
use crate::records::{AgentState, IterationOutcome, LeaseToken, TaskRecord, TaskStatus};

/// Agent/task store.
///
/// Guarantees backends must uphold:
/// - `append_outcome` is append-only; recorded outcomes are immutable.
/// - `try_acquire_lease` returns `StateError::LeaseHeld` while another
///   holder exists; `release_lease` with a mismatched token returns
///   `StateError::StaleLease` and leaves the lease in place.
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Load an agent's control state.
    async fn load_agent(&self, agent_id: &str) -> StateResult<AgentState>;

    /// Persist an agent's control state (last-writer-wins).
    async fn save_agent(&self, agent: &AgentState) -> StateResult<()>;

    /// Load the full task backlog for an agent.
    async fn load_tasks(&self, agent_id: &str) -> StateResult<Vec<TaskRecord>>;

    /// Update one task's lifecycle status.
    async fn update_task_status(&self, task_id: &str, status: TaskStatus) -> StateResult<()>;

    /// Append an immutable iteration outcome.
    async fn append_outcome(&self, outcome: IterationOutcome) -> StateResult<()>;

    /// All recorded outcomes for an agent, oldest first.
    async fn outcomes(&self, agent_id: &str) -> StateResult<Vec<IterationOutcome>>;

    /// Acquire the per-agent iteration lease.
    async fn try_acquire_lease(&self, agent_id: &str) -> StateResult<LeaseToken>;

    /// Release a held lease. No-op if no lease exists for the agent.
    async fn release_lease(&self, agent_id: &str, token: &LeaseToken) -> StateResult<()>;
}
