//! Canonical record types shared between the engine and store backends.
//!
//! These are plain serde-derived projections: the engine owns the richer
//! domain types (parsed diffs, validation results) and flattens them into
//! these records at the persistence boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// SHA-256 content digest, stored as lowercase hex.
///
/// The inner string is private so that every value was either computed by
/// [`ContentDigest::of`] or validated through `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Digest the given bytes.
    pub fn of(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = sha2::Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Full 64-char hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = crate::error::StateError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(crate::error::StateError::Serialization(format!(
                "invalid content digest: {s}"
            )));
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Agent state
// ---------------------------------------------------------------------------

/// Mutable per-agent control state consumed and produced by the engine.
///
/// `confidence` is always within `[0, 1]`; the engine clamps after every
/// update and backends must persist it as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    /// Stable agent identifier.
    pub id: String,

    /// Branch the agent commits to.
    pub branch_name: String,

    /// Bounded success scalar in `[0, 1]` driving batch sizing.
    pub confidence: f64,

    /// Iterations executed so far.
    pub iterations: u64,

    /// Total tasks in the agent's backlog.
    pub total_tasks: usize,

    /// Tasks marked done.
    pub done_tasks: usize,

    /// Explicit completion flag; terminal once set.
    pub completed: bool,
}

impl AgentState {
    /// Fresh agent with a half-open confidence prior.
    pub fn new(id: impl Into<String>, branch_name: impl Into<String>, total_tasks: usize) -> Self {
        Self {
            id: id.into(),
            branch_name: branch_name.into(),
            confidence: 0.5,
            iterations: 0,
            total_tasks,
            done_tasks: 0,
            completed: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Lifecycle status of a backlog task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

/// A unit of generated work targeting specific repository paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub agent_id: String,
    pub status: TaskStatus,

    /// Estimated riskiness in `[0, 1]`; batches are selected lowest-risk
    /// first.
    pub risk_score: f64,

    /// Repository paths the task is expected to touch.
    pub target_paths: Vec<String>,

    /// Short task description handed to the generative provider.
    pub summary: String,
}

impl TaskRecord {
    pub fn pending(
        id: impl Into<String>,
        agent_id: impl Into<String>,
        risk_score: f64,
        target_paths: Vec<String>,
    ) -> Self {
        let id = id.into();
        Self {
            summary: format!("task {id}"),
            id,
            agent_id: agent_id.into(),
            status: TaskStatus::Pending,
            risk_score,
            target_paths,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

// ---------------------------------------------------------------------------
// Iteration outcomes
// ---------------------------------------------------------------------------

/// Immutable append-only record of one engine iteration.
///
/// Validation detail is flattened: `ok` plus stable snake_case reason
/// codes, so backends never depend on engine types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationOutcome {
    pub agent_id: String,

    /// Iteration index at the time the outcome was recorded.
    pub iteration: u64,

    /// Tasks attempted in this iteration's batch.
    pub task_ids: Vec<String>,

    /// Digest of the final diff text (after refinement/truncation).
    pub diff_digest: ContentDigest,

    /// Final diff text, kept for audit and replay.
    pub diff_text: String,

    /// Whether the final diff passed validation.
    pub validation_ok: bool,

    /// Stable failure reason codes, empty when `validation_ok`.
    pub failure_reasons: Vec<String>,

    /// Whether the change was applied and committed.
    pub applied: bool,

    /// Revision id of the resulting commit, when one was created.
    pub revision_id: Option<String>,

    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Leases
// ---------------------------------------------------------------------------

/// Opaque token proving ownership of a per-agent iteration lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseToken(pub String);

impl LeaseToken {
    pub fn new() -> Self {
        LeaseToken(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for LeaseToken {
    fn default() -> Self {
        Self::new()
    }
}
