//! Collaborator traits for the external capabilities the engine consumes.
//!
//! Every seam is an `async_trait` trait resolved once at engine
//! construction; there is no runtime-keyed dispatch. In-memory fakes for
//! tests live with the integration suites.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use autoforge_state::TaskRecord;

use crate::context::RepoFile;
use crate::domain::Result;
use crate::validate::ReasonCode;

// ---------------------------------------------------------------------------
// Generative provider
// ---------------------------------------------------------------------------

/// Steering context handed to the provider alongside the batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guidance {
    /// Iteration index for the agent.
    pub iteration: u64,
    /// Current confidence, so the provider can calibrate ambition.
    pub confidence: f64,
    /// Strategic hints recalled from memory.
    pub hints: Vec<String>,
}

/// A patch generation request: the task batch plus trimmed repository
/// context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchRequest {
    pub tasks: Vec<TaskRecord>,
    pub files: Vec<RepoFile>,
    pub guidance: Guidance,
}

/// Provider response. `no_changes` signals the provider judged the batch
/// already satisfied; an accompanying diff (if any) is not counted as
/// progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchResponse {
    pub diff: String,
    pub no_changes: bool,
}

/// The external text-generation collaborator.
#[async_trait]
pub trait PatchProvider: Send + Sync {
    /// Generate a candidate unified diff for a task batch.
    async fn generate_patch(&self, request: &PatchRequest) -> Result<PatchResponse>;

    /// Repair a diff that failed validation. Returns `None` when the
    /// provider has nothing usable to offer.
    async fn repair_diff(&self, diff: &str, reasons: &[ReasonCode]) -> Result<Option<String>>;
}

/// The narrower "repair this diff" capability consumed by the refinement
/// loop. Blanket-implemented for every provider.
#[async_trait]
pub trait DiffRepair: Send + Sync {
    async fn repair(&self, diff: &str, reasons: &[ReasonCode]) -> Result<Option<String>>;
}

#[async_trait]
impl<P> DiffRepair for P
where
    P: PatchProvider + ?Sized,
{
    async fn repair(&self, diff: &str, reasons: &[ReasonCode]) -> Result<Option<String>> {
        self.repair_diff(diff, reasons).await
    }
}

// ---------------------------------------------------------------------------
// Memory subsystem
// ---------------------------------------------------------------------------

/// Salience-ranked memory bundle recalled for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MemoryBundle {
    /// High-level strategy notes (what worked, what to avoid).
    pub strategic: Vec<String>,
    /// Technical facts about the codebase.
    pub technical: Vec<String>,
}

/// External memory subsystem: recall, periodic compression, and decay.
#[async_trait]
pub trait MemoryBank: Send + Sync {
    async fn recall(&self, agent_id: &str) -> Result<MemoryBundle>;

    /// Compress accumulated memories; triggered every N iterations.
    async fn compress(&self, agent_id: &str) -> Result<()>;

    /// Age stored memories; triggered every iteration.
    async fn decay(&self, agent_id: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Repository context source
// ---------------------------------------------------------------------------

/// Supplies candidate repository files for context assembly. The engine
/// ranks and trims them to the configured budget.
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn candidate_files(
        &self,
        agent_id: &str,
        target_paths: &[String],
    ) -> Result<Vec<RepoFile>>;
}

// ---------------------------------------------------------------------------
// Change-request service
// ---------------------------------------------------------------------------

/// Opens or reuses a pull/change request for an agent branch.
#[async_trait]
pub trait ChangeRequestService: Send + Sync {
    /// Returns an identifier for the ensured change request.
    async fn ensure_change_request(&self, agent_id: &str, branch: &str) -> Result<String>;
}
