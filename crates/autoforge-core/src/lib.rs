//! Autoforge Core Library
//!
//! Patch execution engine for the autonomous code-change agent: parses
//! generated unified diffs, validates them with heuristic gates, refines
//! failures through a bounded repair loop, applies accepted changes in
//! an ephemeral git checkout, and adapts batch sizing to historical
//! success.

pub mod apply;
pub mod context;
pub mod controller;
pub mod diff;
pub mod domain;
pub mod obs;
pub mod orchestrator;
pub mod refine;
pub mod telemetry;
pub mod traits;
pub mod validate;
pub mod workspace;

pub use apply::{apply_hunks, synthesize_new_file, PatchApplyError};
pub use context::{rank_files, trim_to_budget, RepoFile, TrimmedContext};
pub use controller::{decide_batch_size, is_terminal, update_confidence, ControllerConfig};
pub use diff::{parse, Hunk, ParsedDiff, ParsedFileDiff};
pub use domain::{EngineError, Result};
pub use orchestrator::{EngineConfig, IterationEngine};
pub use refine::{extract_diff_payload, refine, RefinementResult, DEFAULT_MAX_ROUNDS};
pub use traits::{
    ChangeRequestService, ContextSource, DiffRepair, Guidance, MemoryBank, MemoryBundle,
    PatchProvider, PatchRequest, PatchResponse,
};
pub use validate::{
    summarize, validate, FileChangeAggregate, ReasonCode, ValidationLimits, ValidationResult,
};
pub use workspace::{ApplyReport, CommitOutcome, Workspace, WorkspaceConfig, WorkspaceState};

pub use autoforge_state::{
    AgentState, AgentStore, ContentDigest, IterationOutcome, LeaseToken, MemoryAgentStore,
    TaskRecord, TaskStatus,
};

pub use telemetry::init_tracing;

/// Autoforge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
