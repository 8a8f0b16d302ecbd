//! Per-agent iteration state machine.
//!
//! `IterationEngine` composes the parser, validator, refinement loop,
//! workspace manager, and adaptive controller with the external
//! collaborators (store, provider, memory, context source, change-request
//! service). One call to `run_iteration` executes one scheduler tick for
//! one agent; retry beyond the refinement loop is temporal, owned by the
//! external scheduler.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use autoforge_state::{
    AgentStore, ContentDigest, IterationOutcome, StateError, TaskRecord, TaskStatus,
};

use crate::context;
use crate::controller::{self, ControllerConfig};
use crate::diff;
use crate::domain::{EngineError, Result};
use crate::obs;
use crate::refine;
use crate::traits::{
    ChangeRequestService, ContextSource, Guidance, MemoryBank, MemoryBundle, PatchProvider,
    PatchRequest,
};
use crate::validate::{self, ValidationLimits};
use crate::workspace::{CommitOutcome, Workspace, WorkspaceConfig, WorkspaceState};

/// Engine-wide configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Remote repository location agents commit against.
    pub repo_remote: String,

    /// Short-lived credential spliced into https remotes at clone time.
    pub credentials: Option<String>,

    pub limits: ValidationLimits,
    pub controller: ControllerConfig,
    pub workspace: WorkspaceConfig,

    /// Round budget for the refinement loop.
    pub max_refine_rounds: u32,

    /// Character budget for repository context handed to the provider.
    pub context_char_budget: usize,

    /// Memory compression cadence in iterations.
    pub compress_every: u64,

    /// Cap on strategic hints forwarded in guidance.
    pub max_hints: usize,
}

impl EngineConfig {
    pub fn for_remote(repo_remote: impl Into<String>) -> Self {
        Self {
            repo_remote: repo_remote.into(),
            credentials: None,
            limits: ValidationLimits::default(),
            controller: ControllerConfig::default(),
            workspace: WorkspaceConfig::default(),
            max_refine_rounds: refine::DEFAULT_MAX_ROUNDS,
            context_char_budget: 24_000,
            compress_every: 5,
            max_hints: 5,
        }
    }
}

/// Top-level engine: one instance serves many agents.
pub struct IterationEngine {
    store: Arc<dyn AgentStore>,
    provider: Arc<dyn PatchProvider>,
    memory: Arc<dyn MemoryBank>,
    context_source: Arc<dyn ContextSource>,
    change_requests: Arc<dyn ChangeRequestService>,
    config: EngineConfig,
}

impl IterationEngine {
    pub fn new(
        store: Arc<dyn AgentStore>,
        provider: Arc<dyn PatchProvider>,
        memory: Arc<dyn MemoryBank>,
        context_source: Arc<dyn ContextSource>,
        change_requests: Arc<dyn ChangeRequestService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            provider,
            memory,
            context_source,
            change_requests,
            config,
        }
    }

    /// Run one iteration for the agent.
    ///
    /// Returns `Ok(None)` when the agent is terminal or has no pending
    /// work; `Err(EngineError::LeaseHeld)` when another iteration holds
    /// the agent's lease. The lease is released on every exit path.
    pub async fn run_iteration(&self, agent_id: &str) -> Result<Option<IterationOutcome>> {
        let lease = match self.store.try_acquire_lease(agent_id).await {
            Ok(token) => token,
            Err(StateError::LeaseHeld { agent_id }) => {
                info!(agent_id = %agent_id, "iteration lease held, skipping tick");
                return Err(EngineError::LeaseHeld { agent_id });
            }
            Err(err) => return Err(err.into()),
        };

        let result = self.run_leased(agent_id).await;

        if let Err(err) = self.store.release_lease(agent_id, &lease).await {
            obs::emit_collaborator_degraded(agent_id, "store.release_lease", &err);
        }
        result
    }

    async fn run_leased(&self, agent_id: &str) -> Result<Option<IterationOutcome>> {
        let mut agent = self.store.load_agent(agent_id).await?;
        let _span = obs::IterationSpan::enter(agent_id, agent.iterations);

        if controller::is_terminal(&agent, &self.config.controller) {
            if !agent.completed {
                agent.completed = true;
                self.store.save_agent(&agent).await?;
            }
            debug!(agent_id = %agent_id, "agent is terminal");
            return Ok(None);
        }

        let batch = self.select_batch(agent_id, agent.confidence).await?;
        if batch.is_empty() {
            debug!(agent_id = %agent_id, "no pending tasks");
            return Ok(None);
        }
        obs::emit_iteration_started(agent_id, batch.len(), agent.confidence);

        let request = self.assemble_request(agent_id, &agent, &batch).await;

        let response = match self.provider.generate_patch(&request).await {
            Ok(response) => response,
            Err(err) => {
                // Provider failure: penalize, leave the batch pending,
                // and let the next scheduled tick retry.
                agent.confidence =
                    controller::update_confidence(agent.confidence, false, &self.config.controller);
                agent.iterations += 1;
                if let Err(save_err) = self.store.save_agent(&agent).await {
                    obs::emit_collaborator_degraded(agent_id, "store.save_agent", &save_err);
                }
                return Err(err);
            }
        };

        let no_changes = response.no_changes;
        let mut diff_text = response.diff;
        if diff_text.len() > self.config.limits.max_diff_bytes {
            // Lossy safety valve; a truncated diff is expected to fail
            // validation downstream.
            warn!(
                agent_id = %agent_id,
                bytes = diff_text.len(),
                budget = self.config.limits.max_diff_bytes,
                "diff exceeds byte budget, truncating"
            );
            diff_text =
                context::truncate_on_char_boundary(&diff_text, self.config.limits.max_diff_bytes);
        }

        if !diff_text.trim().is_empty() {
            let refined = refine::refine(
                &diff_text,
                self.provider.as_ref(),
                self.config.max_refine_rounds,
                &self.config.limits,
            )
            .await;
            diff_text = refined.final_diff;
        }

        let parsed = diff::parse(&diff_text);
        let validation = validate::validate(&parsed, &self.config.limits);
        obs::emit_diff_validated(agent_id, validation.ok, &validation.reason_strings());

        let mut applied = false;
        let mut revision_id: Option<String> = None;

        if validation.ok && !parsed.is_empty() {
            if let Some(revision) = self
                .apply_and_commit(agent_id, &agent.branch_name, &parsed, &batch)
                .await
            {
                applied = true;
                revision_id = Some(revision);
            }
        }

        let outcome = IterationOutcome {
            agent_id: agent_id.to_string(),
            iteration: agent.iterations,
            task_ids: batch.iter().map(|t| t.id.clone()).collect(),
            diff_digest: ContentDigest::of(diff_text.as_bytes()),
            diff_text,
            validation_ok: validation.ok,
            failure_reasons: validation.reason_strings(),
            applied,
            revision_id: revision_id.clone(),
            recorded_at: Utc::now(),
        };
        self.store.append_outcome(outcome.clone()).await?;

        let success = applied && !no_changes;
        agent.confidence =
            controller::update_confidence(agent.confidence, success, &self.config.controller);
        agent.iterations += 1;

        if success {
            for task in &batch {
                if let Err(err) = self.store.update_task_status(&task.id, TaskStatus::Done).await {
                    obs::emit_collaborator_degraded(agent_id, "store.update_task_status", &err);
                }
            }
            agent.done_tasks = (agent.done_tasks + batch.len()).min(agent.total_tasks);
        }
        self.store.save_agent(&agent).await?;
        obs::emit_iteration_finished(agent_id, success, agent.confidence);

        self.maintain_memory(agent_id, agent.iterations).await;

        Ok(Some(outcome))
    }

    /// Select the next batch: pending tasks, lowest risk first.
    async fn select_batch(&self, agent_id: &str, confidence: f64) -> Result<Vec<TaskRecord>> {
        let tasks = self.store.load_tasks(agent_id).await?;
        let mut pending: Vec<TaskRecord> =
            tasks.into_iter().filter(TaskRecord::is_pending).collect();
        pending.sort_by(|a, b| {
            a.risk_score
                .partial_cmp(&b.risk_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let size = controller::decide_batch_size(
            confidence,
            pending.len(),
            self.config.controller.min_batch,
            self.config.controller.max_batch,
        );
        pending.truncate(size);
        Ok(pending)
    }

    /// Recall memory, gather candidate files, and trim to budget. Both
    /// collaborators degrade to empty context on failure.
    async fn assemble_request(
        &self,
        agent_id: &str,
        agent: &autoforge_state::AgentState,
        batch: &[TaskRecord],
    ) -> PatchRequest {
        let bundle = match self.memory.recall(agent_id).await {
            Ok(bundle) => bundle,
            Err(err) => {
                obs::emit_collaborator_degraded(agent_id, "memory.recall", &err);
                MemoryBundle::default()
            }
        };

        let target_paths: Vec<String> = batch
            .iter()
            .flat_map(|t| t.target_paths.iter().cloned())
            .collect();

        let candidates = match self
            .context_source
            .candidate_files(agent_id, &target_paths)
            .await
        {
            Ok(files) => files,
            Err(err) => {
                obs::emit_collaborator_degraded(agent_id, "context.candidate_files", &err);
                Vec::new()
            }
        };
        let trimmed =
            context::trim_to_budget(candidates, &target_paths, self.config.context_char_budget);

        PatchRequest {
            tasks: batch.to_vec(),
            files: trimmed.files,
            guidance: Guidance {
                iteration: agent.iterations,
                confidence: agent.confidence,
                hints: bundle
                    .strategic
                    .into_iter()
                    .take(self.config.max_hints)
                    .collect(),
            },
        }
    }

    /// Acquire a workspace, apply the diff, and commit+push. Returns the
    /// revision id on full success; every failure path logs and returns
    /// `None` without raising.
    async fn apply_and_commit(
        &self,
        agent_id: &str,
        branch: &str,
        parsed: &diff::ParsedDiff,
        batch: &[TaskRecord],
    ) -> Option<String> {
        let workspace_config = self.config.workspace.clone();
        let remote = self.config.repo_remote.clone();
        let credentials = self.config.credentials.clone();
        let branch_owned = branch.to_string();
        let parsed = parsed.clone();
        let message = commit_message(batch);
        let agent = agent_id.to_string();

        // Subprocess and filesystem work stays off the async runtime.
        let joined = tokio::task::spawn_blocking(move || {
            let mut ws = match Workspace::acquire(
                &workspace_config,
                &remote,
                &branch_owned,
                credentials.as_deref(),
            ) {
                Ok(ws) => ws,
                Err(err) => {
                    obs::emit_collaborator_degraded(&agent, "workspace.acquire", &err);
                    return None;
                }
            };
            let revision = apply_in_workspace(&agent, &mut ws, &parsed, &message);
            Some((ws, revision))
        })
        .await;

        let (ws, revision) = match joined {
            Ok(Some(pair)) => pair,
            Ok(None) => return None,
            Err(err) => {
                obs::emit_collaborator_degraded(agent_id, "workspace.task", &err);
                return None;
            }
        };

        // Best-effort PR-ensurance once a revision is pushed.
        if revision.is_some() && ws.state() == WorkspaceState::Pushed {
            if let Err(err) = self
                .change_requests
                .ensure_change_request(agent_id, ws.branch())
                .await
            {
                obs::emit_collaborator_degraded(agent_id, "change_requests.ensure", &err);
            }
        }

        if let Err(err) = ws.dispose() {
            obs::emit_collaborator_degraded(agent_id, "workspace.dispose", &err);
        }
        revision
    }

    /// Periodic compression plus per-iteration decay; failures are
    /// absorbed.
    async fn maintain_memory(&self, agent_id: &str, iterations: u64) {
        if self.config.compress_every > 0 && iterations % self.config.compress_every == 0 {
            if let Err(err) = self.memory.compress(agent_id).await {
                obs::emit_collaborator_degraded(agent_id, "memory.compress", &err);
            }
        }
        if let Err(err) = self.memory.decay(agent_id).await {
            obs::emit_collaborator_degraded(agent_id, "memory.decay", &err);
        }
    }
}

/// Apply the diff, stage, commit, and push inside a held workspace.
/// Returns the revision id only when every step succeeded.
fn apply_in_workspace(
    agent_id: &str,
    ws: &mut Workspace,
    parsed: &diff::ParsedDiff,
    message: &str,
) -> Option<String> {
    let report = ws.apply_change(parsed);
    if !report.all_applied() {
        warn!(
            agent_id = %agent_id,
            failed = ?report.failed_paths,
            "apply reported per-file failures, aborting commit"
        );
        return None;
    }

    if let Err(err) = ws.stage() {
        obs::emit_collaborator_degraded(agent_id, "workspace.stage", &err);
        return None;
    }

    match ws.commit(message) {
        CommitOutcome::Committed { revision } => {
            let pushed = ws.push();
            obs::emit_change_committed(agent_id, &revision, pushed);
            Some(revision)
        }
        outcome => {
            info!(agent_id = %agent_id, ?outcome, "commit produced no revision");
            None
        }
    }
}

/// Commit message summarizing the batch.
fn commit_message(batch: &[TaskRecord]) -> String {
    let mut message = format!(
        "autoforge: apply {} task{}",
        batch.len(),
        if batch.len() == 1 { "" } else { "s" }
    );
    for task in batch {
        message.push_str(&format!("\n- {} ({})", task.summary, task.id));
    }
    message
}
