//! Structured observability hooks for engine iteration lifecycle events.

use tracing::{info, warn};

/// RAII guard that enters an iteration-scoped tracing span.
pub struct IterationSpan {
    _span: tracing::span::EnteredSpan,
}

impl IterationSpan {
    /// Enter a span tagged with the agent id and iteration index.
    pub fn enter(agent_id: &str, iteration: u64) -> Self {
        let span = tracing::info_span!("autoforge.iteration", agent_id = %agent_id, iteration);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: iteration started with batch size and confidence.
pub fn emit_iteration_started(agent_id: &str, batch_size: usize, confidence: f64) {
    info!(
        event = "iteration.started",
        agent_id = %agent_id,
        batch_size,
        confidence,
    );
}

/// Emit event: candidate diff validated.
pub fn emit_diff_validated(agent_id: &str, ok: bool, reasons: &[String]) {
    info!(
        event = "iteration.diff_validated",
        agent_id = %agent_id,
        ok,
        reasons = ?reasons,
    );
}

/// Emit event: change committed to the workspace branch.
pub fn emit_change_committed(agent_id: &str, revision: &str, pushed: bool) {
    info!(
        event = "iteration.change_committed",
        agent_id = %agent_id,
        revision = %revision,
        pushed,
    );
}

/// Emit event: iteration finished with its success flag and new confidence.
pub fn emit_iteration_finished(agent_id: &str, success: bool, confidence: f64) {
    info!(
        event = "iteration.finished",
        agent_id = %agent_id,
        success,
        confidence,
    );
}

/// Emit event: a non-fatal collaborator failure was absorbed.
pub fn emit_collaborator_degraded(agent_id: &str, collaborator: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "iteration.collaborator_degraded",
        agent_id = %agent_id,
        collaborator = %collaborator,
        error = %error,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitters_do_not_panic_without_subscriber() {
        emit_iteration_started("agent-1", 3, 0.5);
        emit_diff_validated("agent-1", false, &["too_large_estimate".to_string()]);
        emit_change_committed("agent-1", &"a".repeat(40), true);
        emit_iteration_finished("agent-1", true, 0.55);
        emit_collaborator_degraded("agent-1", "memory", &"timeout");
        let _span = IterationSpan::enter("agent-1", 7);
    }
}
