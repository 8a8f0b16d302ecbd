//! Adaptive batch-size and confidence control.
//!
//! Pure, stateless decision functions: historical success widens the
//! batch, failure narrows it, and hard floors/ceilings keep risk bounded
//! while guaranteeing forward progress.

use serde::{Deserialize, Serialize};

use autoforge_state::AgentState;

/// Controller tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub min_batch: usize,
    pub max_batch: usize,

    /// Additive confidence gain after a successful iteration.
    pub success_step: f64,

    /// Additive confidence loss after a failed iteration.
    pub failure_step: f64,

    /// Confidence at or above which a fully-done backlog terminates the
    /// agent.
    pub termination_threshold: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            min_batch: 1,
            max_batch: 5,
            success_step: 0.05,
            failure_step: 0.10,
            termination_threshold: 0.9,
        }
    }
}

/// Decide how many tasks the next iteration attempts.
///
/// `base = min(pending, max_batch)`, scaled by `0.5 + confidence` and
/// clamped back into `[min_batch, base]`. The result never exceeds the
/// pending count; with nothing pending it is zero.
pub fn decide_batch_size(
    confidence: f64,
    pending: usize,
    min_batch: usize,
    max_batch: usize,
) -> usize {
    if pending == 0 {
        return 0;
    }

    let base = pending.min(max_batch);
    let scaled = (base as f64 * (0.5 + confidence)).round() as usize;

    let floor = min_batch.min(pending);
    let ceiling = base.max(floor);
    scaled.clamp(floor, ceiling)
}

/// Additive confidence update, clamped to `[0, 1]`.
pub fn update_confidence(previous: f64, success: bool, config: &ControllerConfig) -> f64 {
    let next = if success {
        previous + config.success_step
    } else {
        previous - config.failure_step
    };
    next.clamp(0.0, 1.0)
}

/// Whether the agent has reached a terminal state.
///
/// The `total_tasks > 0` guard prevents false-positive termination on an
/// empty backlog.
pub fn is_terminal(agent: &AgentState, config: &ControllerConfig) -> bool {
    if agent.completed {
        return true;
    }
    agent.confidence >= config.termination_threshold
        && agent.done_tasks == agent.total_tasks
        && agent.total_tasks > 0
}
