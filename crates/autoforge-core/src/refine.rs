//! Bounded patch-refinement retry loop.
//!
//! Combines the parser and validator with an external "repair this diff"
//! capability. Terminal states: validation passes, the repairer returns
//! nothing usable, or the round budget is exhausted. Repairer errors
//! degrade to the failed terminal state instead of propagating.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::diff;
use crate::traits::DiffRepair;
use crate::validate::{self, FileChangeAggregate, ReasonCode, ValidationLimits};

/// Default round budget; each round is one external round-trip.
pub const DEFAULT_MAX_ROUNDS: u32 = 3;

/// Terminal result of a refinement run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementResult {
    /// Whether the final diff passed validation.
    pub ok: bool,
    /// Rounds consumed (1-based; a first-round pass is `1`).
    pub rounds: u32,
    /// Failure reasons from the last validation, empty on success.
    pub reasons: Vec<ReasonCode>,
    /// The diff as originally submitted.
    pub original_diff: String,
    /// Best-effort final diff, retained even on failure.
    pub final_diff: String,
    /// Stats from the last validation pass.
    pub stats: FileChangeAggregate,
}

/// Pull a diff-shaped payload out of a possibly prose-wrapped response.
///
/// Scans for the first `diff --git` section marker and slices from
/// there, then for a `--- ` file marker, and otherwise returns the whole
/// response trimmed.
pub fn extract_diff_payload(response: &str) -> String {
    if let Some(idx) = response.find("diff --git ") {
        return response[idx..].to_string();
    }
    if response.starts_with("--- ") {
        return response.to_string();
    }
    if let Some(idx) = response.find("\n--- ") {
        return response[idx + 1..].to_string();
    }
    response.trim().to_string()
}

/// Run the bounded refinement loop.
///
/// Each of up to `max_rounds` rounds parses and validates the current
/// text; on failure the repairer is consulted with the reason codes and
/// its response (diff-extracted) becomes the next candidate.
pub async fn refine<R>(
    raw_diff: &str,
    repairer: &R,
    max_rounds: u32,
    limits: &ValidationLimits,
) -> RefinementResult
where
    R: DiffRepair + ?Sized,
{
    let mut current = raw_diff.to_string();
    let mut last_reasons: Vec<ReasonCode> = Vec::new();
    let mut last_stats = FileChangeAggregate::default();
    let mut rounds = 0;

    for round in 1..=max_rounds {
        rounds = round;

        let parsed = diff::parse(&current);
        let result = validate::validate(&parsed, limits);
        last_stats = result.stats.clone();

        if result.ok {
            debug!(round, "diff passed validation");
            return RefinementResult {
                ok: true,
                rounds,
                reasons: Vec::new(),
                original_diff: raw_diff.to_string(),
                final_diff: current,
                stats: last_stats,
            };
        }

        last_reasons = result.reasons.clone();
        debug!(round, reasons = ?last_reasons, "diff failed validation, requesting repair");

        let repaired = match repairer.repair(&current, &last_reasons).await {
            Ok(candidate) => candidate,
            Err(err) => {
                // Repairer failures end the loop; the scheduler retries
                // the whole iteration later.
                warn!(round, error = %err, "repairer failed, abandoning refinement");
                None
            }
        };

        match repaired {
            Some(candidate) if !candidate.trim().is_empty() => {
                current = extract_diff_payload(&candidate);
            }
            _ => {
                return RefinementResult {
                    ok: false,
                    rounds,
                    reasons: last_reasons,
                    original_diff: raw_diff.to_string(),
                    final_diff: current,
                    stats: last_stats,
                };
            }
        }
    }

    RefinementResult {
        ok: false,
        rounds,
        reasons: last_reasons,
        original_diff: raw_diff.to_string(),
        final_diff: current,
        stats: last_stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Repairer that always returns the same canned response.
    struct FixedRepairer {
        response: Option<String>,
        calls: AtomicU32,
    }

    impl FixedRepairer {
        fn new(response: Option<&str>) -> Self {
            Self {
                response: response.map(|s| s.to_string()),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DiffRepair for FixedRepairer {
        async fn repair(&self, _diff: &str, _reasons: &[ReasonCode]) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn valid_diff() -> String {
        "diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n@@ -1,1 +1,1 @@\n-x\n+y\n".to_string()
    }

    fn invalid_diff() -> String {
        // 60 deletions vs 5 additions trips the deletion-ratio gate.
        let mut out = String::from("diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n");
        out.push_str("@@ -1,60 +1,5 @@\n");
        for i in 0..60 {
            out.push_str(&format!("-line {i}\n"));
        }
        for i in 0..5 {
            out.push_str(&format!("+line {i}\n"));
        }
        out
    }

    #[tokio::test]
    async fn test_valid_diff_succeeds_first_round() {
        let repairer = FixedRepairer::new(None);
        let result = refine(
            &valid_diff(),
            &repairer,
            DEFAULT_MAX_ROUNDS,
            &ValidationLimits::default(),
        )
        .await;

        assert!(result.ok);
        assert_eq!(result.rounds, 1);
        assert_eq!(repairer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unrepairable_diff_exhausts_exact_round_budget() {
        // Repairer always returns the same invalid diff.
        let bad = invalid_diff();
        let repairer = FixedRepairer::new(Some(bad.as_str()));
        let result = refine(&bad, &repairer, 3, &ValidationLimits::default()).await;

        assert!(!result.ok);
        assert_eq!(result.rounds, 3);
        assert_eq!(repairer.calls.load(Ordering::SeqCst), 3);
        assert!(result.reasons.contains(&ReasonCode::DeletionRatioSuspicious));
        assert_eq!(result.final_diff, bad);
    }

    #[tokio::test]
    async fn test_empty_repair_response_stops_early() {
        let repairer = FixedRepairer::new(Some("   "));
        let result = refine(&invalid_diff(), &repairer, 3, &ValidationLimits::default()).await;

        assert!(!result.ok);
        assert_eq!(result.rounds, 1);
        assert_eq!(repairer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_prose_wrapped_repair_is_accepted() {
        let wrapped = format!("Here is the corrected patch:\n\n{}", valid_diff());
        let repairer = FixedRepairer::new(Some(wrapped.as_str()));
        let result = refine(&invalid_diff(), &repairer, 3, &ValidationLimits::default()).await;

        assert!(result.ok);
        assert_eq!(result.rounds, 2);
        assert!(result.final_diff.starts_with("diff --git "));
        assert_eq!(result.original_diff, invalid_diff());
    }

    #[tokio::test]
    async fn test_repairer_error_degrades_to_failure() {
        struct FailingRepairer;

        #[async_trait]
        impl DiffRepair for FailingRepairer {
            async fn repair(
                &self,
                _diff: &str,
                _reasons: &[ReasonCode],
            ) -> Result<Option<String>> {
                Err(crate::domain::EngineError::Provider(
                    "model unavailable".to_string(),
                ))
            }
        }

        let result = refine(
            &invalid_diff(),
            &FailingRepairer,
            3,
            &ValidationLimits::default(),
        )
        .await;
        assert!(!result.ok);
        assert_eq!(result.rounds, 1);
    }

    #[test]
    fn test_extract_diff_payload_variants() {
        let diff = valid_diff();
        assert_eq!(extract_diff_payload(&diff), diff);

        let wrapped = format!("Sure! Apply this:\n{diff}");
        assert_eq!(extract_diff_payload(&wrapped), diff);

        let bare = "--- a/x\n+++ b/x\n@@ -1,1 +1,1 @@\n-a\n+b\n";
        assert_eq!(extract_diff_payload(bare), bare);

        assert_eq!(extract_diff_payload("  nothing here  "), "nothing here");
    }
}
