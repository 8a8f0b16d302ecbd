//! Heuristic validation gates over a parsed diff.
//!
//! Pure and deterministic: gates inspect the parsed model and contribute
//! stable reason codes, never errors. A diff passes iff no gate fires.

use serde::{Deserialize, Serialize};

use crate::diff::ParsedDiff;

/// Thresholds for the validation gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationLimits {
    /// Byte budget for a candidate diff; the line-count gate fires at a
    /// quarter of this value.
    pub max_diff_bytes: usize,

    /// A file whose `added + deleted` exceeds this is an oversized touch.
    pub large_file_lines: u64,

    /// Cap on created + deleted files per diff.
    pub max_file_creations_or_deletions: usize,

    /// Cap on the number of oversized file touches per diff.
    pub max_large_file_touches: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_diff_bytes: 60_000,
            large_file_lines: 400,
            max_file_creations_or_deletions: 20,
            max_large_file_touches: 5,
        }
    }
}

/// Stable failure reason codes emitted by the gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    TooLargeEstimate,
    DeletionRatioSuspicious,
    TooManyFileCreationsOrDeletions,
    TooManyLargeFileTouches,
    HunkExtentMismatch,
}

impl ReasonCode {
    /// Snake_case wire form, stable across releases.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TooLargeEstimate => "too_large_estimate",
            Self::DeletionRatioSuspicious => "deletion_ratio_suspicious",
            Self::TooManyFileCreationsOrDeletions => "too_many_file_creations_or_deletions",
            Self::TooManyLargeFileTouches => "too_many_large_file_touches",
            Self::HunkExtentMismatch => "hunk_extent_mismatch",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-file statistics aggregated over a parsed diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FileChangeAggregate {
    pub added_lines: u64,
    pub deleted_lines: u64,
    pub files_created: usize,
    pub files_deleted: usize,
    pub files_renamed: usize,
    pub files_modified: usize,
    /// Paths whose combined churn exceeds the large-file threshold.
    pub oversized_paths: Vec<String>,
}

impl FileChangeAggregate {
    pub fn total_changed(&self) -> u64 {
        self.added_lines + self.deleted_lines
    }
}

/// Result of running the validation gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    /// Gate order is fixed, so reason order is deterministic.
    pub reasons: Vec<ReasonCode>,
    pub stats: FileChangeAggregate,
}

impl ValidationResult {
    /// Reason codes as stable strings for persistence.
    pub fn reason_strings(&self) -> Vec<String> {
        self.reasons.iter().map(|r| r.to_string()).collect()
    }
}

/// Single-pass aggregation of per-file change statistics.
pub fn summarize(diff: &ParsedDiff, limits: &ValidationLimits) -> FileChangeAggregate {
    let mut agg = FileChangeAggregate::default();

    for file in &diff.files {
        agg.added_lines += file.added;
        agg.deleted_lines += file.deleted;

        if file.is_new {
            agg.files_created += 1;
        } else if file.is_deleted {
            agg.files_deleted += 1;
        } else if file.is_rename {
            agg.files_renamed += 1;
        } else {
            agg.files_modified += 1;
        }

        if file.churn() > limits.large_file_lines {
            if let Some(path) = file.path() {
                agg.oversized_paths.push(path.to_string());
            }
        }
    }

    agg
}

/// Run the heuristic gates. Independent and order-insensitive; each
/// contributes its reason code at most once.
pub fn validate(diff: &ParsedDiff, limits: &ValidationLimits) -> ValidationResult {
    let stats = summarize(diff, limits);
    let mut reasons = Vec::new();

    let total_changed = stats.total_changed();

    // Gate 1: changed-line estimate against the byte budget.
    if total_changed > (limits.max_diff_bytes / 4) as u64 {
        reasons.push(ReasonCode::TooLargeEstimate);
    }

    // Gate 2: destructive rewrites disguised as edits.
    if stats.deleted_lines > stats.added_lines * 4 && total_changed > 50 {
        reasons.push(ReasonCode::DeletionRatioSuspicious);
    }

    // Gate 3: file creation/deletion churn.
    if stats.files_created + stats.files_deleted > limits.max_file_creations_or_deletions {
        reasons.push(ReasonCode::TooManyFileCreationsOrDeletions);
    }

    // Gate 4: too many individually oversized files.
    if stats.oversized_paths.len() > limits.max_large_file_touches {
        reasons.push(ReasonCode::TooManyLargeFileTouches);
    }

    // Gate 5: declared hunk extents must agree with the counted lines.
    let extents_consistent = diff.files.iter().all(|f| {
        f.hunks
            .iter()
            .all(|h| h.counted_old_lines() == h.old_len && h.counted_new_lines() == h.new_len)
    });
    if !extents_consistent {
        reasons.push(ReasonCode::HunkExtentMismatch);
    }

    ValidationResult {
        ok: reasons.is_empty(),
        reasons,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::parse;

    /// Build a synthetic diff with the given added/deleted counts for one file.
    fn synthetic_diff(added: usize, deleted: usize) -> String {
        let mut out = String::from("diff --git a/big.rs b/big.rs\n--- a/big.rs\n+++ b/big.rs\n");
        out.push_str(&format!("@@ -1,{} +1,{} @@\n", deleted, added));
        for i in 0..deleted {
            out.push_str(&format!("-old {i}\n"));
        }
        for i in 0..added {
            out.push_str(&format!("+new {i}\n"));
        }
        out
    }

    #[test]
    fn test_small_balanced_diff_passes() {
        let diff = parse(&synthetic_diff(3, 2));
        let result = validate(&diff, &ValidationLimits::default());
        assert!(result.ok, "reasons: {:?}", result.reasons);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn test_deletion_ratio_gate_fires() {
        let diff = parse(&synthetic_diff(5, 60));
        let result = validate(&diff, &ValidationLimits::default());
        assert!(!result.ok);
        assert!(result.reasons.contains(&ReasonCode::DeletionRatioSuspicious));
    }

    #[test]
    fn test_deletion_ratio_requires_total_over_fifty() {
        // 40 deleted vs 2 added is over 4x but under the total floor.
        let diff = parse(&synthetic_diff(2, 40));
        let result = validate(&diff, &ValidationLimits::default());
        assert!(!result
            .reasons
            .contains(&ReasonCode::DeletionRatioSuspicious));
    }

    #[test]
    fn test_deletion_ratio_monotonicity() {
        // Holding added fixed, crossing the 4x threshold flips ok.
        let added = 20;
        let under = parse(&synthetic_diff(added, added * 4));
        assert!(validate(&under, &ValidationLimits::default()).ok);

        let over = parse(&synthetic_diff(added, added * 4 + 1));
        let result = validate(&over, &ValidationLimits::default());
        assert!(!result.ok);
        assert_eq!(result.reasons, vec![ReasonCode::DeletionRatioSuspicious]);
    }

    #[test]
    fn test_size_estimate_gate() {
        let limits = ValidationLimits {
            max_diff_bytes: 100,
            ..Default::default()
        };
        // 26 changed lines > 100 / 4.
        let diff = parse(&synthetic_diff(13, 13));
        let result = validate(&diff, &limits);
        assert!(result.reasons.contains(&ReasonCode::TooLargeEstimate));
    }

    #[test]
    fn test_creation_deletion_count_gate() {
        let mut text = String::new();
        for i in 0..21 {
            text.push_str(&format!(
                "diff --git a/f{i}.rs b/f{i}.rs\nnew file mode 100644\n--- /dev/null\n+++ b/f{i}.rs\n@@ -0,0 +1,1 @@\n+x\n"
            ));
        }
        let diff = parse(&text);
        let result = validate(&diff, &ValidationLimits::default());
        assert!(result
            .reasons
            .contains(&ReasonCode::TooManyFileCreationsOrDeletions));
        assert_eq!(result.stats.files_created, 21);
    }

    #[test]
    fn test_large_file_touch_gate() {
        let limits = ValidationLimits {
            large_file_lines: 2,
            max_large_file_touches: 1,
            ..Default::default()
        };
        let mut text = String::new();
        for i in 0..2 {
            text.push_str(&format!(
                "diff --git a/f{i}.rs b/f{i}.rs\n--- a/f{i}.rs\n+++ b/f{i}.rs\n@@ -1,2 +1,2 @@\n-a\n-b\n+c\n+d\n"
            ));
        }
        let diff = parse(&text);
        let result = validate(&diff, &limits);
        assert!(result.reasons.contains(&ReasonCode::TooManyLargeFileTouches));
        assert_eq!(result.stats.oversized_paths.len(), 2);
    }

    #[test]
    fn test_hunk_extent_mismatch_gate() {
        // Header declares 3 old lines; body has 1.
        let text = "diff --git a/x.rs b/x.rs\n--- a/x.rs\n+++ b/x.rs\n@@ -1,3 +1,1 @@\n-a\n+b\n";
        let diff = parse(text);
        let result = validate(&diff, &ValidationLimits::default());
        assert!(result.reasons.contains(&ReasonCode::HunkExtentMismatch));
    }

    #[test]
    fn test_summarize_classifies_files() {
        let text = "\
diff --git a/new.rs b/new.rs
new file mode 100644
--- /dev/null
+++ b/new.rs
@@ -0,0 +1,1 @@
+x
diff --git a/gone.rs b/gone.rs
deleted file mode 100644
--- a/gone.rs
+++ /dev/null
@@ -1,1 +0,0 @@
-y
diff --git a/mod.rs b/mod.rs
--- a/mod.rs
+++ b/mod.rs
@@ -1,1 +1,1 @@
-a
+b
";
        let agg = summarize(&parse(text), &ValidationLimits::default());
        assert_eq!(agg.files_created, 1);
        assert_eq!(agg.files_deleted, 1);
        assert_eq!(agg.files_modified, 1);
        assert_eq!(agg.added_lines, 2);
        assert_eq!(agg.deleted_lines, 2);
    }

    #[test]
    fn test_reason_codes_are_stable_strings() {
        assert_eq!(
            ReasonCode::DeletionRatioSuspicious.to_string(),
            "deletion_ratio_suspicious"
        );
        assert_eq!(ReasonCode::TooLargeEstimate.to_string(), "too_large_estimate");
        assert_eq!(
            ReasonCode::HunkExtentMismatch.to_string(),
            "hunk_extent_mismatch"
        );
    }
}
