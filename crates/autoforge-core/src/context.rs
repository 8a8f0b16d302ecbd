//! Relevance-ranked, character-budgeted repository context assembly.
//!
//! Candidate files are scored against the batch's target paths (direct
//! matches first, large files penalized) and greedily packed into the
//! configured character budget.

use serde::{Deserialize, Serialize};

/// A repository file offered as provider context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFile {
    pub path: String,
    pub content: String,
}

impl RepoFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Context set trimmed to budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimmedContext {
    pub files: Vec<RepoFile>,
    pub total_chars: usize,
    pub dropped: usize,
}

const SCORE_DIRECT_MATCH: f64 = 100.0;
const SCORE_PATH_AFFINITY: f64 = 50.0;
const SCORE_BASELINE: f64 = 10.0;

/// Penalty divisor: every ~2000 chars of content costs one score point.
const SIZE_PENALTY_CHARS: f64 = 2000.0;

/// Relevance score for one file against the batch's target paths.
fn relevance(file: &RepoFile, target_paths: &[String]) -> f64 {
    let base = if target_paths.iter().any(|t| t == &file.path) {
        SCORE_DIRECT_MATCH
    } else if target_paths.iter().any(|t| shares_affinity(t, &file.path)) {
        SCORE_PATH_AFFINITY
    } else {
        SCORE_BASELINE
    };
    base - file.content.len() as f64 / SIZE_PENALTY_CHARS
}

/// Same directory or same file name counts as affinity.
fn shares_affinity(target: &str, candidate: &str) -> bool {
    let dir_of = |p: &str| p.rsplit_once('/').map(|(d, _)| d.to_string());
    let name_of = |p: &str| p.rsplit('/').next().map(str::to_string);

    (dir_of(target).is_some() && dir_of(target) == dir_of(candidate))
        || name_of(target) == name_of(candidate)
}

/// Rank candidates by relevance, highest first. Ties break on path for
/// determinism.
pub fn rank_files(mut files: Vec<RepoFile>, target_paths: &[String]) -> Vec<RepoFile> {
    files.sort_by(|a, b| {
        relevance(b, target_paths)
            .partial_cmp(&relevance(a, target_paths))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    files
}

/// Greedily pack ranked files into the character budget.
pub fn trim_to_budget(
    files: Vec<RepoFile>,
    target_paths: &[String],
    char_budget: usize,
) -> TrimmedContext {
    let ranked = rank_files(files, target_paths);

    let mut included = Vec::new();
    let mut total_chars = 0usize;
    let mut dropped = 0usize;

    for file in ranked {
        let cost = file.path.len() + file.content.len();
        if total_chars + cost <= char_budget {
            total_chars += cost;
            included.push(file);
        } else {
            dropped += 1;
        }
    }

    TrimmedContext {
        files: included,
        total_chars,
        dropped,
    }
}

/// Truncate text to at most `max_bytes`, never splitting a char.
pub fn truncate_on_char_boundary(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text[..cut].to_string()
}

/// Trim free-form reasoning text to the budget.
pub fn trim_reasoning(text: &str, char_budget: usize) -> String {
    truncate_on_char_boundary(text, char_budget)
}
