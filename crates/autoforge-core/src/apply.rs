//! Line-based hunk application against file content.
//!
//! Each hunk is located at its declared old-file start, with a small
//! drift window to absorb minor offset skew, and its context and
//! deletion lines are verified against the actual content before any
//! splice happens. A mismatch fails the file; partial application within
//! a file never occurs.

use thiserror::Error;

use crate::diff::{Hunk, ParsedFileDiff};

/// How far (in lines, either direction) a hunk may drift from its
/// declared start before application is refused.
pub const DRIFT_WINDOW: i64 = 3;

/// Failure applying a single file's hunks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchApplyError {
    #[error("hunk at old line {old_start} does not match file content")]
    ContextMismatch { old_start: u64 },

    #[error("hunk at old line {old_start} overlaps a previously applied hunk")]
    OverlappingHunk { old_start: u64 },

    #[error("hunk header is unusable: {0}")]
    BadHunk(String),
}

/// Content of a hunk line without its prefix character.
fn line_body(line: &str) -> &str {
    if line.is_empty() {
        // Context lines for empty source lines sometimes lose their
        // leading space in transit.
        ""
    } else {
        &line[1..]
    }
}

fn is_context(line: &str) -> bool {
    line.is_empty() || line.starts_with(' ')
}

fn is_deletion(line: &str) -> bool {
    line.starts_with('-')
}

fn is_addition(line: &str) -> bool {
    line.starts_with('+')
}

fn is_meta(line: &str) -> bool {
    line.starts_with('\\')
}

/// Check whether `hunk` matches `lines` starting at `pos`.
fn hunk_matches_at(hunk: &Hunk, lines: &[String], pos: usize) -> bool {
    let mut cursor = pos;
    for hline in &hunk.lines {
        if is_meta(hline) || is_addition(hline) {
            continue;
        }
        // Context or deletion: must agree with the original.
        match lines.get(cursor) {
            Some(actual) if actual == line_body(hline) => cursor += 1,
            _ => return false,
        }
    }
    true
}

/// Locate the hunk within the drift window around its declared start.
fn locate_hunk(hunk: &Hunk, lines: &[String], min_pos: usize) -> Option<usize> {
    let declared = hunk.old_start.saturating_sub(1) as i64;
    let mut offsets = vec![0i64];
    for d in 1..=DRIFT_WINDOW {
        offsets.push(d);
        offsets.push(-d);
    }

    for offset in offsets {
        let pos = declared + offset;
        if pos < min_pos as i64 || pos < 0 {
            continue;
        }
        let pos = pos as usize;
        if pos > lines.len() {
            continue;
        }
        if hunk_matches_at(hunk, lines, pos) {
            return Some(pos);
        }
    }
    None
}

/// Apply a file's hunks to its original content, producing the new
/// content. Hunks are applied in order against old-file coordinates.
pub fn apply_hunks(original: &str, file: &ParsedFileDiff) -> Result<String, PatchApplyError> {
    let had_trailing_newline = original.ends_with('\n') || original.is_empty();
    let lines: Vec<String> = original.lines().map(|l| l.to_string()).collect();

    let mut output: Vec<String> = Vec::with_capacity(lines.len());
    let mut cursor = 0usize;

    for hunk in &file.hunks {
        if hunk.old_start == 0 && hunk.old_len > 0 {
            return Err(PatchApplyError::BadHunk(hunk.header.clone()));
        }

        let pos = locate_hunk(hunk, &lines, cursor).ok_or(PatchApplyError::ContextMismatch {
            old_start: hunk.old_start,
        })?;

        if pos < cursor {
            return Err(PatchApplyError::OverlappingHunk {
                old_start: hunk.old_start,
            });
        }

        // Copy unchanged lines up to the hunk.
        output.extend_from_slice(&lines[cursor..pos]);
        cursor = pos;

        for hline in &hunk.lines {
            if is_meta(hline) {
                continue;
            }
            if is_addition(hline) {
                output.push(line_body(hline).to_string());
            } else if is_deletion(hline) {
                cursor += 1;
            } else if is_context(hline) {
                output.push(lines[cursor].clone());
                cursor += 1;
            }
        }
    }

    // Remainder after the last hunk.
    output.extend_from_slice(&lines[cursor..]);

    let mut result = output.join("\n");
    if had_trailing_newline && !result.is_empty() {
        result.push('\n');
    }
    Ok(result)
}

/// Content for a newly created file: its added lines, in order.
pub fn synthesize_new_file(file: &ParsedFileDiff) -> String {
    let mut out = String::new();
    for hunk in &file.hunks {
        for line in &hunk.lines {
            if is_addition(line) {
                out.push_str(line_body(line));
                out.push('\n');
            }
        }
    }
    out
}
