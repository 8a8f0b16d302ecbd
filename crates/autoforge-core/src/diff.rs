//! Unified-diff parsing into a structured change model.
//!
//! `parse` is total: malformed input never fails, it produces a
//! best-effort partial structure. Lines outside any recognized file or
//! hunk are skipped. Totals are derived by summation after the pass,
//! never mutated independently.

use serde::{Deserialize, Serialize};

/// A contiguous changed-line block with its declared old/new extents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    /// The full `@@ ... @@` header line as it appeared.
    pub header: String,
    pub old_start: u64,
    pub old_len: u64,
    pub new_start: u64,
    pub new_len: u64,
    /// Raw content lines with their `+`/`-`/space prefix preserved.
    pub lines: Vec<String>,
}

impl Hunk {
    /// Count of lines the hunk consumes from the old file (context + deletions).
    pub fn counted_old_lines(&self) -> u64 {
        self.lines
            .iter()
            .filter(|l| !l.starts_with('+') && !l.starts_with('\\'))
            .count() as u64
    }

    /// Count of lines the hunk emits into the new file (context + additions).
    pub fn counted_new_lines(&self) -> u64 {
        self.lines
            .iter()
            .filter(|l| !l.starts_with('-') && !l.starts_with('\\'))
            .count() as u64
    }
}

/// Parsed change set for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ParsedFileDiff {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub is_new: bool,
    pub is_deleted: bool,
    pub is_rename: bool,
    pub added: u64,
    pub deleted: u64,
    pub hunks: Vec<Hunk>,
}

impl ParsedFileDiff {
    /// Effective path of the file after the change (falls back to the old
    /// path for deletions).
    pub fn path(&self) -> Option<&str> {
        self.new_path.as_deref().or(self.old_path.as_deref())
    }

    /// Combined churn for large-file heuristics.
    pub fn churn(&self) -> u64 {
        self.added + self.deleted
    }
}

/// Structured model of a full unified diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDiff {
    pub files: Vec<ParsedFileDiff>,
    pub total_added: u64,
    pub total_deleted: u64,
    /// Original raw text, kept for re-extraction and audit.
    pub raw: String,
}

impl ParsedDiff {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_changed(&self) -> u64 {
        self.total_added + self.total_deleted
    }
}

/// Strip the `a/` / `b/` prefix git puts on header paths.
fn strip_git_prefix(path: &str) -> Option<String> {
    if path == "/dev/null" {
        return None;
    }
    let stripped = path
        .strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path);
    Some(stripped.to_string())
}

/// Parse a raw unified diff. Never fails; anomalies yield partial output.
pub fn parse(raw: &str) -> ParsedDiff {
    let hunk_re = regex::Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@")
        .expect("hunk header regex is valid");

    let mut files: Vec<ParsedFileDiff> = Vec::new();
    let mut current: Option<ParsedFileDiff> = None;
    let mut in_hunk = false;

    for raw_line in raw.lines() {
        // Tolerate CRLF input.
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        if let Some(rest) = line.strip_prefix("diff --git ") {
            if let Some(prev) = current.take() {
                files.push(prev);
            }
            in_hunk = false;

            let mut entry = ParsedFileDiff::default();
            // Best effort: `a/<old> b/<new>`. Paths containing spaces
            // cannot be split unambiguously here; the header form with
            // exactly two tokens covers what the tooling emits.
            let tokens: Vec<&str> = rest.split_whitespace().collect();
            if tokens.len() == 2 {
                entry.old_path = strip_git_prefix(tokens[0]);
                entry.new_path = strip_git_prefix(tokens[1]);
            }
            current = Some(entry);
            continue;
        }

        let Some(entry) = current.as_mut() else {
            // Preamble or garbage before the first file header.
            continue;
        };

        if !in_hunk {
            if line.starts_with("new file mode") {
                entry.is_new = true;
                continue;
            }
            if line.starts_with("deleted file mode") {
                entry.is_deleted = true;
                continue;
            }
            if let Some(rest) = line.strip_prefix("rename from ") {
                entry.is_rename = true;
                entry.old_path = Some(rest.trim().to_string());
                continue;
            }
            if let Some(rest) = line.strip_prefix("rename to ") {
                entry.is_rename = true;
                entry.new_path = Some(rest.trim().to_string());
                continue;
            }
            if let Some(rest) = line.strip_prefix("--- ") {
                let path = strip_git_prefix(rest.trim());
                if path.is_none() {
                    entry.is_new = true;
                    entry.old_path = None;
                } else if entry.old_path.is_none() {
                    entry.old_path = path;
                }
                continue;
            }
            if let Some(rest) = line.strip_prefix("+++ ") {
                let path = strip_git_prefix(rest.trim());
                if path.is_none() {
                    entry.is_deleted = true;
                    entry.new_path = None;
                } else if entry.new_path.is_none() {
                    entry.new_path = path;
                }
                continue;
            }
        }

        if let Some(caps) = hunk_re.captures(line) {
            let num = |i: usize, default: u64| {
                caps.get(i)
                    .map(|m| m.as_str().parse::<u64>().unwrap_or(default))
                    .unwrap_or(default)
            };
            entry.hunks.push(Hunk {
                header: line.to_string(),
                old_start: num(1, 0),
                old_len: num(2, 1),
                new_start: num(3, 0),
                new_len: num(4, 1),
                lines: Vec::new(),
            });
            in_hunk = true;
            continue;
        }

        if in_hunk {
            if let Some(hunk) = entry.hunks.last_mut() {
                hunk.lines.push(line.to_string());
                if line.starts_with('+') {
                    entry.added += 1;
                } else if line.starts_with('-') {
                    entry.deleted += 1;
                }
            }
        }
    }

    if let Some(prev) = current.take() {
        files.push(prev);
    }

    let total_added = files.iter().map(|f| f.added).sum();
    let total_deleted = files.iter().map(|f| f.deleted).sum();

    ParsedDiff {
        files,
        total_added,
        total_deleted,
        raw: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILE_DIFF: &str = "\
diff --git a/src/a.rs b/src/a.rs
new file mode 100644
--- /dev/null
+++ b/src/a.rs
@@ -0,0 +1,1 @@
+pub fn a() {}
diff --git a/README.md b/README.md
--- a/README.md
+++ b/README.md
@@ -1,3 +1,4 @@
 # readme
-old line
+new line
+another line
 tail
";

    #[test]
    fn test_parse_counts_files_and_totals() {
        let parsed = parse(TWO_FILE_DIFF);
        assert_eq!(parsed.files.len(), 2);
        assert_eq!(parsed.total_added, 3);
        assert_eq!(parsed.total_deleted, 1);
        assert_eq!(
            parsed.total_added,
            parsed.files.iter().map(|f| f.added).sum::<u64>()
        );
    }

    #[test]
    fn test_new_file_detection() {
        let parsed = parse(TWO_FILE_DIFF);
        let a = &parsed.files[0];
        assert!(a.is_new);
        assert!(!a.is_deleted);
        assert_eq!(a.path(), Some("src/a.rs"));
        assert_eq!(a.old_path, None);
        assert_eq!(a.added, 1);
    }

    #[test]
    fn test_hunk_extents_and_lines() {
        let parsed = parse(TWO_FILE_DIFF);
        let readme = &parsed.files[1];
        assert_eq!(readme.hunks.len(), 1);
        let hunk = &readme.hunks[0];
        assert_eq!(hunk.old_start, 1);
        assert_eq!(hunk.old_len, 3);
        assert_eq!(hunk.new_start, 1);
        assert_eq!(hunk.new_len, 4);
        assert_eq!(hunk.lines.len(), 5);
        assert_eq!(hunk.counted_old_lines(), 3);
        assert_eq!(hunk.counted_new_lines(), 4);
    }

    #[test]
    fn test_rename_markers_override_paths() {
        let diff = "\
diff --git a/src/old.rs b/src/new.rs
similarity index 97%
rename from src/old.rs
rename to src/new.rs
";
        let parsed = parse(diff);
        assert_eq!(parsed.files.len(), 1);
        let f = &parsed.files[0];
        assert!(f.is_rename);
        assert_eq!(f.old_path.as_deref(), Some("src/old.rs"));
        assert_eq!(f.new_path.as_deref(), Some("src/new.rs"));
    }

    #[test]
    fn test_deleted_file() {
        let diff = "\
diff --git a/gone.txt b/gone.txt
deleted file mode 100644
--- a/gone.txt
+++ /dev/null
@@ -1,2 +0,0 @@
-first
-second
";
        let parsed = parse(diff);
        let f = &parsed.files[0];
        assert!(f.is_deleted);
        assert_eq!(f.deleted, 2);
        assert_eq!(f.added, 0);
        assert_eq!(f.path(), Some("gone.txt"));
    }

    #[test]
    fn test_malformed_input_is_partial_not_fatal() {
        let parsed = parse("not a diff at all\njust prose\n");
        assert!(parsed.is_empty());
        assert_eq!(parsed.total_changed(), 0);

        // Header with no hunks still yields a file entry.
        let parsed = parse("diff --git a/x.txt b/x.txt\n");
        assert_eq!(parsed.files.len(), 1);
        assert!(parsed.files[0].hunks.is_empty());
    }

    #[test]
    fn test_crlf_line_endings_tolerated() {
        let diff = "diff --git a/x.txt b/x.txt\r\n--- a/x.txt\r\n+++ b/x.txt\r\n@@ -1,1 +1,1 @@\r\n-old\r\n+new\r\n";
        let parsed = parse(diff);
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.total_added, 1);
        assert_eq!(parsed.total_deleted, 1);
        assert_eq!(parsed.files[0].hunks[0].lines[0], "-old");
    }

    #[test]
    fn test_file_markers_do_not_count_as_changes() {
        let parsed = parse(TWO_FILE_DIFF);
        // `+++`/`---` markers are structural, not content.
        assert_eq!(parsed.files[1].added, 2);
        assert_eq!(parsed.files[1].deleted, 1);
    }

    #[test]
    fn test_raw_text_is_retained() {
        let parsed = parse(TWO_FILE_DIFF);
        assert_eq!(parsed.raw, TWO_FILE_DIFF);
    }
}
