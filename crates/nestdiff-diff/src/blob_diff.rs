//! Blob-level diff: line-by-line comparison of leaf contents.
//!
//! Uses the `similar` crate (Myers diff algorithm) to produce structured
//! hunks with context lines, rendered as a unified diff. Binary content is
//! compared through its hexdump so that the diff still points at offsets.

use std::fmt::Write as _;

use similar::{ChangeTag, TextDiff};

use crate::hexdump::hexdump;

/// Lines of context around each change.
pub const CONTEXT_RADIUS: usize = 3;

/// Marker following a last line that has no trailing newline.
pub const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// The result of diffing two blobs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobDiff {
    /// The diff hunks.
    pub hunks: Vec<DiffHunk>,
    /// Total number of lines in the old content.
    pub old_lines: usize,
    /// Total number of lines in the new content.
    pub new_lines: usize,
    /// `true` when the lines are hexdump lines of binary content.
    pub binary: bool,
}

impl BlobDiff {
    /// Returns `true` if the two blobs are identical.
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Total number of lines added across all hunks.
    pub fn additions(&self) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| matches!(l, DiffLine::Added(_)))
            .count()
    }

    /// Total number of lines removed across all hunks.
    pub fn deletions(&self) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .filter(|l| matches!(l, DiffLine::Removed(_)))
            .count()
    }

    /// Render as a unified diff with `---`/`+++` headers.
    ///
    /// Returns an empty string when there are no hunks.
    pub fn to_unified(&self, old_label: &str, new_label: &str) -> String {
        if self.hunks.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        let _ = writeln!(out, "--- {old_label}");
        let _ = writeln!(out, "+++ {new_label}");
        for hunk in &self.hunks {
            let _ = writeln!(
                out,
                "@@ -{} +{} @@",
                range_header(hunk.old_start, hunk.old_count),
                range_header(hunk.new_start, hunk.new_count)
            );
            for line in &hunk.lines {
                let (prefix, text) = match line {
                    DiffLine::Context(t) => (' ', t),
                    DiffLine::Added(t) => ('+', t),
                    DiffLine::Removed(t) => ('-', t),
                    DiffLine::NoNewlineAtEof => {
                        let _ = writeln!(out, "{NO_NEWLINE_MARKER}");
                        continue;
                    }
                };
                let _ = writeln!(out, "{prefix}{text}");
            }
        }
        out
    }
}

// Unified format: a zero-length range names the line before it.
fn range_header(start: usize, count: usize) -> String {
    match count {
        0 => format!("{},0", start.saturating_sub(1)),
        1 => format!("{start}"),
        n => format!("{start},{n}"),
    }
}

/// A contiguous region of changes in a diff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffHunk {
    /// Line number in the old content where this hunk starts (1-based).
    pub old_start: usize,
    /// Number of lines from the old content in this hunk.
    pub old_count: usize,
    /// Line number in the new content where this hunk starts (1-based).
    pub new_start: usize,
    /// Number of lines from the new content in this hunk.
    pub new_count: usize,
    /// The individual diff lines in this hunk.
    pub lines: Vec<DiffLine>,
}

/// A single line in a diff hunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffLine {
    /// A line present in both old and new (context).
    Context(String),
    /// A line added in the new content.
    Added(String),
    /// A line removed from the old content.
    Removed(String),
    /// The preceding line ends its content without a newline.
    NoNewlineAtEof,
}

/// Compute a line-by-line diff between two byte slices.
///
/// If both sides are valid UTF-8 they are compared as text, otherwise both
/// are compared through their hexdumps.
pub fn diff_blobs(old: &[u8], new: &[u8]) -> BlobDiff {
    match (std::str::from_utf8(old), std::str::from_utf8(new)) {
        (Ok(old_str), Ok(new_str)) => diff_text(old_str, new_str),
        _ => {
            let mut diff = diff_text(&hexdump(old), &hexdump(new));
            diff.binary = true;
            diff
        }
    }
}

/// Compute a line-by-line diff between two strings.
pub fn diff_text(old: &str, new: &str) -> BlobDiff {
    let old_lines = old.lines().count();
    let new_lines = new.lines().count();

    if old == new {
        return BlobDiff {
            hunks: Vec::new(),
            old_lines,
            new_lines,
            binary: false,
        };
    }

    let text_diff = TextDiff::from_lines(old, new);
    let mut hunks = Vec::new();

    for group in text_diff.grouped_ops(CONTEXT_RADIUS) {
        let mut lines = Vec::new();
        let (mut old_start, mut new_start) = (0usize, 0usize);
        let (mut old_count, mut new_count) = (0usize, 0usize);

        if let Some(first) = group.first() {
            old_start = first.old_range().start + 1;
            new_start = first.new_range().start + 1;
        }

        for op in &group {
            for change in text_diff.iter_changes(op) {
                let text = change.value().trim_end_matches('\n').to_string();
                match change.tag() {
                    ChangeTag::Equal => {
                        lines.push(DiffLine::Context(text));
                        old_count += 1;
                        new_count += 1;
                    }
                    ChangeTag::Delete => {
                        lines.push(DiffLine::Removed(text));
                        old_count += 1;
                    }
                    ChangeTag::Insert => {
                        lines.push(DiffLine::Added(text));
                        new_count += 1;
                    }
                }
                if change.missing_newline() {
                    lines.push(DiffLine::NoNewlineAtEof);
                }
            }
        }

        hunks.push(DiffHunk {
            old_start,
            old_count,
            new_start,
            new_count,
            lines,
        });
    }

    BlobDiff {
        hunks,
        old_lines,
        new_lines,
        binary: false,
    }
}
