//! Line-level cleanup after mechanical edits.
//!
//! Two passes in one sweep:
//! - runs of blank (whitespace-only) lines collapse to a single blank line
//! - a non-blank line identical to the line kept just before it is dropped
//!
//! Lines are compared with their terminators, so `"a\n"` and `"a\r\n"` are
//! different lines. Intentionally repeated consecutive lines are removed too;
//! callers that need them must not run this pass.

/// Counters reported by [`normalize_report`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub lines_before: usize,
    pub lines_after: usize,
    pub blank_lines_removed: usize,
    pub duplicates_removed: usize,
}

impl NormalizeStats {
    pub fn changed(&self) -> bool {
        self.lines_before != self.lines_after
    }
}

/// Collapse blank-line runs and consecutive duplicate lines.
pub fn normalize_whitespace(document: &str) -> String {
    normalize_report(document).0
}

/// Same as [`normalize_whitespace`], plus what was removed.
pub fn normalize_report(document: &str) -> (String, NormalizeStats) {
    let mut output = String::with_capacity(document.len());
    let mut stats = NormalizeStats::default();
    let mut prev_line: Option<&str> = None;
    let mut blank_run = 0usize;

    for line in document.split_inclusive('\n') {
        stats.lines_before += 1;
        let blank = line.trim().is_empty();

        if !blank && prev_line == Some(line) {
            stats.duplicates_removed += 1;
            continue;
        }

        if blank {
            blank_run += 1;
            if blank_run > 1 {
                stats.blank_lines_removed += 1;
                continue;
            }
        } else {
            blank_run = 0;
        }

        output.push_str(line);
        prev_line = Some(line);
        stats.lines_after += 1;
    }

    (output, stats)
}
