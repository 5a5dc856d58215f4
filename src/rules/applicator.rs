//! Rule applicator - applies rule sets to a document with idempotency checks
//!
//! This module provides the pure core of the patcher:
//! - Rules run in order, each on the output of the previous one
//! - A rule whose marker is present is reported as already applied
//! - A missing match is recorded and the remaining rules still run
//! - Inserted text is checked for raw line breaks inside string literals
//! - A rule, or a set, that would change its own output again is not applied

use crate::cache::get_or_compile_pattern;
use crate::rules::schema::{Query, Rule, RuleSet};
use crate::validate::{check_fragment, ValidationError};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Minimum similarity for a document line to be offered as a near miss.
const NEAR_MISS_THRESHOLD: f64 = 0.6;

/// Result of applying a single rule
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "RuleOutcome should be checked for applied/already-applied"]
pub enum RuleOutcome {
    /// Rule changed the document
    Applied { replacements: usize },
    /// Marker present, or the replacement is already in place
    AlreadyApplied,
}

impl fmt::Display for RuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOutcome::Applied { replacements: 1 } => write!(f, "applied (1 replacement)"),
            RuleOutcome::Applied { replacements } => {
                write!(f, "applied ({replacements} replacements)")
            }
            RuleOutcome::AlreadyApplied => write!(f, "already applied"),
        }
    }
}

/// Per-rule failures. None of these stop the remaining rules.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("match text not found")]
    NotFound { hint: Option<NearMiss> },

    #[error("query matched {count} locations, expected exactly 1")]
    AmbiguousMatch { count: usize },

    #[error("replacement would break a string literal: {0}")]
    MalformedResult(#[from] ValidationError),

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("query still matches after replacement, add a marker or tighten the query")]
    NotIdempotent,

    #[error("rolled back because rule '{culprit}' keeps changing the text")]
    RolledBack { culprit: String },
}

/// The document line closest to a search line that no longer exists.
#[derive(Debug, Clone, PartialEq)]
pub struct NearMiss {
    /// First search line with no exact counterpart in the document
    pub expected: String,
    /// 1-based line number of the closest document line
    pub line: usize,
    pub found: String,
    pub similarity: f64,
}

impl fmt::Display for NearMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected `{}`, closest is line {} `{}` ({:.0}% similar)",
            self.expected,
            self.line,
            self.found,
            self.similarity * 100.0
        )
    }
}

/// Outcome of every rule, in rule order.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub entries: Vec<(String, Result<RuleOutcome, RuleError>)>,
}

impl Report {
    pub fn iter(&self) -> impl Iterator<Item = &(String, Result<RuleOutcome, RuleError>)> {
        self.entries.iter()
    }

    pub fn outcome(&self, rule_id: &str) -> Option<&Result<RuleOutcome, RuleError>> {
        self.entries
            .iter()
            .find(|(id, _)| id == rule_id)
            .map(|(_, result)| result)
    }

    pub fn applied(&self) -> usize {
        self.count(|r| matches!(r, Ok(RuleOutcome::Applied { .. })))
    }

    pub fn already_applied(&self) -> usize {
        self.count(|r| matches!(r, Ok(RuleOutcome::AlreadyApplied)))
    }

    pub fn not_found(&self) -> usize {
        self.count(|r| matches!(r, Err(RuleError::NotFound { .. })))
    }

    /// Errors other than not-found.
    pub fn failed(&self) -> usize {
        self.count(|r| matches!(r, Err(e) if !matches!(e, RuleError::NotFound { .. })))
    }

    pub fn extend(&mut self, other: Report) {
        self.entries.extend(other.entries);
    }

    fn count(&self, pred: impl Fn(&Result<RuleOutcome, RuleError>) -> bool) -> usize {
        self.entries.iter().filter(|(_, r)| pred(r)).count()
    }
}

/// Transformed text plus the per-rule report.
#[derive(Debug, Clone)]
#[must_use = "Applied holds the patched text; nothing is written until it is stored"]
pub struct Applied {
    pub text: String,
    pub report: Report,
}

impl RuleSet {
    /// Apply this set's rules to `document`.
    pub fn apply(&self, document: &str) -> Applied {
        apply_rules(document, &self.rules)
    }
}

/// Apply `rules` in order to `document`.
///
/// Pure: no I/O. Each rule sees the output of the previous one. A failing rule
/// leaves the text as it was and the next rule runs.
///
/// The rules are then run once more over the result. If any of them would
/// change it again, the whole set is rolled back: `document` is returned
/// as-is, the rules that did not settle report [`RuleError::NotIdempotent`]
/// and the other rules that changed text report [`RuleError::RolledBack`].
pub fn apply_rules(document: &str, rules: &[Rule]) -> Applied {
    let first = apply_pass(document, rules);
    let second = apply_pass(&first.text, rules);

    let unsettled: Vec<bool> = second
        .report
        .iter()
        .map(|(_, result)| matches!(result, Ok(RuleOutcome::Applied { .. })))
        .collect();

    let Some(culprit) = second
        .report
        .iter()
        .zip(&unsettled)
        .find_map(|((id, _), unsettled)| unsettled.then(|| id.clone()))
    else {
        return first;
    };

    warn!(rule = %culprit, "rule set does not settle, rolling back");
    let entries = first
        .report
        .entries
        .into_iter()
        .zip(unsettled)
        .map(|((id, result), unsettled)| {
            let result = match result {
                _ if unsettled => Err(RuleError::NotIdempotent),
                Ok(RuleOutcome::Applied { .. }) => Err(RuleError::RolledBack {
                    culprit: culprit.clone(),
                }),
                other => other,
            };
            (id, result)
        })
        .collect();

    Applied {
        text: document.to_string(),
        report: Report { entries },
    }
}

/// One ordered pass over `rules`.
fn apply_pass(document: &str, rules: &[Rule]) -> Applied {
    let mut text = document.to_string();
    let mut report = Report::default();

    for rule in rules {
        let result = match apply_rule(&text, rule) {
            Ok((Some(new_text), outcome)) => {
                text = new_text;
                Ok(outcome)
            }
            Ok((None, outcome)) => Ok(outcome),
            Err(e) => Err(e),
        };
        debug!(rule = %rule.id, ?result, "rule evaluated");
        report.entries.push((rule.id.clone(), result));
    }

    Applied { text, report }
}

/// Apply several sets in sequence. Report ids are prefixed with the set name.
pub fn apply_rule_sets(document: &str, sets: &[RuleSet]) -> Applied {
    let mut text = document.to_string();
    let mut report = Report::default();

    for set in sets {
        let applied = set.apply(&text);
        text = applied.text;
        report.entries.extend(
            applied
                .report
                .entries
                .into_iter()
                .map(|(id, result)| (format!("{}/{}", set.meta.name, id), result)),
        );
    }

    Applied { text, report }
}

/// Evaluate one rule. Returns the new text only when it differs.
fn apply_rule(text: &str, rule: &Rule) -> Result<(Option<String>, RuleOutcome), RuleError> {
    if let Some(marker) = rule.marker.as_deref() {
        if text.contains(marker) {
            return Ok((None, RuleOutcome::AlreadyApplied));
        }
    }

    let (new_text, replacements, fragments, still_matches) = match &rule.query {
        Query::Literal { search } => {
            let count = text.matches(search.as_str()).count();
            if count == 0 {
                if !rule.replacement.text.is_empty() && text.contains(&rule.replacement.text) {
                    return Ok((None, RuleOutcome::AlreadyApplied));
                }
                return Err(RuleError::NotFound {
                    hint: near_miss(text, search),
                });
            }
            if rule.unique && count > 1 {
                return Err(RuleError::AmbiguousMatch { count });
            }
            let new_text = text.replace(search.as_str(), &rule.replacement.text);
            let still_matches = new_text.contains(search.as_str());
            (
                new_text,
                count,
                vec![rule.replacement.text.clone()],
                still_matches,
            )
        }
        Query::Pattern { pattern } => {
            let re = get_or_compile_pattern(pattern)?;
            let count = re.find_iter(text).count();
            if count == 0 {
                return Err(RuleError::NotFound { hint: None });
            }
            if rule.unique && count > 1 {
                return Err(RuleError::AmbiguousMatch { count });
            }

            let mut new_text = String::with_capacity(text.len());
            let mut fragments = Vec::with_capacity(count);
            let mut last = 0;
            for caps in re.captures_iter(text) {
                let Some(whole) = caps.get(0) else {
                    continue;
                };
                let mut fragment = String::new();
                if rule.replacement.expand {
                    caps.expand(&rule.replacement.text, &mut fragment);
                } else {
                    fragment.push_str(&rule.replacement.text);
                }
                new_text.push_str(&text[last..whole.start()]);
                new_text.push_str(&fragment);
                fragments.push(fragment);
                last = whole.end();
            }
            new_text.push_str(&text[last..]);
            let still_matches = re.is_match(&new_text);
            (new_text, count, fragments, still_matches)
        }
    };

    if rule.check_strings {
        for fragment in &fragments {
            check_fragment(fragment)?;
        }
    }

    if new_text == text {
        return Ok((None, RuleOutcome::AlreadyApplied));
    }

    // Without a marker, a second run would find the query again
    if rule.marker.is_none() && still_matches {
        return Err(RuleError::NotIdempotent);
    }

    Ok((Some(new_text), RuleOutcome::Applied { replacements }))
}

/// Find where a literal search drifted from the document.
///
/// Takes the first non-blank search line that has no exact (trimmed)
/// counterpart in the document and returns the most similar document line.
fn near_miss(text: &str, search: &str) -> Option<NearMiss> {
    let doc_lines: Vec<&str> = text.lines().map(str::trim).collect();

    let expected = search
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find(|line| !doc_lines.contains(line))?;

    doc_lines
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(idx, line)| (idx, *line, strsim::normalized_levenshtein(expected, line)))
        .filter(|(_, _, score)| *score >= NEAR_MISS_THRESHOLD)
        .max_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(idx, line, similarity)| NearMiss {
            expected: expected.to_string(),
            line: idx + 1,
            found: line.to_string(),
            similarity,
        })
}
