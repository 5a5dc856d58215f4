//! Page Patcher: idempotent rule-based patching for a generated UI page
//!
//! Applies ordered substitution rules to a single text file, typically the
//! `MobilePage.tsx` component, and reports what each rule did.
//!
//! # Architecture
//!
//! A run is a straight pipeline: load the [`Document`], apply one or more
//! [`RuleSet`]s with [`apply_rules`], optionally [`normalize_whitespace`],
//! then store. Only the first and last steps touch the filesystem; everything
//! in between is a pure function on a `&str`.
//!
//! # Safety
//!
//! - Every rule is idempotent: a marker, or the replacement already being
//!   present, short-circuits it
//! - A rule whose query still matches its own output, or a set whose rules
//!   keep feeding each other, is reported and not applied
//! - A missing match is reported per rule and never aborts the run
//! - Inserted text may not put a raw line break inside a string literal
//! - The file is not written when nothing changed
//!
//! # Example
//!
//! ```
//! use page_patcher::{apply_rules, Rule, RuleOutcome};
//!
//! let rules = vec![
//!     Rule::literal("escape-join", "].join('');", "].join('\\n');"),
//! ];
//!
//! let applied = apply_rules("const s = [a, b].join('');", &rules);
//! assert_eq!(applied.text, "const s = [a, b].join('\\n');");
//! assert_eq!(
//!     applied.report.outcome("escape-join"),
//!     Some(&Ok(RuleOutcome::Applied { replacements: 1 }))
//! );
//! ```

pub mod cache;
pub mod document;
pub mod normalize;
pub mod rules;
pub mod validate;

// Re-exports
pub use document::{load_and_store, Document, DocumentError, StoreResult};
pub use normalize::{normalize_report, normalize_whitespace, NormalizeStats};
pub use rules::{
    apply_rule_sets, apply_rules, builtin, load_from_path, load_from_str, Applied, LoadError,
    NearMiss, Report, Rule, RuleError, RuleOutcome, RuleSet,
};
pub use validate::{check_fragment, find_broken_joins, ErrorLocation, ValidationError};
