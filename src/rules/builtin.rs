//! Rule sets shipped with the binary.
//!
//! The TOML sources live in `patches/` and are embedded at compile time, so
//! the zero-argument invocation works without any files next to the target.

use crate::rules::loader::{load_from_str, LoadError};
use crate::rules::schema::RuleSet;

/// Name and TOML source of one embedded rule set.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinSet {
    pub name: &'static str,
    pub source: &'static str,
}

pub const BUILTIN_SETS: &[BuiltinSet] = &[
    BuiltinSet {
        name: "copy-buttons",
        source: include_str!("../../patches/copy-buttons.toml"),
    },
    BuiltinSet {
        name: "repair-joins",
        source: include_str!("../../patches/repair-joins.toml"),
    },
    BuiltinSet {
        name: "empty-joins",
        source: include_str!("../../patches/empty-joins.toml"),
    },
];

/// Sets applied when no `--set` or `--rules` is given, in order.
pub const DEFAULT_SETS: &[&str] = &["copy-buttons", "repair-joins"];

/// Parse and validate one embedded set by name.
pub fn builtin(name: &str) -> Result<RuleSet, LoadError> {
    let entry = BUILTIN_SETS
        .iter()
        .find(|set| set.name == name)
        .ok_or_else(|| LoadError::UnknownSet(name.to_string()))?;

    let mut set = load_from_str(entry.source)?;
    if set.meta.name.trim().is_empty() {
        set.meta.name = entry.name.to_string();
    }
    Ok(set)
}

pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_SETS.iter().map(|set| set.name)
}
