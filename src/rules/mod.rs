pub mod applicator;
pub mod builtin;
pub mod loader;
pub mod schema;

pub use applicator::{
    apply_rule_sets, apply_rules, Applied, NearMiss, Report, RuleError, RuleOutcome,
};
pub use builtin::{builtin, builtin_names, BuiltinSet, BUILTIN_SETS, DEFAULT_SETS};
pub use loader::{discover_rule_files, load_from_path, load_from_str, LoadError};
pub use schema::{Metadata, Query, Replacement, Rule, RuleSet, SchemaError, SchemaIssue};
