use crate::cache::get_or_compile_pattern;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

/// An ordered list of rules, as loaded from one TOML file.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct RuleSet {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            meta: Metadata {
                name: name.into(),
                description: None,
            },
            rules,
        }
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut issues = Vec::new();

        if self.rules.is_empty() {
            issues.push(SchemaIssue::EmptyRuleList);
        }

        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                issues.push(SchemaIssue::MissingField {
                    rule_id: None,
                    field: "id",
                });
            } else if !seen.insert(rule.id.as_str()) {
                issues.push(SchemaIssue::DuplicateId(rule.id.clone()));
            }

            rule.collect_issues(&mut issues);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(SchemaError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One match/replacement pair.
#[derive(Debug, Deserialize, Clone)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub query: Query,
    pub replacement: Replacement,
    /// Substring whose presence means this rule already ran
    #[serde(default)]
    pub marker: Option<String>,
    /// Refuse to edit unless the query matches exactly once
    #[serde(default)]
    pub unique: bool,
    /// Reject replacements that put raw line breaks inside string literals
    #[serde(default = "default_true")]
    pub check_strings: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Query {
    /// Exact substring match
    Literal { search: String },
    /// Regular expression match (`regex` crate syntax)
    Pattern { pattern: String },
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub text: String,
    /// Expand `$1` / `${name}` capture references (pattern queries only)
    #[serde(default)]
    pub expand: bool,
}

impl Rule {
    /// Replace every occurrence of `search` with `replace`.
    pub fn literal(
        id: impl Into<String>,
        search: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self::with_query(
            id,
            Query::Literal {
                search: search.into(),
            },
            replace,
        )
    }

    /// Replace every match of `pattern` with `replace`, inserted verbatim.
    pub fn pattern(
        id: impl Into<String>,
        pattern: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self::with_query(
            id,
            Query::Pattern {
                pattern: pattern.into(),
            },
            replace,
        )
    }

    fn with_query(id: impl Into<String>, query: Query, replace: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            query,
            replacement: Replacement {
                text: replace.into(),
                expand: false,
            },
            marker: None,
            unique: false,
            check_strings: true,
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn expanding(mut self) -> Self {
        self.replacement.expand = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn unchecked(mut self) -> Self {
        self.check_strings = false;
        self
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self.query, Query::Pattern { .. })
    }

    fn collect_issues(&self, issues: &mut Vec<SchemaIssue>) {
        let rule_id = || (!self.id.trim().is_empty()).then(|| self.id.clone());

        match &self.query {
            Query::Literal { search } => {
                if search.is_empty() {
                    issues.push(SchemaIssue::MissingField {
                        rule_id: rule_id(),
                        field: "query.search",
                    });
                } else if *search == self.replacement.text {
                    issues.push(SchemaIssue::InvalidCombo {
                        rule_id: rule_id(),
                        message: "search and replacement text are identical".to_string(),
                    });
                } else if self.marker.is_none() && self.replacement.text.contains(search.as_str())
                {
                    issues.push(SchemaIssue::InvalidCombo {
                        rule_id: rule_id(),
                        message: "replacement contains the search text, a marker is required"
                            .to_string(),
                    });
                }
                if self.replacement.expand {
                    issues.push(SchemaIssue::InvalidCombo {
                        rule_id: rule_id(),
                        message: "replacement.expand requires a pattern query".to_string(),
                    });
                }
            }
            Query::Pattern { pattern } => {
                if pattern.is_empty() {
                    issues.push(SchemaIssue::MissingField {
                        rule_id: rule_id(),
                        field: "query.pattern",
                    });
                } else {
                    match get_or_compile_pattern(pattern) {
                        Ok(re) => {
                            if !self.replacement.expand
                                && self.marker.is_none()
                                && re.is_match(&self.replacement.text)
                            {
                                issues.push(SchemaIssue::InvalidCombo {
                                    rule_id: rule_id(),
                                    message: "pattern matches its own replacement text"
                                        .to_string(),
                                });
                            }
                        }
                        Err(e) => issues.push(SchemaIssue::InvalidPattern {
                            rule_id: rule_id(),
                            message: e.to_string(),
                        }),
                    }
                }
            }
        }

        if let Some(marker) = &self.marker {
            if marker.is_empty() {
                issues.push(SchemaIssue::MissingField {
                    rule_id: rule_id(),
                    field: "marker",
                });
            } else if !self.replacement.expand && !self.replacement.text.contains(marker.as_str())
            {
                issues.push(SchemaIssue::InvalidCombo {
                    rule_id: rule_id(),
                    message: "marker does not occur in the replacement text".to_string(),
                });
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaError {
    pub issues: Vec<SchemaIssue>,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaIssue {
    EmptyRuleList,
    DuplicateId(String),
    MissingField {
        rule_id: Option<String>,
        field: &'static str,
    },
    InvalidPattern {
        rule_id: Option<String>,
        message: String,
    },
    InvalidCombo {
        rule_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaIssue::EmptyRuleList => write!(f, "rule set contains no rules"),
            SchemaIssue::DuplicateId(id) => write!(f, "rule id '{id}' is used more than once"),
            SchemaIssue::MissingField { rule_id, field } => match rule_id {
                Some(id) => write!(f, "rule '{id}' missing required field '{field}'"),
                None => write!(f, "rule missing required field '{field}'"),
            },
            SchemaIssue::InvalidPattern { rule_id, message } => match rule_id {
                Some(id) => write!(f, "rule '{id}' has an invalid pattern: {message}"),
                None => write!(f, "invalid pattern: {message}"),
            },
            SchemaIssue::InvalidCombo { rule_id, message } => match rule_id {
                Some(id) => write!(f, "rule '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid rule configuration: {message}"),
            },
        }
    }
}
