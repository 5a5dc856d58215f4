use crate::rules::schema::{RuleSet, SchemaError};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug)]
pub enum LoadError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: SchemaError,
    },
    UnknownSet(String),
}

impl LoadError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            LoadError::Toml { path: None, source } => LoadError::Toml {
                path: Some(path),
                source,
            },
            LoadError::Validation { path: None, source } => LoadError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io { path, source } => {
                write!(f, "failed to read rules from {}: {}", path.display(), source)
            }
            LoadError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse rule file TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse rule file TOML: {}", source),
            },
            LoadError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid rule set ({}): {}", path.display(), source),
                None => write!(f, "invalid rule set: {}", source),
            },
            LoadError::UnknownSet(name) => write!(f, "no built-in rule set named '{name}'"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
            LoadError::Toml { source, .. } => Some(source),
            LoadError::Validation { source, .. } => Some(source),
            LoadError::UnknownSet(_) => None,
        }
    }
}

pub fn load_from_str(input: &str) -> Result<RuleSet, LoadError> {
    let set: RuleSet = toml_edit::de::from_str(input)
        .map_err(|source| LoadError::Toml { path: None, source })?;
    set.validate()
        .map_err(|source| LoadError::Validation { path: None, source })?;
    Ok(set)
}

/// Load a rule file. A set without `meta.name` is named after the file stem.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RuleSet, LoadError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut set = load_from_str(&contents).map_err(|error| error.with_path(path))?;

    if set.meta.name.trim().is_empty() {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            set.meta.name = stem.to_string();
        }
    }

    Ok(set)
}

/// List the `.toml` files directly inside `dir`, sorted by name.
pub fn discover_rule_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, LoadError> {
    let dir = dir.as_ref();
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).max_depth(1) {
        let entry = entry.map_err(|e| LoadError::Io {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
        {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}
