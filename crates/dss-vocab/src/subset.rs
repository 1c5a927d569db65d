//! # Vocabulary Subsetter
//!
//! Filters candidate enum values against an authoritative controlled
//! vocabulary. With exact matching only values spelled exactly as in the
//! vocabulary survive. With fuzzy matching a candidate also matches when it
//! differs only in letter case or internal whitespace, and the vocabulary's
//! own spelling is returned.
//!
//! The result keeps candidate order and never contains duplicates.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::VocabularyError;

/// Source of controlled vocabularies, keyed by column name.
pub trait Vocabulary {
    /// The accepted values for `column`, in vocabulary order.
    fn values(&self, column: &str) -> Result<&[String], VocabularyError>;

    /// Keep only the `candidates` the vocabulary for `column` accepts.
    ///
    /// # Errors
    ///
    /// Returns [`VocabularyError::UnknownColumn`] when no list exists for
    /// `column`.
    fn subset(
        &self,
        column: &str,
        candidates: &[String],
        fuzzy: bool,
    ) -> Result<Vec<String>, VocabularyError> {
        let accepted = self.values(column)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        if fuzzy {
            let by_key: HashMap<String, &String> =
                accepted.iter().map(|v| (fold(v), v)).collect();
            for candidate in candidates {
                if let Some(canonical) = by_key.get(&fold(candidate)) {
                    if seen.insert(canonical.as_str()) {
                        out.push((*canonical).clone());
                    }
                }
            }
        } else {
            let exact: HashSet<&str> = accepted.iter().map(String::as_str).collect();
            for candidate in candidates {
                if exact.contains(candidate.as_str()) && seen.insert(candidate.as_str()) {
                    out.push(candidate.clone());
                }
            }
        }

        tracing::debug!(
            column,
            candidates = candidates.len(),
            accepted = out.len(),
            fuzzy,
            "subset against controlled vocabulary"
        );
        Ok(out)
    }
}

fn fold(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Order enum values case-insensitively, breaking ties by exact spelling.
pub fn sort_values(mut values: Vec<String>) -> Vec<String> {
    values.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
    values
}

/// Vocabulary lists held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryVocabulary {
    columns: BTreeMap<String, Vec<String>>,
}

impl MemoryVocabulary {
    /// An empty vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the list for a column.
    pub fn insert<I, S>(&mut self, column: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns
            .insert(column.into(), values.into_iter().map(Into::into).collect());
    }

    /// Names of all columns with a list, sorted.
    pub fn columns(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }
}

impl Vocabulary for MemoryVocabulary {
    fn values(&self, column: &str) -> Result<&[String], VocabularyError> {
        self.columns
            .get(column)
            .map(Vec::as_slice)
            .ok_or_else(|| VocabularyError::UnknownColumn(column.to_string()))
    }
}

/// Vocabulary lists read from a directory of `<Column>.json` files.
///
/// Each file holds a JSON array of strings. All files are read once at
/// construction.
#[derive(Debug, Clone)]
pub struct FileVocabulary {
    dir: PathBuf,
    inner: MemoryVocabulary,
}

impl FileVocabulary {
    /// Load every `*.json` list in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`VocabularyError::LoadError`] if the directory cannot be
    /// read or a file is not a JSON array of strings.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, VocabularyError> {
        let dir = dir.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&dir).map_err(|e| VocabularyError::LoadError {
            path: dir.display().to_string(),
            reason: format!("cannot read vocabulary directory: {e}"),
        })?;

        let mut inner = MemoryVocabulary::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(column) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let values = read_list(&path)?;
            tracing::trace!(column, count = values.len(), "loaded vocabulary list");
            inner.insert(column, values);
        }

        Ok(Self { dir, inner })
    }

    /// Directory the lists were read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of all columns with a list, sorted.
    pub fn columns(&self) -> Vec<&str> {
        self.inner.columns()
    }
}

impl Vocabulary for FileVocabulary {
    fn values(&self, column: &str) -> Result<&[String], VocabularyError> {
        self.inner.values(column)
    }
}

fn read_list(path: &Path) -> Result<Vec<String>, VocabularyError> {
    let load_error = |reason: String| VocabularyError::LoadError {
        path: path.display().to_string(),
        reason,
    };
    let content = std::fs::read_to_string(path)?;
    let value: Value =
        serde_json::from_str(&content).map_err(|e| load_error(format!("invalid JSON: {e}")))?;
    let Value::Array(items) = value else {
        return Err(load_error("expected a JSON array".to_string()));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(load_error(format!("non-string entry {other}"))),
        })
        .collect()
}
