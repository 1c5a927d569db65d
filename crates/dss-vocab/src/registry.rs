//! # Required-If Ruleset Registry
//!
//! Each column pair `A-B` has a vocabulary-derived ruleset stating for which
//! values of `A` the column `B` is required:
//!
//! ```json
//! {
//!   "if": { "properties": { "A": { "enum": ["..."] } }, "required": ["A"] },
//!   "then": { "required": ["B"] }
//! }
//! ```
//!
//! The registry is an explicit map from [`ColumnPair`] to ruleset, built
//! once from the configured pair list. A pair whose file is missing or
//! malformed is remembered as such, so the failure surfaces when (and only
//! when) that pair is regenerated.

use std::collections::BTreeMap;
use std::path::Path;

use dss_core::ColumnPair;
use serde_json::{Map, Value};

use crate::VocabularyError;

/// A validated required-if ruleset for one column pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Ruleset {
    pair: ColumnPair,
    body: Map<String, Value>,
}

impl Ruleset {
    /// Validate the `if`/`then` shape of `body` for `pair`.
    ///
    /// # Errors
    ///
    /// Returns [`VocabularyError::RulesetMalformed`] unless `body` is an
    /// object with `if.properties.<From>.enum` holding only strings and a
    /// `then` schema.
    pub fn new(pair: ColumnPair, body: Value) -> Result<Self, VocabularyError> {
        let malformed = |reason: &str| VocabularyError::RulesetMalformed {
            pair: pair.id(),
            reason: reason.to_string(),
        };
        let Value::Object(body) = body else {
            return Err(malformed("ruleset must be a JSON object"));
        };
        let values = body
            .get("if")
            .and_then(|c| c.get("properties"))
            .and_then(|p| p.get(pair.from_column()))
            .and_then(|col| col.get("enum"))
            .and_then(Value::as_array)
            .ok_or_else(|| malformed("missing if.properties.<column>.enum"))?;
        if !values.iter().all(Value::is_string) {
            return Err(malformed("enum values must be strings"));
        }
        if !body.contains_key("then") {
            return Err(malformed("missing then"));
        }
        Ok(Self { pair, body })
    }

    /// The pair this ruleset belongs to.
    pub fn pair(&self) -> &ColumnPair {
        &self.pair
    }

    /// The values of the from-column that make the to-column required.
    pub fn enum_values(&self) -> Vec<String> {
        self.body
            .get("if")
            .and_then(|c| c.get("properties"))
            .and_then(|p| p.get(self.pair.from_column()))
            .and_then(|col| col.get("enum"))
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The ruleset's keywords, as authored.
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }
}

/// Rulesets for every configured column pair.
#[derive(Debug, Clone, Default)]
pub struct RulesetRegistry {
    rulesets: BTreeMap<ColumnPair, Ruleset>,
    failures: BTreeMap<ColumnPair, String>,
}

impl RulesetRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `<dir>/<pair>.json` for each pair.
    ///
    /// Never fails as a whole: a pair whose file is absent is left
    /// unregistered, and a pair whose file cannot be parsed or validated is
    /// recorded as a failure for [`RulesetRegistry::get`] to report.
    pub fn load(dir: impl AsRef<Path>, pairs: &[ColumnPair]) -> Self {
        let dir = dir.as_ref();
        let mut registry = Self::new();
        for pair in pairs {
            let path = dir.join(format!("{}.json", pair.id()));
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(pair = %pair, path = %path.display(), "ruleset file not found");
                    continue;
                }
                Err(e) => {
                    registry.failures.insert(pair.clone(), e.to_string());
                    continue;
                }
            };
            let parsed = serde_json::from_str::<Value>(&content)
                .map_err(|e| format!("invalid JSON: {e}"))
                .and_then(|body| Ruleset::new(pair.clone(), body).map_err(|e| e.to_string()));
            match parsed {
                Ok(ruleset) => registry.insert(ruleset),
                Err(reason) => {
                    tracing::warn!(pair = %pair, %reason, "ruleset rejected");
                    registry.failures.insert(pair.clone(), reason);
                }
            }
        }
        tracing::debug!(
            registered = registry.rulesets.len(),
            failed = registry.failures.len(),
            "built ruleset registry"
        );
        registry
    }

    /// Register a ruleset, replacing any previous one for its pair.
    pub fn insert(&mut self, ruleset: Ruleset) {
        self.failures.remove(ruleset.pair());
        self.rulesets.insert(ruleset.pair().clone(), ruleset);
    }

    /// Look up the ruleset for `pair`.
    ///
    /// # Errors
    ///
    /// [`VocabularyError::RulesetMissing`] if nothing was registered,
    /// [`VocabularyError::RulesetMalformed`] if loading it failed.
    pub fn get(&self, pair: &ColumnPair) -> Result<&Ruleset, VocabularyError> {
        if let Some(ruleset) = self.rulesets.get(pair) {
            return Ok(ruleset);
        }
        match self.failures.get(pair) {
            Some(reason) => Err(VocabularyError::RulesetMalformed {
                pair: pair.id(),
                reason: reason.clone(),
            }),
            None => Err(VocabularyError::RulesetMissing(pair.id())),
        }
    }

    /// Pairs with a usable ruleset, sorted.
    pub fn pairs(&self) -> impl Iterator<Item = &ColumnPair> {
        self.rulesets.keys()
    }

    /// Number of usable rulesets.
    pub fn len(&self) -> usize {
        self.rulesets.len()
    }

    /// Whether no ruleset is usable.
    pub fn is_empty(&self) -> bool {
        self.rulesets.is_empty()
    }
}
