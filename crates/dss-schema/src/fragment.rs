//! # Logic & Quality-Control Fragments
//!
//! Regenerates the two per-pair fragments that encode a conditional
//! requirement between two record columns `A-B`:
//!
//! - The **logic fragment** (`src/logic/A-B.json`): when `A` holds an
//!   approved value, `B` is required. Its approved enumeration is *merged*
//!   across runs: prior values, the ruleset's values, and the carve-in values
//!   are unioned, sorted, deduplicated, and filtered through the controlled
//!   vocabulary; optional-override values are appended afterwards without
//!   vocabulary filtering.
//! - The **quality-control fragment** (`src/quality-control/A-B.json`): when
//!   `A` holds any value outside that enumeration, `B` must be absent. It is
//!   *derived* fresh every run from the logic enumeration and never merged
//!   with its own previous contents.
//!
//! ## Structure
//!
//! [`regenerate`] and [`derive_quality_control`] are pure functions of their
//! inputs. [`FragmentStore`] owns every file access, and [`regenerate_pair`]
//! wires them together for one pair.
//!
//! ## Failure Policy
//!
//! A prior fragment or override file that is missing or unparsable counts
//! as empty. A missing or malformed ruleset, or a column without a
//! vocabulary, fails that pair only.

use std::path::{Path, PathBuf};

use dss_core::{ColumnPair, GENERATED_MARKER};
use dss_vocab::{sort_values, Ruleset, RulesetRegistry, Vocabulary, VocabularyError};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Value written under the generation marker of every regenerated fragment.
pub const GENERATOR: &str = "dss logic";

/// Carve-in values not yet present in the upstream lookup.
pub const DEFAULT_CARVE_INS: &[&str] = &["Nitrogen-15/Nitrogen-14 ratio", "Sulfur Delta 34"];

/// Annotation keys carried from the previous fragment into the new one.
const CARRIED_ANNOTATIONS: &[&str] = &["title", "description", "errorMessage"];

/// Error while regenerating a pair's fragments.
#[derive(Error, Debug)]
pub enum FragmentError {
    /// Ruleset or vocabulary lookup failed.
    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),

    /// The merged document lost the `if.properties.<column>.enum` slot.
    #[error("fragment for '{0}' has no if.properties.<column>.enum")]
    MissingEnum(String),

    /// Writing a fragment failed.
    #[error("cannot write '{path}': {source}")]
    Write {
        /// Target path.
        path: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Serializing a fragment failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Which of the two per-pair documents a [`Fragment`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// Approved values make the to-column required.
    Logic,
    /// Unapproved values make the to-column disallowed.
    QualityControl,
}

/// A regenerated per-pair schema document.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pair: ColumnPair,
    kind: FragmentKind,
    document: Value,
}

impl Fragment {
    /// The column pair this fragment belongs to.
    pub fn pair(&self) -> &ColumnPair {
        &self.pair
    }

    /// Logic or quality-control.
    pub fn kind(&self) -> FragmentKind {
        self.kind
    }

    /// The schema document.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// The enumeration the fragment's condition tests the from-column against.
    ///
    /// For a logic fragment these are the approved values. For a
    /// quality-control fragment they are the values that do *not* trigger it.
    pub fn enum_values(&self) -> Vec<String> {
        let pointer = enum_pointer(&self.pair, self.kind);
        string_list(self.document.pointer(&pointer))
    }
}

fn enum_pointer(pair: &ColumnPair, kind: FragmentKind) -> String {
    let column = escape_pointer(pair.from_column());
    match kind {
        FragmentKind::Logic => format!("/if/properties/{column}/enum"),
        FragmentKind::QualityControl => format!("/if/properties/{column}/not/enum"),
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn header(id: String, prior: &Value) -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert("$id".to_string(), Value::String(id));
    doc.insert(GENERATED_MARKER.to_string(), Value::String(GENERATOR.to_string()));
    for key in CARRIED_ANNOTATIONS {
        if let Some(value) = prior.get(*key) {
            doc.insert((*key).to_string(), value.clone());
        }
    }
    doc
}

/// Fold the previous logic fragment, the ruleset, the carve-ins, and the
/// overrides into the next logic fragment.
///
/// The enumeration becomes `sort(dedupe(prior ∪ ruleset ∪ carve_ins))`
/// filtered through `vocabulary` with exact matching, followed by every
/// override value not already present.
///
/// # Errors
///
/// Returns [`FragmentError::Vocabulary`] when the from-column has no
/// vocabulary.
pub fn regenerate(
    prior: &Value,
    ruleset: &Ruleset,
    carve_ins: &[String],
    overrides: &[String],
    vocabulary: &dyn Vocabulary,
) -> Result<Fragment, FragmentError> {
    let pair = ruleset.pair().clone();
    let mut doc = header(pair.logic_uri(), prior);
    for (key, value) in ruleset.body() {
        if key == "$id" || key == GENERATED_MARKER || CARRIED_ANNOTATIONS.contains(&key.as_str()) {
            continue;
        }
        doc.insert(key.clone(), value.clone());
    }
    let mut document = Value::Object(doc);

    let prior_values = string_list(prior.pointer(&enum_pointer(&pair, FragmentKind::Logic)));
    let mut candidates: Vec<String> = prior_values
        .into_iter()
        .chain(ruleset.enum_values())
        .chain(carve_ins.iter().cloned())
        .collect();
    candidates = sort_values(candidates);
    candidates.dedup();

    let mut approved = vocabulary.subset(pair.from_column(), &candidates, false)?;
    let subset_len = approved.len();
    for value in overrides {
        if !approved.contains(value) {
            approved.push(value.clone());
        }
    }

    tracing::debug!(
        pair = %pair,
        candidates = candidates.len(),
        approved = subset_len,
        overrides = approved.len() - subset_len,
        "merged logic enumeration"
    );

    let slot = document
        .pointer_mut(&enum_pointer(&pair, FragmentKind::Logic))
        .ok_or_else(|| FragmentError::MissingEnum(pair.id()))?;
    *slot = json!(approved);

    Ok(Fragment {
        pair,
        kind: FragmentKind::Logic,
        document,
    })
}

/// Derive the quality-control fragment for `pair` from the current approved
/// enumeration.
///
/// When the from-column is present with a value outside `approved`, the
/// to-column is set to the `false` schema. Only the annotations of
/// `prior` are reused.
pub fn derive_quality_control(pair: &ColumnPair, approved: &[String], prior: &Value) -> Fragment {
    let mut doc = header(pair.quality_control_uri(), prior);
    doc.insert(
        "if".to_string(),
        json!({
            "properties": {
                pair.from_column(): { "not": { "enum": approved } }
            },
            "required": [pair.from_column()]
        }),
    );
    doc.insert(
        "then".to_string(),
        json!({
            "properties": {
                pair.to_column(): false
            }
        }),
    );
    Fragment {
        pair: pair.clone(),
        kind: FragmentKind::QualityControl,
        document: Value::Object(doc),
    }
}

/// File layout of the fragments below a schema source directory.
#[derive(Debug, Clone)]
pub struct FragmentStore {
    source_dir: PathBuf,
}

impl FragmentStore {
    /// A store rooted at the schema source directory (the one holding
    /// `logic/` and `quality-control/`).
    pub fn new(source_dir: impl AsRef<Path>) -> Self {
        Self {
            source_dir: source_dir.as_ref().to_path_buf(),
        }
    }

    /// `logic/<pair>.json`
    pub fn logic_path(&self, pair: &ColumnPair) -> PathBuf {
        self.source_dir.join("logic").join(format!("{}.json", pair.id()))
    }

    /// `quality-control/<pair>.json`
    pub fn quality_control_path(&self, pair: &ColumnPair) -> PathBuf {
        self.source_dir
            .join("quality-control")
            .join(format!("{}.json", pair.id()))
    }

    /// `quality-control/partial/<pair>-Optional.json`
    pub fn override_path(&self, pair: &ColumnPair) -> PathBuf {
        self.source_dir
            .join("quality-control")
            .join("partial")
            .join(format!("{}-Optional.json", pair.id()))
    }

    /// Read a fragment, treating a missing or unparsable file as `{}`.
    pub fn read_or_empty(&self, path: &Path) -> Value {
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()));
        match parsed {
            Ok(value) if value.is_object() => value,
            Ok(_) => {
                tracing::debug!(path = %path.display(), "fragment is not an object; treating as empty");
                json!({})
            }
            Err(reason) => {
                tracing::debug!(path = %path.display(), %reason, "fragment unavailable; treating as empty");
                json!({})
            }
        }
    }

    /// Override values for `pair`, from `{"enum": [...]}`. Empty if absent.
    pub fn read_overrides(&self, pair: &ColumnPair) -> Vec<String> {
        let doc = self.read_or_empty(&self.override_path(pair));
        string_list(doc.get("enum"))
    }

    /// Write `fragment` to its canonical location as two-space indented JSON.
    pub fn write(&self, fragment: &Fragment) -> Result<PathBuf, FragmentError> {
        let path = match fragment.kind {
            FragmentKind::Logic => self.logic_path(&fragment.pair),
            FragmentKind::QualityControl => self.quality_control_path(&fragment.pair),
        };
        let write_error = |source| FragmentError::Write {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        let json = serde_json::to_string_pretty(&fragment.document)?;
        std::fs::write(&path, json).map_err(write_error)?;
        Ok(path)
    }
}

/// Outcome of regenerating one pair.
#[derive(Debug, Clone)]
pub struct PairReport {
    /// The pair.
    pub pair: ColumnPair,
    /// Size of the approved enumeration, overrides included.
    pub approved: usize,
    /// Number of override values read.
    pub overrides: usize,
}

/// Regenerate the logic and quality-control fragments of one pair on disk.
///
/// Both files are overwritten unconditionally.
///
/// # Errors
///
/// Fails if the pair has no usable ruleset, the from-column has no
/// vocabulary, or a fragment cannot be written.
pub fn regenerate_pair(
    store: &FragmentStore,
    registry: &RulesetRegistry,
    vocabulary: &dyn Vocabulary,
    carve_ins: &[String],
    pair: &ColumnPair,
) -> Result<PairReport, FragmentError> {
    let prior = store.read_or_empty(&store.logic_path(pair));
    let ruleset = registry.get(pair)?;
    let overrides = store.read_overrides(pair);

    let logic = regenerate(&prior, ruleset, carve_ins, &overrides, vocabulary)?;
    store.write(&logic)?;

    let approved = logic.enum_values();
    let prior_qc = store.read_or_empty(&store.quality_control_path(pair));
    let quality_control = derive_quality_control(pair, &approved, &prior_qc);
    store.write(&quality_control)?;

    Ok(PairReport {
        pair: pair.clone(),
        approved: approved.len(),
        overrides: overrides.len(),
    })
}

/// Outcome of regenerating every configured pair.
#[derive(Debug, Default)]
pub struct LogicReport {
    /// Pairs whose fragments were rewritten.
    pub regenerated: Vec<PairReport>,
    /// Pairs that failed, with the reason.
    pub failed: Vec<(ColumnPair, String)>,
}

impl LogicReport {
    /// Whether every pair succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Regenerate each pair in order. A failing pair is logged and recorded;
/// the remaining pairs still run.
pub fn regenerate_all(
    store: &FragmentStore,
    registry: &RulesetRegistry,
    vocabulary: &dyn Vocabulary,
    carve_ins: &[String],
    pairs: &[ColumnPair],
) -> LogicReport {
    let mut report = LogicReport::default();
    for pair in pairs {
        match regenerate_pair(store, registry, vocabulary, carve_ins, pair) {
            Ok(done) => {
                tracing::info!(
                    pair = %pair,
                    approved = done.approved,
                    overrides = done.overrides,
                    "regenerated fragments"
                );
                report.regenerated.push(done);
            }
            Err(e) => {
                tracing::error!(pair = %pair, error = %e, "fragment regeneration failed");
                report.failed.push((pair.clone(), e.to_string()));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use dss_vocab::MemoryVocabulary;

    fn pair() -> ColumnPair {
        "CharacteristicName-MethodSpeciation".parse().unwrap()
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn carve_ins() -> Vec<String> {
        strings(DEFAULT_CARVE_INS)
    }

    fn vocabulary() -> MemoryVocabulary {
        let mut v = MemoryVocabulary::new();
        v.insert(
            "CharacteristicName",
            [
                "Ammonia",
                "Nitrate",
                "Nitrite",
                "Nitrogen-15/Nitrogen-14 ratio",
                "Phosphate",
                "Sulfur Delta 34",
            ],
        );
        v
    }

    fn ruleset(values: &[&str]) -> Ruleset {
        Ruleset::new(
            pair(),
            json!({
                "if": {
                    "properties": {"CharacteristicName": {"enum": values}},
                    "required": ["CharacteristicName"]
                },
                "then": {"required": ["MethodSpeciation"]}
            }),
        )
        .unwrap()
    }

    #[test]
    fn merges_prior_ruleset_and_carve_ins() {
        let prior = json!({
            "title": "Method speciation",
            "description": "Required for nutrient characteristics",
            "if": {"properties": {"CharacteristicName": {"enum": ["Phosphate", "Retired Value"]}}}
        });
        let logic = regenerate(
            &prior,
            &ruleset(&["Nitrate", "Ammonia", "Nitrate"]),
            &carve_ins(),
            &[],
            &vocabulary(),
        )
        .unwrap();

        assert_eq!(
            logic.enum_values(),
            strings(&[
                "Ammonia",
                "Nitrate",
                "Nitrogen-15/Nitrogen-14 ratio",
                "Phosphate",
                "Sulfur Delta 34",
            ])
        );
        let doc = logic.document();
        assert_eq!(doc["title"], "Method speciation");
        assert_eq!(doc["description"], "Required for nutrient characteristics");
        assert!(doc.get("errorMessage").is_none());
        assert_eq!(doc[GENERATED_MARKER], GENERATOR);
        assert_eq!(doc["$id"], pair().logic_uri());
        assert_eq!(doc["then"], json!({"required": ["MethodSpeciation"]}));
    }

    #[test]
    fn overrides_are_appended_unfiltered_without_duplicates() {
        let logic = regenerate(
            &json!({}),
            &ruleset(&["Nitrate"]),
            &[],
            &strings(&["Zinc Isotope", "Nitrate"]),
            &vocabulary(),
        )
        .unwrap();
        assert_eq!(logic.enum_values(), strings(&["Nitrate", "Zinc Isotope"]));
    }

    #[test]
    fn enumeration_is_sorted_before_overrides() {
        let logic = regenerate(
            &json!({}),
            &ruleset(&["Phosphate", "ammonia", "Nitrite", "Ammonia"]),
            &[],
            &strings(&["Aardvark"]),
            &vocabulary(),
        )
        .unwrap();
        let values = logic.enum_values();
        let (subset, tail) = values.split_at(values.len() - 1);
        assert_eq!(sort_values(subset.to_vec()), subset.to_vec());
        assert_eq!(tail, ["Aardvark".to_string()]);
        let mut unique = values.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), values.len());
    }

    #[test]
    fn unknown_vocabulary_column_fails() {
        let err = regenerate(
            &json!({}),
            &ruleset(&["Nitrate"]),
            &[],
            &[],
            &MemoryVocabulary::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FragmentError::Vocabulary(VocabularyError::UnknownColumn(_))));
    }

    #[test]
    fn quality_control_forbids_to_column_outside_enum() {
        let prior = json!({"errorMessage": "not applicable", "if": {"stale": true}});
        let qc = derive_quality_control(&pair(), &strings(&["Nitrate"]), &prior);
        let doc = qc.document();
        assert_eq!(doc["errorMessage"], "not applicable");
        assert_eq!(
            doc["if"],
            json!({
                "properties": {"CharacteristicName": {"not": {"enum": ["Nitrate"]}}},
                "required": ["CharacteristicName"]
            })
        );
        assert_eq!(doc["then"], json!({"properties": {"MethodSpeciation": false}}));
        assert_eq!(qc.enum_values(), strings(&["Nitrate"]));
    }

    #[test]
    fn store_round_trip_and_tolerant_reads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FragmentStore::new(dir.path());
        assert_eq!(store.read_or_empty(&store.logic_path(&pair())), json!({}));
        assert!(store.read_overrides(&pair()).is_empty());

        std::fs::create_dir_all(store.override_path(&pair()).parent().unwrap()).unwrap();
        std::fs::write(store.override_path(&pair()), "{broken").unwrap();
        assert!(store.read_overrides(&pair()).is_empty());

        std::fs::write(store.override_path(&pair()), r#"{"enum": ["Zinc Isotope"]}"#).unwrap();
        assert_eq!(store.read_overrides(&pair()), strings(&["Zinc Isotope"]));
    }

    #[test]
    fn regenerate_pair_writes_both_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let store = FragmentStore::new(dir.path());
        let mut registry = RulesetRegistry::new();
        registry.insert(ruleset(&["Nitrate"]));

        let report =
            regenerate_pair(&store, &registry, &vocabulary(), &carve_ins(), &pair()).unwrap();
        assert_eq!(report.approved, 3);

        let logic = store.read_or_empty(&store.logic_path(&pair()));
        let qc = store.read_or_empty(&store.quality_control_path(&pair()));
        assert_eq!(
            logic["if"]["properties"]["CharacteristicName"]["enum"],
            qc["if"]["properties"]["CharacteristicName"]["not"]["enum"]
        );
    }

    #[test]
    fn regenerate_all_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let store = FragmentStore::new(dir.path());
        let mut registry = RulesetRegistry::new();
        registry.insert(ruleset(&["Nitrate"]));
        let missing: ColumnPair = "CharacteristicName-ResultSampleFraction".parse().unwrap();

        let report = regenerate_all(
            &store,
            &registry,
            &vocabulary(),
            &[],
            &[missing.clone(), pair()],
        );
        assert!(!report.is_success());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, missing);
        assert_eq!(report.regenerated.len(), 1);
        assert!(!store.logic_path(&missing).exists());
    }
}
