//! Integration test: regenerate the logic and quality-control fragments of
//! the fixture project and check the merge properties.

use std::path::{Path, PathBuf};

use dss_core::{ColumnPair, Profile};
use dss_schema::{
    regenerate_all, CompiledValidator, FragmentStore, DEFAULT_CARVE_INS,
};
use dss_vocab::{sort_values, FileVocabulary, RulesetRegistry};
use serde_json::{json, Value};

/// Find the repository root.
fn repo_root() -> PathBuf {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.pop(); // crates/
    dir.pop(); // repo root
    dir
}

fn copy_dir(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap().flatten() {
        let target = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), target).unwrap();
        }
    }
}

fn pair() -> ColumnPair {
    "CharacteristicName-MethodSpeciation".parse().unwrap()
}

fn carve_ins() -> Vec<String> {
    DEFAULT_CARVE_INS.iter().map(|s| s.to_string()).collect()
}

fn read(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn logic_enum(store: &FragmentStore) -> Vec<String> {
    let doc = read(&store.logic_path(&pair()));
    doc["if"]["properties"]["CharacteristicName"]["enum"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

struct Project {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Project {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        copy_dir(&repo_root().join("schemas").join("data"), &root);
        Self { _dir: dir, root }
    }

    fn store(&self) -> FragmentStore {
        FragmentStore::new(self.root.join("src"))
    }

    fn run(&self) -> dss_schema::LogicReport {
        let vocabulary = FileVocabulary::open(self.root.join("vocabulary")).unwrap();
        let registry = RulesetRegistry::load(self.root.join("required"), &[pair()]);
        regenerate_all(&self.store(), &registry, &vocabulary, &carve_ins(), &[pair()])
    }
}

#[test]
fn checked_in_fragments_are_a_fixed_point() {
    let project = Project::new();
    let store = project.store();
    let logic_before = read(&store.logic_path(&pair()));
    let qc_before = read(&store.quality_control_path(&pair()));

    let report = project.run();
    assert!(report.is_success(), "{:?}", report.failed);

    assert_eq!(read(&store.logic_path(&pair())), logic_before);
    assert_eq!(read(&store.quality_control_path(&pair())), qc_before);
}

#[test]
fn merged_enumeration_properties() {
    let project = Project::new();
    let store = project.store();
    project.run();

    let values = logic_enum(&store);
    for carve_in in DEFAULT_CARVE_INS {
        assert!(values.iter().any(|v| v == carve_in), "missing carve-in {carve_in}");
    }
    assert!(values.iter().any(|v| v == "Total Phosphorus, mixed forms"));
    assert!(!values.iter().any(|v| v == "Ammonia-nitrogen"));

    let mut unique = values.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), values.len());
    assert_eq!(sort_values(values.clone()), values);
}

#[test]
fn missing_prior_fragments_are_rebuilt_from_ruleset() {
    let project = Project::new();
    let store = project.store();
    std::fs::remove_file(store.logic_path(&pair())).unwrap();
    std::fs::remove_file(store.quality_control_path(&pair())).unwrap();
    std::fs::remove_file(store.override_path(&pair())).unwrap();

    let report = project.run();
    assert!(report.is_success());

    let logic = read(&store.logic_path(&pair()));
    assert!(logic.get("title").is_none());
    assert_eq!(logic["$generated"], "dss logic");
    assert_eq!(
        logic_enum(&store),
        vec![
            "Ammonia",
            "Inorganic nitrogen (nitrate and nitrite)",
            "Nitrate",
            "Nitrite",
            "Nitrogen-15/Nitrogen-14 ratio",
            "Orthophosphate",
            "Phosphate",
            "Sulfur Delta 34",
        ]
    );

    let qc = read(&store.quality_control_path(&pair()));
    assert!(qc.get("errorMessage").is_none());
    assert_eq!(
        qc["if"]["properties"]["CharacteristicName"]["not"]["enum"],
        logic["if"]["properties"]["CharacteristicName"]["enum"]
    );
}

#[test]
fn overrides_appended_after_sorted_subset() {
    let project = Project::new();
    let store = project.store();
    std::fs::remove_file(store.logic_path(&pair())).unwrap();
    std::fs::write(
        store.override_path(&pair()),
        r#"{"enum": ["Zinc isotope ratio", "Nitrate"]}"#,
    )
    .unwrap();

    project.run();
    let values = logic_enum(&store);
    assert_eq!(values.last().map(String::as_str), Some("Zinc isotope ratio"));
    assert_eq!(values.iter().filter(|v| *v == "Nitrate").count(), 1);
    let subset = &values[..values.len() - 1];
    assert_eq!(sort_values(subset.to_vec()), subset.to_vec());
}

#[test]
fn missing_ruleset_fails_only_that_pair() {
    let project = Project::new();
    let vocabulary = FileVocabulary::open(project.root.join("vocabulary")).unwrap();
    let unknown: ColumnPair = "CharacteristicName-ResultSampleFraction".parse().unwrap();
    let pairs = [unknown.clone(), pair()];
    let registry = RulesetRegistry::load(project.root.join("required"), &pairs);

    let report = regenerate_all(&project.store(), &registry, &vocabulary, &carve_ins(), &pairs);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, unknown);
    assert_eq!(report.regenerated.len(), 1);
}

#[test]
fn quality_control_triggers_exactly_outside_enumeration() {
    let project = Project::new();
    let store = project.store();
    project.run();

    let approved = logic_enum(&store);
    let qc = read(&store.quality_control_path(&pair()));
    let validator =
        CompiledValidator::compile(qc, Profile::QualityControl.spec().validator).unwrap();

    let vocabulary: Vec<String> = serde_json::from_value(read(
        &project.root.join("vocabulary").join("CharacteristicName.json"),
    ))
    .unwrap();
    for characteristic in vocabulary {
        let mut with = json!({"CharacteristicName": characteristic, "MethodSpeciation": "as N"});
        let mut without = json!({"CharacteristicName": characteristic});
        let is_approved = approved.contains(&characteristic);
        assert_eq!(validator.is_valid(&mut with), is_approved, "{characteristic}");
        assert!(validator.is_valid(&mut without), "{characteristic}");
    }
}
