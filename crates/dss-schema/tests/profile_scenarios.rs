//! Integration test: build every profile from the fixture project at
//! `schemas/data/` and validate records against the shipped bundles.
//!
//! The fixture is copied into a scratch directory first so that the
//! checked-in tree is never written to.

use std::path::{Path, PathBuf};

use dss_core::Profile;
use dss_schema::{read_version, CompiledValidator, ProfileCompiler, StandaloneBundle};
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

struct Build {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Build {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        copy_dir(&repo_root().join("schemas").join("data"), &root);

        let version = read_version(&root.join("package.json"));
        let compiler = ProfileCompiler::new(root.join("src"), &root, version);
        let report = compiler.compile_all(Profile::all());
        assert!(report.is_success(), "build failed: {:?}", report.failed);
        Self { _dir: dir, root }
    }

    fn validator(&self, profile: Profile) -> CompiledValidator {
        let path = self.root.join(profile.as_str()).join("validator.json");
        StandaloneBundle::load(&path).unwrap().into_validator().unwrap()
    }

    fn schema(&self, profile: Profile) -> Value {
        let path = self.root.join(profile.as_str()).join("index.json");
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }
}

fn valid_record() -> Value {
    json!({
        "DatasetName": "Bow River Monitoring",
        "MonitoringLocationID": "BR-01",
        "MonitoringLocationName": "Bow River at Cochrane",
        "MonitoringLocationLatitude": 51.1894,
        "MonitoringLocationLongitude": -114.4672,
        "MonitoringLocationHorizontalCoordinateReferenceSystem": "WGS84",
        "MonitoringLocationType": "River/Stream",
        "ActivityType": "Sample-Routine",
        "ActivityMediaName": "Water",
        "ActivityStartDate": "2023-06-14",
        "ActivityStartTime": "09:30",
        "CharacteristicName": "Nitrate",
        "MethodSpeciation": "as N",
        "ResultValue": 0.42,
        "ResultUnit": "mg/L",
        "ResultAnalyticalMethodName": "EPA 353.2"
    })
}

#[test]
fn empty_record_gets_defaults_and_required_errors() {
    let build = Build::new();
    let validator = build.validator(Profile::Primary);

    let mut data = json!({});
    let errors = validator.validate(&mut data).unwrap_err();

    assert_eq!(data["MonitoringLocationHorizontalCoordinateReferenceSystem"], "UNKWN");
    assert_eq!(data["ActivityMediaName"], "Water");
    assert_eq!(data.as_object().unwrap().len(), 2);

    let schema = build.schema(Profile::Primary);
    for property in schema["required"].as_array().unwrap() {
        let property = property.as_str().unwrap();
        let defaulted = property == "MonitoringLocationHorizontalCoordinateReferenceSystem"
            || property == "ActivityMediaName";
        assert_eq!(
            errors.has_missing_property("required", property),
            !defaulted,
            "required error for {property}"
        );
    }
}

#[test]
fn either_of_two_properties_is_required() {
    let build = Build::new();
    let validator = build.validator(Profile::Primary);

    let errors = validator.validate(&mut json!({})).unwrap_err();
    for property in [
        "ResultValue",
        "ResultDetectionCondition",
        "ResultAnalyticalMethodID",
        "ResultAnalyticalMethodName",
    ] {
        assert!(errors.has_missing_property("required", property), "{property}");
    }

    let errors = validator
        .validate(&mut json!({"ResultValue": true, "ResultAnalyticalMethodID": true}))
        .unwrap_err();
    assert!(!errors.has_missing_property("required", "ResultDetectionCondition"));
    assert!(!errors.has_missing_property("required", "ResultAnalyticalMethodName"));

    let errors = validator
        .validate(&mut json!({"ResultDetectionCondition": true, "ResultAnalyticalMethodName": true}))
        .unwrap_err();
    assert!(!errors.has_missing_property("required", "ResultValue"));
    assert!(!errors.has_missing_property("required", "ResultAnalyticalMethodID"));
}

#[test]
fn detection_condition_switches_quantitation_limit() {
    let build = Build::new();
    let validator = build.validator(Profile::Primary);

    for condition in ["Present Above Quantification Limit", "Present Below Quantification Limit"] {
        let errors = validator
            .validate(&mut json!({"ResultDetectionCondition": condition}))
            .unwrap_err();
        assert!(errors.has_missing_property("dependencies", "ResultDetectionQuantitationLimitMeasure"));
    }

    let errors = validator
        .validate(&mut json!({"ResultDetectionCondition": ""}))
        .unwrap_err();
    assert!(!errors.has_missing_property("dependencies", "ResultDetectionQuantitationLimitMeasure"));
}

#[test]
fn property_dependencies() {
    let build = Build::new();
    let validator = build.validator(Profile::Primary);
    let cases = [
        ("ActivityDepthHeightMeasure", vec!["ActivityDepthHeightUnit"]),
        ("ResultValue", vec!["ResultUnit"]),
        (
            "ResultDetectionQuantitationLimitMeasure",
            vec!["ResultDetectionQuantitationLimitUnit", "ResultDetectionQuantitationLimitType"],
        ),
        ("ResultAnalyticalMethodID", vec!["ResultAnalyticalMethodContext"]),
    ];
    for (present, missing) in cases {
        let mut data = json!({ present: 1 });
        let errors = validator.validate(&mut data).unwrap_err();
        for property in missing {
            assert!(
                errors.has_missing_property("dependencies", property),
                "{present} should require {property}"
            );
        }
    }
}

#[test]
fn quality_control_forbids_speciation_for_unapproved_characteristic() {
    let build = Build::new();
    let validator = build.validator(Profile::QualityControl);

    let mut flagged = json!({"CharacteristicName": "Dissolved oxygen (DO)", "MethodSpeciation": "as N"});
    let errors = validator.validate(&mut flagged).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.violations()[0].keyword, "errorMessage");
    assert_eq!(
        errors.violations()[0].message,
        "MethodSpeciation is not applicable to this CharacteristicName"
    );

    assert!(validator.is_valid(&mut json!({"CharacteristicName": "Dissolved oxygen (DO)"})));
    assert!(validator.is_valid(&mut json!({"CharacteristicName": "Nitrate", "MethodSpeciation": "as N"})));
    assert!(validator.is_valid(
        &mut json!({"CharacteristicName": "Total Phosphorus, mixed forms", "MethodSpeciation": "as P"})
    ));
}

#[test]
fn valid_record_passes_primary_frontend_and_backend() {
    let build = Build::new();
    for profile in [Profile::Primary, Profile::Frontend, Profile::Backend] {
        let validator = build.validator(profile);
        let mut data = valid_record();
        validator
            .validate(&mut data)
            .unwrap_or_else(|e| panic!("{profile} rejected a valid record:\n{e}"));
    }
}

#[test]
fn coercion_follows_profile_trust_boundary() {
    let build = Build::new();
    let mut record = valid_record();
    record["ResultValue"] = json!("0.42");
    record["MonitoringLocationLatitude"] = json!("51.1894");

    let primary = build.validator(Profile::Primary);
    let errors = primary.validate(&mut record.clone()).unwrap_err();
    assert!(errors.violations().iter().all(|v| v.keyword == "type"));
    assert_eq!(errors.len(), 2);

    for profile in [Profile::Frontend, Profile::Backend] {
        let mut data = record.clone();
        build.validator(profile).validate(&mut data).unwrap();
        assert_eq!(data["ResultValue"], json!(0.42));
    }
}

#[test]
fn error_messages_only_where_kept() {
    let build = Build::new();
    let mut record = valid_record();
    record["MonitoringLocationLatitude"] = json!(95);

    let primary = build.validator(Profile::Primary).validate(&mut record.clone()).unwrap_err();
    assert_eq!(primary.violations()[0].keyword, "maximum");

    let frontend = build.validator(Profile::Frontend).validate(&mut record.clone()).unwrap_err();
    assert_eq!(frontend.violations()[0].keyword, "errorMessage");
    assert_eq!(frontend.violations()[0].instance_path, "/MonitoringLocationLatitude");
    assert_eq!(
        frontend.violations()[0].message,
        "MonitoringLocationLatitude must be decimal degrees between -90 and 90"
    );

    let backend = build.validator(Profile::Backend).validate(&mut record).unwrap_err();
    assert_eq!(backend.violations()[0].keyword, "maximum");
}

#[test]
fn transforms_normalise_enum_case() {
    let build = Build::new();
    let mut record = valid_record();
    record["ActivityMediaName"] = json!("  water ");
    record["ResultUnit"] = json!("MG/L");
    build.validator(Profile::Primary).validate(&mut record).unwrap();
    assert_eq!(record["ActivityMediaName"], "Water");
    assert_eq!(record["ResultUnit"], "mg/L");
}

#[test]
fn artifacts_are_pruned_and_styled_per_profile() {
    let build = Build::new();

    let primary_text =
        std::fs::read_to_string(build.root.join("primary").join("index.json")).unwrap();
    assert!(primary_text.contains('\n'));
    let primary = build.schema(Profile::Primary);
    assert_eq!(primary["version"], "2.4.0");
    assert!(!primary_text.contains("errorMessage"));
    assert!(!primary_text.contains("$generated"));
    assert!(primary_text.contains("\"title\""));

    let frontend_text =
        std::fs::read_to_string(build.root.join("frontend").join("index.json")).unwrap();
    assert!(!frontend_text.contains('\n'));
    assert!(frontend_text.contains("errorMessage"));
    assert!(!frontend_text.contains("\"title\""));
    assert!(!frontend_text.contains("\"description\""));

    let backend_text =
        std::fs::read_to_string(build.root.join("backend").join("index.json")).unwrap();
    for key in ["errorMessage", "\"title\"", "\"description\"", "$generated"] {
        assert!(!backend_text.contains(key), "backend kept {key}");
    }

    let qc_text =
        std::fs::read_to_string(build.root.join("quality-control").join("index.json")).unwrap();
    assert!(!qc_text.contains("$generated"));
    assert!(qc_text.contains("\"title\""));

    let module =
        std::fs::read_to_string(build.root.join("frontend").join("index.json.js")).unwrap();
    assert_eq!(module, format!("export default {frontend_text}"));

    let headers =
        std::fs::read_to_string(build.root.join("csv").join("headers.csv")).unwrap();
    assert!(headers.starts_with("\"DatasetName\",\"MonitoringLocationID\","));
    assert!(headers.ends_with("\"ResultComment\"\r\n"));
}
