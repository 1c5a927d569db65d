//! Integration test: run the `logic`, `build`, and `validate` handlers in
//! sequence over a copy of the fixture project at `schemas/data/`.

use std::path::{Path, PathBuf};

use dss_cli::build::{run_build, BuildArgs};
use dss_cli::config::Project;
use dss_cli::logic::{run_logic, LogicArgs};
use dss_cli::validate::{run_validate, ValidateArgs};
use dss_core::Profile;

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

#[test]
fn logic_then_build_then_validate() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("data");
    copy_dir(&repo_root().join("schemas").join("data"), &root);
    let project = Project::load(&root, None).unwrap();
    assert_eq!(project.config().pairs.len(), 1);

    assert_eq!(run_logic(&LogicArgs::default(), &project).unwrap(), 0);
    assert_eq!(run_build(&BuildArgs::default(), &project).unwrap(), 0);

    let records = root.join("records.json");
    std::fs::write(
        &records,
        r#"[
            {"CharacteristicName": "Nitrate", "MethodSpeciation": "as N"},
            {"CharacteristicName": "pH"}
        ]"#,
    )
    .unwrap();
    let args = ValidateArgs {
        profile: Profile::QualityControl,
        path: records.clone(),
        show_prepared: false,
    };
    assert_eq!(run_validate(&args, &project).unwrap(), 0);

    std::fs::write(&records, r#"{"CharacteristicName": "pH", "MethodSpeciation": "as N"}"#).unwrap();
    assert_eq!(run_validate(&args, &project).unwrap(), 1);

    let primary = ValidateArgs {
        profile: Profile::Primary,
        path: records,
        show_prepared: true,
    };
    assert_eq!(run_validate(&primary, &project).unwrap(), 1);
}
