//! # Validate Subcommand
//!
//! Validates a file of records against a built profile. The validator is
//! rebuilt from the profile's standalone bundle, so only the build output
//! is needed, not the source tree.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use dss_core::Profile;
use dss_schema::{load_records, StandaloneBundle};

use crate::config::Project;

/// Arguments for the `dss validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Profile whose validator to use.
    #[arg(long, value_name = "PROFILE")]
    pub profile: Profile,

    /// JSON (or YAML) file holding one record or an array of records.
    #[arg(value_name = "FILE")]
    pub path: PathBuf,

    /// Print each record after defaults and coercion were applied.
    #[arg(long)]
    pub show_prepared: bool,
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 when every record is valid, 1 if any is invalid.
pub fn run_validate(args: &ValidateArgs, project: &Project) -> Result<u8> {
    let bundle_path = bundle_path(project, args.profile);
    let bundle = StandaloneBundle::load(&bundle_path)
        .with_context(|| format!("failed to load the {} validator; run `dss build` first", args.profile))?;
    tracing::debug!(profile = %args.profile, version = %bundle.version, "loaded validator bundle");
    let validator = bundle.into_validator()?;

    let path = crate::resolve_path(&args.path, project.root());
    let records = load_records(&path)?;

    let mut invalid = 0usize;
    for (index, mut record) in records.into_iter().enumerate() {
        let outcome = validator.validate(&mut record);
        if args.show_prepared {
            println!("  [{index}] {}", serde_json::to_string(&record)?);
        }
        match outcome {
            Ok(()) => println!("  OK:   record {index}"),
            Err(violations) => {
                invalid += 1;
                println!("  FAIL: record {index} ({} violation(s))", violations.len());
                println!("{violations}");
            }
        }
    }

    println!("Records: {invalid} invalid ({})", path.display());
    Ok(if invalid == 0 { 0 } else { 1 })
}

fn bundle_path(project: &Project, profile: Profile) -> PathBuf {
    project
        .output_dir()
        .join(profile.as_str())
        .join("validator.json")
}
