//! # Build Subcommand
//!
//! Compiles the selected profiles (all four by default) from the source
//! tree into `<output>/<profile>/` and writes the CSV template.

use anyhow::Result;
use clap::Args;
use dss_core::Profile;
use dss_schema::{read_version, ProfileCompiler};

use crate::config::Project;

/// Arguments for the `dss build` subcommand.
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Build only this profile (repeatable). Defaults to every profile.
    #[arg(long = "profile", value_name = "PROFILE")]
    pub profiles: Vec<Profile>,
}

/// Execute the build subcommand.
///
/// Returns exit code: 0 when every profile built from a resolved schema,
/// 1 otherwise.
pub fn run_build(args: &BuildArgs, project: &Project) -> Result<u8> {
    let profiles: Vec<Profile> = if args.profiles.is_empty() {
        Profile::all().to_vec()
    } else {
        args.profiles.clone()
    };

    let version = read_version(&project.package_json());
    let compiler = ProfileCompiler::new(project.source_dir(), project.output_dir(), version);
    tracing::info!(version = compiler.version(), profiles = profiles.len(), "building profiles");

    let report = compiler.compile_all(&profiles);

    for artifacts in &report.compiled {
        let status = if artifacts.resolved { "OK:  " } else { "FAIL:" };
        println!(
            "  {status} {} sha256:{}",
            artifacts.profile, artifacts.schema_sha256
        );
        for oversized in &artifacts.oversized {
            println!(
                "        enum of {} values at {}",
                oversized.size,
                if oversized.schema_path.is_empty() { "(root)" } else { &oversized.schema_path }
            );
        }
    }
    for (profile, reason) in &report.failed {
        println!("  FAIL: {profile}: {reason}");
    }
    if let Some(path) = &report.csv_headers {
        println!("  CSV template: {}", path.display());
    }

    let built = report.compiled.iter().filter(|a| a.resolved).count();
    println!("Build: {built}/{} profiles compiled", profiles.len());

    Ok(if report.is_success() { 0 } else { 1 })
}
