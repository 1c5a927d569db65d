//! # Logic Subcommand
//!
//! Regenerates the logic and quality-control fragments of the configured
//! column pairs in the source tree. Must run before `dss build` for the
//! build to pick up the new fragments.

use anyhow::{Context, Result};
use clap::Args;
use dss_core::ColumnPair;
use dss_schema::{regenerate_all, FragmentStore};
use dss_vocab::{FileVocabulary, RulesetRegistry};

use crate::config::Project;

/// Arguments for the `dss logic` subcommand.
#[derive(Args, Debug, Default)]
pub struct LogicArgs {
    /// Regenerate only this pair (repeatable). Defaults to every configured pair.
    #[arg(long = "pair", value_name = "FROM-TO")]
    pub pairs: Vec<ColumnPair>,
}

/// Execute the logic subcommand.
///
/// Returns exit code: 0 when every pair regenerated, 1 if any failed.
pub fn run_logic(args: &LogicArgs, project: &Project) -> Result<u8> {
    let pairs: Vec<ColumnPair> = if args.pairs.is_empty() {
        project.config().pairs.clone()
    } else {
        args.pairs.clone()
    };

    let vocabulary_dir = project.vocabulary_dir();
    let vocabulary = FileVocabulary::open(&vocabulary_dir)
        .with_context(|| format!("failed to load vocabulary from {}", vocabulary_dir.display()))?;
    let registry = RulesetRegistry::load(project.ruleset_dir(), &pairs);
    tracing::info!(
        columns = vocabulary.columns().len(),
        rulesets = registry.len(),
        pairs = pairs.len(),
        "loaded vocabulary and rulesets"
    );

    let store = FragmentStore::new(project.source_dir());
    let report = regenerate_all(&store, &registry, &vocabulary, &project.config().carve_ins, &pairs);

    for done in &report.regenerated {
        println!(
            "  OK:   {} ({} approved, {} override)",
            done.pair, done.approved, done.overrides
        );
    }
    for (pair, reason) in &report.failed {
        println!("  FAIL: {pair}: {reason}");
    }
    println!(
        "Logic: {}/{} pairs regenerated",
        report.regenerated.len(),
        pairs.len()
    );

    Ok(if report.is_success() { 0 } else { 1 })
}
