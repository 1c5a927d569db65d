//! # Build Configuration
//!
//! `dss.yaml` at the project root names the directories the build reads
//! and writes, the column pairs whose fragments are regenerated, and the
//! carve-in values merged into every logic enumeration. Every field is
//! optional; the defaults describe the standard project layout:
//!
//! ```yaml
//! source_dir: src
//! output_dir: .
//! vocabulary_dir: vocabulary
//! ruleset_dir: required
//! package_json: package.json
//! pairs:
//!   - CharacteristicName-MethodSpeciation
//! carve_ins:
//!   - Nitrogen-15/Nitrogen-14 ratio
//!   - Sulfur Delta 34
//! ```
//!
//! Relative paths are resolved against the project root.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dss_core::ColumnPair;
use dss_schema::DEFAULT_CARVE_INS;
use serde::{Deserialize, Serialize};

/// Name of the configuration file looked up at the project root.
pub const CONFIG_FILE: &str = "dss.yaml";

/// Contents of `dss.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Root schemas and fragments.
    pub source_dir: PathBuf,
    /// Where `<profile>/` and `csv/` are written.
    pub output_dir: PathBuf,
    /// One `<Column>.json` list per vocabulary column.
    pub vocabulary_dir: PathBuf,
    /// One `<pair>.json` required-if ruleset per pair.
    pub ruleset_dir: PathBuf,
    /// Package metadata holding `version`.
    pub package_json: PathBuf,
    /// Pairs regenerated by `dss logic`, in order.
    pub pairs: Vec<ColumnPair>,
    /// Values merged into every logic enumeration before subsetting.
    pub carve_ins: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("src"),
            output_dir: PathBuf::from("."),
            vocabulary_dir: PathBuf::from("vocabulary"),
            ruleset_dir: PathBuf::from("required"),
            package_json: PathBuf::from("package.json"),
            pairs: "CharacteristicName-MethodSpeciation"
                .parse::<ColumnPair>()
                .into_iter()
                .collect(),
            carve_ins: DEFAULT_CARVE_INS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// A configuration bound to the project root its paths are relative to.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    config: BuildConfig,
}

impl Project {
    /// Load the configuration for the project at `root`.
    ///
    /// `config` overrides the default `<root>/dss.yaml`. A missing default
    /// file yields the default configuration; a missing explicit file is
    /// an error.
    pub fn load(root: &Path, config: Option<&Path>) -> Result<Self> {
        let (path, required) = match config {
            Some(path) => (crate::resolve_path(path, root), true),
            None => (root.join(CONFIG_FILE), false),
        };

        let config = if path.is_file() || required {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read config {}", path.display()))?;
            if content.trim().is_empty() {
                BuildConfig::default()
            } else {
                serde_yaml::from_str(&content)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
        } else {
            tracing::debug!(root = %root.display(), "no {CONFIG_FILE}; using defaults");
            BuildConfig::default()
        };

        Ok(Self::new(root, config))
    }

    /// Bind `config` to `root`.
    pub fn new(root: &Path, config: BuildConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
        }
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The loaded configuration.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    fn at(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Absolute source directory.
    pub fn source_dir(&self) -> PathBuf {
        self.at(&self.config.source_dir)
    }

    /// Absolute output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.at(&self.config.output_dir)
    }

    /// Absolute vocabulary directory.
    pub fn vocabulary_dir(&self) -> PathBuf {
        self.at(&self.config.vocabulary_dir)
    }

    /// Absolute ruleset directory.
    pub fn ruleset_dir(&self) -> PathBuf {
        self.at(&self.config.ruleset_dir)
    }

    /// Absolute package metadata path.
    pub fn package_json(&self) -> PathBuf {
        self.at(&self.config.package_json)
    }
}

/// Walk up from `start` to the nearest directory holding `dss.yaml`,
/// also looking inside `schemas/data/` at each level.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        if dir.join(CONFIG_FILE).is_file() {
            return Some(dir.to_path_buf());
        }
        let nested = dir.join("schemas").join("data");
        if nested.join(CONFIG_FILE).is_file() {
            return Some(nested);
        }
        dir = dir.parent()?;
    }
}
