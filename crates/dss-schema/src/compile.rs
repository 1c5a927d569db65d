//! # Profile Compiler
//!
//! Turns the source tree into the shipped artifacts of each profile:
//!
//! ```text
//! <output>/<profile>/index.json       resolved + pruned schema
//! <output>/<profile>/index.json.js    `export default <schema>`
//! <output>/<profile>/validator.json   standalone validator bundle
//! <output>/csv/headers.csv            primary column template
//! ```
//!
//! ## Pipeline
//!
//! resolve `<source>/<profile>.json` → stamp `version` → prune the
//! profile's keys → serialize (pretty or minified) → compile the validator
//! → write.
//!
//! ## Failure Policy
//!
//! A profile whose root cannot be resolved is logged and built from `{}`
//! so the remaining profiles are unaffected. Other failures (write errors,
//! a schema the engine rejects) fail that profile only; [`ProfileCompiler::compile_all`]
//! records them and carries on.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dss_core::{prune_keys, subschemas, visit_schemas, OutputStyle, Profile, PruneKeys};
use serde_json::{json, Value};
use thiserror::Error;

use crate::bundle::{schema_digest, StandaloneBundle};
use crate::resolve::Dereferencer;
use crate::template::write_headers;
use crate::validate::{CompiledValidator, SchemaValidationError};

/// Version used when the package metadata is missing or unreadable.
pub const FALLBACK_VERSION: &str = "0.0.0";

/// Error while building one profile's artifacts.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Writing an artifact failed.
    #[error("cannot write '{path}': {source}")]
    Write {
        /// Target path.
        path: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Serializing an artifact failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The validator could not be compiled.
    #[error(transparent)]
    Validator(#[from] SchemaValidationError),
}

/// Read `version` from a `package.json`, falling back to [`FALLBACK_VERSION`].
pub fn read_version(package_json: &Path) -> String {
    let version = std::fs::read_to_string(package_json)
        .ok()
        .and_then(|content| serde_json::from_str::<Value>(&content).ok())
        .and_then(|meta| meta.get("version").and_then(Value::as_str).map(str::to_string));
    match version {
        Some(v) => v,
        None => {
            tracing::debug!(path = %package_json.display(), "no package version; using fallback");
            FALLBACK_VERSION.to_string()
        }
    }
}

/// An `enum` longer than the profile's ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OversizedEnum {
    /// JSON Pointer to the schema holding the `enum`.
    pub schema_path: String,
    /// Number of values.
    pub size: usize,
}

/// Collect every `enum` in `schema` longer than `ceiling`.
pub fn oversized_enums(schema: &Value, ceiling: usize) -> Vec<OversizedEnum> {
    fn walk(schema: &Value, path: String, ceiling: usize, out: &mut Vec<OversizedEnum>) {
        if let Some(size) = schema.get("enum").and_then(Value::as_array).map(Vec::len) {
            if size > ceiling {
                out.push(OversizedEnum {
                    schema_path: path.clone(),
                    size,
                });
            }
        }
        for child in subschemas(schema) {
            let mut child_path = format!("{path}/{}", child.keyword);
            if let Some(name) = child.name {
                child_path.push('/');
                child_path.push_str(&name.replace('~', "~0").replace('/', "~1"));
            }
            if let Some(index) = child.index {
                child_path.push_str(&format!("/{index}"));
            }
            walk(child.schema, child_path, ceiling, out);
        }
    }
    let mut out = Vec::new();
    walk(schema, String::new(), ceiling, &mut out);
    out
}

/// What one profile build produced.
#[derive(Debug, Clone)]
pub struct ProfileArtifacts {
    /// The profile.
    pub profile: Profile,
    /// `index.json`.
    pub schema_path: PathBuf,
    /// `index.json.js`.
    pub module_path: PathBuf,
    /// `validator.json`.
    pub bundle_path: PathBuf,
    /// SHA-256 of the compact schema serialization.
    pub schema_sha256: String,
    /// False when resolution failed and the profile was built from `{}`.
    pub resolved: bool,
    /// Enumerations above the profile's ceiling.
    pub oversized: Vec<OversizedEnum>,
}

/// Outcome of building several profiles.
#[derive(Debug)]
pub struct BuildReport {
    /// When the build started.
    pub started_at: DateTime<Utc>,
    /// Profiles whose artifacts were written.
    pub compiled: Vec<ProfileArtifacts>,
    /// Profiles that failed, with the reason.
    pub failed: Vec<(Profile, String)>,
    /// The CSV template, when the primary profile was built.
    pub csv_headers: Option<PathBuf>,
}

impl BuildReport {
    /// True when every profile was built from a resolved schema.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.compiled.iter().all(|a| a.resolved)
    }
}

/// Builds profile artifacts from a schema source tree.
#[derive(Debug, Clone)]
pub struct ProfileCompiler {
    source_dir: PathBuf,
    output_dir: PathBuf,
    version: String,
}

impl ProfileCompiler {
    /// A compiler reading roots from `source_dir` and writing below `output_dir`.
    pub fn new(
        source_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            source_dir: source_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            version: version.into(),
        }
    }

    /// Version stamped onto resolved schemas.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Root schema file of `profile`.
    pub fn root_path(&self, profile: Profile) -> PathBuf {
        self.source_dir.join(format!("{profile}.json"))
    }

    /// Output directory of `profile`.
    pub fn profile_dir(&self, profile: Profile) -> PathBuf {
        self.output_dir.join(profile.as_str())
    }

    /// Resolve the root schema of `profile` and stamp the version on it.
    ///
    /// Returns `None` in place of an error: the failure is logged and the
    /// caller builds from `{}`.
    pub fn resolve(&self, profile: Profile) -> Option<Value> {
        let mut dereferencer = Dereferencer::new(&self.source_dir);
        match dereferencer.dereference(self.root_path(profile)) {
            Ok(mut schema) => {
                if let Some(map) = schema.as_object_mut() {
                    map.insert("version".to_string(), Value::String(self.version.clone()));
                }
                Some(schema)
            }
            Err(e) => {
                tracing::error!(profile = %profile, error = %e, "schema resolution failed; building from empty schema");
                None
            }
        }
    }

    /// Build and write the artifacts of one profile.
    ///
    /// # Errors
    ///
    /// Fails if an artifact cannot be written or the engine rejects the
    /// schema. Resolution failure is not an error; see [`ProfileArtifacts::resolved`].
    pub fn compile(&self, profile: Profile) -> Result<ProfileArtifacts, BuildError> {
        self.compile_schema(profile).map(|(artifacts, _)| artifacts)
    }

    fn compile_schema(&self, profile: Profile) -> Result<(ProfileArtifacts, Value), BuildError> {
        let spec = profile.spec();
        let resolved = self.resolve(profile);
        let is_resolved = resolved.is_some();
        let mut schema = resolved.unwrap_or_else(|| json!({}));

        let removed = prune_keys(&mut schema, &PruneKeys::new(spec.pruned_keys.iter().copied()));
        let mut nodes = 0usize;
        visit_schemas(&schema, &mut |_| nodes += 1);
        tracing::debug!(profile = %profile, removed, nodes, "pruned schema");

        let oversized = oversized_enums(&schema, spec.validator.enum_ceiling);
        for found in &oversized {
            tracing::warn!(
                profile = %profile,
                schema_path = %found.schema_path,
                size = found.size,
                ceiling = spec.validator.enum_ceiling,
                "enum exceeds profile ceiling"
            );
        }

        let json = match spec.output {
            OutputStyle::Pretty => serde_json::to_string_pretty(&schema)?,
            OutputStyle::Minified => serde_json::to_string(&schema)?,
        };

        let validator = CompiledValidator::compile(schema.clone(), spec.validator.clone())?;
        let bundle = StandaloneBundle::new(profile, self.version.clone(), &validator);
        let bundle_json = match spec.output {
            OutputStyle::Pretty => serde_json::to_string_pretty(&bundle)?,
            OutputStyle::Minified => serde_json::to_string(&bundle)?,
        };

        let dir = self.profile_dir(profile);
        let schema_path = dir.join("index.json");
        let module_path = dir.join("index.json.js");
        let bundle_path = dir.join("validator.json");
        create_dir(&dir)?;
        write(&schema_path, &json)?;
        write(&module_path, &format!("export default {json}"))?;
        write(&bundle_path, &bundle_json)?;

        let artifacts = ProfileArtifacts {
            profile,
            schema_path,
            module_path,
            bundle_path,
            schema_sha256: schema_digest(&schema),
            resolved: is_resolved,
            oversized,
        };
        Ok((artifacts, schema))
    }

    /// Build each of `profiles` in order, then the CSV template if the
    /// primary profile succeeded.
    pub fn compile_all(&self, profiles: &[Profile]) -> BuildReport {
        let mut report = BuildReport {
            started_at: Utc::now(),
            compiled: Vec::new(),
            failed: Vec::new(),
            csv_headers: None,
        };
        for &profile in profiles {
            match self.compile_schema(profile) {
                Ok((artifacts, schema)) => {
                    tracing::info!(
                        profile = %profile,
                        version = %self.version,
                        sha256 = %artifacts.schema_sha256,
                        resolved = artifacts.resolved,
                        "compiled profile"
                    );
                    if profile == Profile::Primary {
                        match write_headers(&self.output_dir, &schema) {
                            Ok(path) => report.csv_headers = Some(path),
                            Err(e) => {
                                tracing::error!(error = %e, "cannot write CSV template");
                                report.failed.push((profile, format!("csv template: {e}")));
                            }
                        }
                    }
                    report.compiled.push(artifacts);
                }
                Err(e) => {
                    tracing::error!(profile = %profile, error = %e, "profile build failed");
                    report.failed.push((profile, e.to_string()));
                }
            }
        }
        report
    }
}

fn create_dir(dir: &Path) -> Result<(), BuildError> {
    std::fs::create_dir_all(dir).map_err(|source| BuildError::Write {
        path: dir.display().to_string(),
        source,
    })
}

fn write(path: &Path, content: &str) -> Result<(), BuildError> {
    std::fs::write(path, content).map_err(|source| BuildError::Write {
        path: path.display().to_string(),
        source,
    })
}
