//! # Standalone Validator Bundle
//!
//! The shipped form of a compiled validator: one self-describing JSON file
//! holding the pruned schema together with the configuration it must be
//! compiled under. Loading a bundle and calling [`StandaloneBundle::into_validator`]
//! reproduces the build-time validator exactly; no source tree is needed.
//!
//! The schema's SHA-256 over its compact serialization is stored beside it
//! and checked on load, so a hand-edited schema is refused.

use std::path::Path;

use dss_core::{Profile, ValidatorConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::validate::{CompiledValidator, SchemaValidationError};

/// Format tag of the current bundle layout.
pub const BUNDLE_FORMAT: &str = "dss-validator/1";

/// A compiled validator in portable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandaloneBundle {
    /// Always [`BUNDLE_FORMAT`].
    pub format: String,
    /// Profile the schema was built for.
    pub profile: Profile,
    /// Package version stamped at build time.
    pub version: String,
    /// Validator configuration of the profile.
    pub config: ValidatorConfig,
    /// Lowercase hex SHA-256 of the compact `schema` serialization.
    pub schema_sha256: String,
    /// The resolved, pruned schema.
    pub schema: Value,
}

/// Lowercase hex SHA-256 of the compact serialization of `schema`.
pub fn schema_digest(schema: &Value) -> String {
    let compact = serde_json::to_string(schema).unwrap_or_default();
    Sha256::digest(compact.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

impl StandaloneBundle {
    /// Capture `validator` for `profile`.
    pub fn new(profile: Profile, version: impl Into<String>, validator: &CompiledValidator) -> Self {
        let schema = validator.schema().clone();
        Self {
            format: BUNDLE_FORMAT.to_string(),
            profile,
            version: version.into(),
            config: validator.config().clone(),
            schema_sha256: schema_digest(&schema),
            schema,
        }
    }

    /// Read a bundle from disk and check its format tag and digest.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaValidationError::BundleError`] if the file cannot be
    /// read or parsed, or fails [`StandaloneBundle::verify`].
    pub fn load(path: &Path) -> Result<Self, SchemaValidationError> {
        let bundle_error = |reason: String| SchemaValidationError::BundleError {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path)
            .map_err(|e| bundle_error(format!("cannot read file: {e}")))?;
        let bundle: Self = serde_json::from_str(&content)
            .map_err(|e| bundle_error(format!("invalid bundle: {e}")))?;
        bundle.verify().map_err(bundle_error)?;
        Ok(bundle)
    }

    /// Check the format tag and the schema digest.
    pub fn verify(&self) -> Result<(), String> {
        if self.format != BUNDLE_FORMAT {
            return Err(format!(
                "unsupported format '{}', expected '{BUNDLE_FORMAT}'",
                self.format
            ));
        }
        let actual = schema_digest(&self.schema);
        if actual != self.schema_sha256 {
            return Err(format!(
                "schema digest mismatch: recorded {}, computed {actual}",
                self.schema_sha256
            ));
        }
        Ok(())
    }

    /// Rebuild the validator this bundle was written from.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaValidationError::ValidatorBuildError`] if the engine
    /// rejects the schema.
    pub fn into_validator(self) -> Result<CompiledValidator, SchemaValidationError> {
        CompiledValidator::compile(self.schema, self.config)
    }
}
