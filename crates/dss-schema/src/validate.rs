//! # Record Validation
//!
//! [`CompiledValidator`] pairs a resolved, pruned schema with the profile's
//! [`ValidatorConfig`] and a `jsonschema` Draft 7 validator built from it.
//!
//! ## Evaluation Order
//!
//! 1. Instance passes mutate the record: coercion, transforms, defaults
//!    (see [`crate::instance`]).
//! 2. The `jsonschema` engine collects every error. A failed `anyOf` or
//!    `oneOf` is followed by the errors of each of its branches, found by
//!    re-running the branch schema against the same value.
//! 3. Each error becomes a [`Violation`] whose `keyword` is read back from
//!    the schema path, so `required` inside `dependencies` reports as
//!    `dependencies` with the trigger property in `params`.
//! 4. With `error_messages` on, `errorMessage` annotations replace matched
//!    violations (see [`crate::messages`]).
//!
//! ## Formats
//!
//! Only the formats named in [`ValidatorConfig::formats`] are checked. Every
//! other format the engine knows is accepted as-is.
//!
//! Invalid records never panic and never produce an `Err` other than the
//! violation list.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use dss_core::node::{pointer_segments, trace_schema_path, KeywordStep};
use dss_core::{subschemas, ValidatorConfig};
use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, Validator};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::instance::prepare_with;
use crate::messages::apply_error_messages;

/// Error while building a validator or loading a record.
#[derive(Error, Debug)]
pub enum SchemaValidationError {
    /// The schema could not be compiled by the engine.
    #[error("validator build error: {reason}")]
    ValidatorBuildError {
        /// Engine message.
        reason: String,
    },

    /// A record file could not be read or parsed.
    #[error("document load error for '{path}': {reason}")]
    DocumentLoadError {
        /// Path of the record file.
        path: String,
        /// Reason the record could not be loaded.
        reason: String,
    },

    /// A standalone bundle is unreadable or fails its integrity check.
    #[error("validator bundle error for '{path}': {reason}")]
    BundleError {
        /// Path of the bundle.
        path: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Keyword that failed (`required`, `dependencies`, `enum`, `false schema`,
    /// `errorMessage`, ...).
    pub keyword: String,
    /// JSON Pointer to the failing value in the record.
    pub instance_path: String,
    /// JSON Pointer to the failing keyword in the schema.
    pub schema_path: String,
    /// Keyword-specific details such as `missingProperty`.
    pub params: Value,
    /// Human-readable description.
    pub message: String,
}

impl Violation {
    /// The property reported missing by `required` or `dependencies`.
    pub fn missing_property(&self) -> Option<&str> {
        self.params.get("missingProperty").and_then(Value::as_str)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "  (root): {} [{}]", self.message, self.keyword)
        } else {
            write!(f, "  {}: {} [{}]", self.instance_path, self.message, self.keyword)
        }
    }
}

/// Collection of validation violations.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationViolations {
    violations: Vec<Violation>,
}

impl ValidationViolations {
    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Whether a violation with `keyword` reports `property` as missing.
    pub fn has_missing_property(&self, keyword: &str, property: &str) -> bool {
        self.violations
            .iter()
            .any(|v| v.keyword == keyword && v.missing_property() == Some(property))
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for ValidationViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationViolations {}

/// Formats the engine checks on its own unless overridden.
const BUILTIN_FORMATS: &[&str] = &[
    "date",
    "date-time",
    "time",
    "duration",
    "email",
    "idn-email",
    "hostname",
    "idn-hostname",
    "ipv4",
    "ipv6",
    "uri",
    "uri-reference",
    "iri",
    "iri-reference",
    "uri-template",
    "uuid",
    "json-pointer",
    "relative-json-pointer",
    "regex",
];

fn accept_any(_: &str) -> bool {
    true
}

/// `YYYY-MM-DD` naming a real calendar day.
pub fn is_date(value: &str) -> bool {
    value.len() == 10
        && value.as_bytes()[4] == b'-'
        && value.as_bytes()[7] == b'-'
        && chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// A schema compiled under one profile's validator configuration.
pub struct CompiledValidator {
    schema: Value,
    config: ValidatorConfig,
    validator: Validator,
    /// `anyOf`/`oneOf` branches compiled on their own, keyed by schema pointer.
    branches: HashMap<String, Validator>,
    /// `if` schemas, keyed by schema pointer.
    conditions: HashMap<String, Validator>,
}

impl fmt::Debug for CompiledValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledValidator")
            .field("config", &self.config)
            .field("branches", &self.branches.len())
            .field("conditions", &self.conditions.len())
            .finish_non_exhaustive()
    }
}

impl CompiledValidator {
    /// Compile `schema` under `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaValidationError::ValidatorBuildError`] if the engine
    /// rejects the schema.
    pub fn compile(schema: Value, config: ValidatorConfig) -> Result<Self, SchemaValidationError> {
        let validator = build_engine(&schema, &config)?;
        let mut engines = SubschemaEngines::default();
        engines.collect(&schema, "", &config);
        Ok(Self {
            schema,
            config,
            validator,
            branches: engines.branches,
            conditions: engines.conditions,
        })
    }

    /// The schema this validator was compiled from.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// The configuration this validator was compiled under.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate `data`, applying coercion, transforms, and defaults to it
    /// in place first.
    ///
    /// # Errors
    ///
    /// Returns the violations when the record is invalid.
    pub fn validate(&self, data: &mut Value) -> Result<(), ValidationViolations> {
        let holds = |pointer: &str, condition: &Value, value: &Value| match self.conditions.get(pointer) {
            Some(engine) => Some(engine.is_valid(value)),
            None => build_engine(condition, &self.config)
                .ok()
                .map(|engine| engine.is_valid(value)),
        };
        let changes = prepare_with(&self.schema, data, &self.config, &holds);
        if !changes.is_empty() {
            tracing::trace!(
                coerced = changes.coerced,
                transformed = changes.transformed,
                defaulted = changes.defaulted,
                "prepared record"
            );
        }

        let mut violations = Vec::new();
        self.collect_violations(&self.validator, &*data, "", "", &mut violations);

        if self.config.error_messages {
            violations = apply_error_messages(&self.schema, violations);
        }
        if !self.config.all_errors {
            violations.truncate(1);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationViolations { violations })
        }
    }

    /// Whether `data` is valid. `data` is still prepared in place.
    pub fn is_valid(&self, data: &mut Value) -> bool {
        self.validate(data).is_ok()
    }

    /// Describe every error `engine` raises for `instance`.
    ///
    /// `engine` validates the subschema at `schema_prefix` of the full
    /// schema, against the value at `instance_prefix` of the record.
    fn collect_violations(
        &self,
        engine: &Validator,
        instance: &Value,
        schema_prefix: &str,
        instance_prefix: &str,
        out: &mut Vec<Violation>,
    ) {
        for error in engine.iter_errors(instance) {
            let local_instance = error.instance_path.to_string();
            let missing = match &error.kind {
                ValidationErrorKind::Required { property } => property.as_str().map(str::to_string),
                _ => None,
            };
            let false_schema = matches!(error.kind, ValidationErrorKind::FalseSchema);
            let violation = describe(
                &self.schema,
                format!("{instance_prefix}{local_instance}"),
                format!("{schema_prefix}{}", error.schema_path),
                missing,
                false_schema,
                error.to_string(),
            );

            if matches!(violation.keyword.as_str(), "anyOf" | "oneOf") {
                let count = self
                    .schema
                    .pointer(&violation.schema_path)
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                if let Some(value) = instance.pointer(&local_instance) {
                    for index in 0..count {
                        let pointer = format!("{}/{index}", violation.schema_path);
                        if let Some(branch) = self.branches.get(&pointer) {
                            self.collect_violations(branch, value, &pointer, &violation.instance_path, out);
                        }
                    }
                }
            }
            out.push(violation);
        }
    }
}

/// Build the engine for `schema` under `config`'s format policy.
pub(crate) fn build_engine(schema: &Value, config: &ValidatorConfig) -> Result<Validator, SchemaValidationError> {
    let mut opts = jsonschema::options();
    opts.with_draft(Draft::Draft7);
    opts.should_validate_formats(!config.formats.is_empty());
    opts.should_ignore_unknown_formats(true);
    for name in BUILTIN_FORMATS {
        if !config.formats.iter().any(|f| f == name) {
            opts.with_format(*name, accept_any);
        }
    }
    if config.formats.iter().any(|f| f == "date") {
        opts.with_format("date", is_date);
    }
    opts.build(schema)
        .map_err(|e| SchemaValidationError::ValidatorBuildError {
            reason: e.to_string(),
        })
}

/// Subschemas that are validated on their own, compiled once per validator.
#[derive(Default)]
struct SubschemaEngines {
    branches: HashMap<String, Validator>,
    conditions: HashMap<String, Validator>,
}

impl SubschemaEngines {
    fn collect(&mut self, schema: &Value, pointer: &str, config: &ValidatorConfig) {
        for child in subschemas(schema) {
            let child_pointer = child.pointer(pointer);
            let slot = match child.keyword {
                "anyOf" | "oneOf" => Some(&mut self.branches),
                "if" => Some(&mut self.conditions),
                _ => None,
            };
            if let Some(slot) = slot {
                match build_engine(child.schema, config) {
                    Ok(engine) => {
                        slot.insert(child_pointer.clone(), engine);
                    }
                    Err(e) => {
                        tracing::debug!(subschema = %child_pointer, error = %e, "subschema does not compile on its own");
                    }
                }
            }
            self.collect(child.schema, &child_pointer, config);
        }
    }
}

/// Build a [`Violation`] by reading the failing keyword back from the schema.
fn describe(
    schema: &Value,
    instance_path: String,
    schema_path: String,
    missing: Option<String>,
    false_schema: bool,
    message: String,
) -> Violation {
    let segments = pointer_segments(&schema_path);
    let steps = trace_schema_path(schema, &segments);
    let last: Option<&KeywordStep<'_>> = steps.last();

    let (keyword, params) = match (missing, last) {
        (Some(missing), Some(step)) if step.keyword == "dependencies" => {
            let property = match (&step.argument, step.target) {
                (Some(argument), Some(_)) => Some(argument.clone()),
                _ => dependency_trigger(step.owner, &missing),
            };
            (
                "dependencies".to_string(),
                json!({
                    "property": property,
                    "missingProperty": missing,
                }),
            )
        }
        (Some(missing), _) => ("required".to_string(), json!({ "missingProperty": missing })),
        (None, _) if false_schema => ("false schema".to_string(), json!({})),
        (None, Some(step)) => {
            let params = match (step.keyword.as_str(), step.target) {
                ("enum", Some(values)) => json!({ "allowedValues": values }),
                ("type", Some(declared)) => json!({ "type": declared }),
                ("format", Some(format)) => json!({ "format": format }),
                _ => json!({}),
            };
            (step.keyword.clone(), params)
        }
        (None, None) => (segments.last().cloned().unwrap_or_default(), json!({})),
    };

    Violation {
        keyword,
        instance_path,
        schema_path,
        params,
        message,
    }
}

/// The `dependencies` entry whose property list names `missing`.
fn dependency_trigger(owner: &Value, missing: &str) -> Option<String> {
    owner
        .get("dependencies")?
        .as_object()?
        .iter()
        .find(|(_, required)| {
            required
                .as_array()
                .is_some_and(|names| names.iter().any(|n| n.as_str() == Some(missing)))
        })
        .map(|(trigger, _)| trigger.clone())
}

/// Read a record file: JSON, or YAML for `.yaml`/`.yml`.
///
/// # Errors
///
/// Returns [`SchemaValidationError::DocumentLoadError`] if the file cannot
/// be read or parsed.
pub fn load_records(path: &Path) -> Result<Vec<Value>, SchemaValidationError> {
    let load_error = |reason: String| SchemaValidationError::DocumentLoadError {
        path: path.display().to_string(),
        reason,
    };
    let content =
        std::fs::read_to_string(path).map_err(|e| load_error(format!("cannot read file: {e}")))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let value: Value = match ext {
        "yaml" | "yml" => serde_yaml::from_str(&content)
            .map_err(|e| load_error(format!("invalid YAML: {e}")))?,
        _ => serde_json::from_str(&content).map_err(|e| load_error(format!("invalid JSON: {e}")))?,
    };

    match value {
        Value::Array(records) => Ok(records),
        Value::Object(_) => Ok(vec![value]),
        other => Err(load_error(format!(
            "expected a record or an array of records, found {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
