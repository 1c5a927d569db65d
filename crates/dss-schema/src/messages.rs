//! # `errorMessage` Rewriting
//!
//! Replaces engine errors with the author's wording from `errorMessage`
//! annotations, for profiles that keep those annotations.
//!
//! ## Matching
//!
//! For each violation the schema path is traced from the root. The deepest
//! schema on that path carrying an `errorMessage` that matches wins:
//!
//! - a string matches every error raised at or below that schema;
//! - an object matches by the failing keyword when the error is raised by
//!   the schema itself (`required` and `dependencies` may map per
//!   missing property), by property name under `properties` for errors
//!   inside a property schema, and falls back to `_`.
//!
//! The replacement has keyword `errorMessage`, points at the annotated
//! schema and at the record position that schema applies to, and keeps
//! the replaced violations under `params.errors`. Violations that map to
//! the same message at the same place are merged into one.

use dss_core::node::{pointer_segments, trace_schema_path, KeywordStep};
use serde_json::{json, Value};

use crate::validate::Violation;

/// Rewrite `violations` through the `errorMessage` annotations of `schema`.
pub(crate) fn apply_error_messages(schema: &Value, violations: Vec<Violation>) -> Vec<Violation> {
    let mut out: Vec<Violation> = Vec::with_capacity(violations.len());

    for violation in violations {
        let segments = pointer_segments(&violation.schema_path);
        let steps = trace_schema_path(schema, &segments);

        let Some((index, message)) = matching_message(&steps, &violation) else {
            out.push(violation);
            continue;
        };

        let owner_depth = steps[index].owner_depth;
        let schema_path = format!("{}/errorMessage", join_pointer(&segments[..owner_depth]));
        let instance_path = owner_instance_path(&violation.instance_path, &steps[index..]);

        let original = serde_json::to_value(&violation).unwrap_or(Value::Null);
        let existing = out.iter_mut().find(|v| {
            v.keyword == "errorMessage"
                && v.schema_path == schema_path
                && v.instance_path == instance_path
                && v.message == message
        });
        match existing {
            Some(grouped) => {
                if let Some(errors) = grouped.params.get_mut("errors").and_then(Value::as_array_mut) {
                    errors.push(original);
                }
            }
            None => out.push(Violation {
                keyword: "errorMessage".to_string(),
                instance_path,
                schema_path,
                params: json!({ "errors": [original] }),
                message,
            }),
        }
    }

    out
}

fn matching_message(steps: &[KeywordStep<'_>], violation: &Violation) -> Option<(usize, String)> {
    for (index, step) in steps.iter().enumerate().rev() {
        let Some(annotation) = step.owner.get("errorMessage") else {
            continue;
        };
        let raised_here = index + 1 == steps.len();
        let found = match annotation {
            Value::String(message) => Some(message.clone()),
            Value::Object(by_keyword) => {
                let specific = if raised_here {
                    match by_keyword.get(violation.keyword.as_str()) {
                        Some(Value::String(message)) => Some(message.clone()),
                        Some(Value::Object(by_property)) => violation
                            .missing_property()
                            .and_then(|p| by_property.get(p))
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        _ => None,
                    }
                } else if step.keyword == "properties" {
                    step.argument
                        .as_deref()
                        .and_then(|p| by_keyword.get("properties")?.get(p))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                } else {
                    None
                };
                specific.or_else(|| by_keyword.get("_").and_then(Value::as_str).map(str::to_string))
            }
            _ => None,
        };
        if let Some(message) = found {
            return Some((index, message));
        }
    }
    None
}

/// Strip the record segments entered below the annotated schema.
///
/// A `false` property schema is treated as descending too: the engine
/// reports it at the property's position.
fn owner_instance_path(instance_path: &str, steps_below: &[KeywordStep<'_>]) -> String {
    let descended = steps_below.iter().filter(|s| s.descends_instance).count();
    let segments = pointer_segments(instance_path);
    let keep = segments.len().saturating_sub(descended);
    join_pointer(&segments[..keep])
}

fn join_pointer(segments: &[String]) -> String {
    segments
        .iter()
        .map(|s| format!("/{}", s.replace('~', "~0").replace('/', "~1")))
        .collect()
}
