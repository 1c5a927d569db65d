//! # Instance Passes
//!
//! Mutations applied to a record before it reaches the validation engine.
//! The engine itself only judges; everything that *changes* the record
//! happens here, driven by the same schema and the profile's
//! [`ValidatorConfig`]:
//!
//! 1. **Type coercion** (when `coerce_types` is on): a scalar whose JSON
//!    type is not among the schema's `type` is converted to the first
//!    listed type it converts to cleanly.
//! 2. **Transforms** (when `transform_keyword` is on): the `transform`
//!    keyword's string operations, in order.
//! 3. **Defaults** (per `use_defaults`): a property schema's `default` is
//!    written into the parent object.
//!
//! All three run at each schema node before the walk descends, so a
//! default injected at a parent is itself coerced and transformed by the
//! child schema.
//!
//! ## Reach
//!
//! The walk follows `properties` on objects, `items` on arrays, `allOf`,
//! and schema-form `dependencies` whose trigger property is present. For a
//! node with `if`, the `if` schema is evaluated against the value as
//! prepared so far, then `then` or `else` is walked. The `if` schema
//! itself, `anyOf`, `oneOf`, and `not` are never walked: their outcome
//! does not decide whether the value is kept.

use dss_core::{subschemas, DefaultsMode, SchemaKind, ValidatorConfig};
use serde_json::{Map, Number, Value};

use crate::validate::build_engine;

/// Outcome of an `if` schema for a value: `None` when it cannot be judged.
///
/// Called with the schema pointer of the `if` keyword, the `if` schema, and
/// the value it applies to.
pub(crate) type Condition<'c> = dyn Fn(&str, &Value, &Value) -> Option<bool> + 'c;

/// Counts of the changes made by [`prepare_instance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceChanges {
    /// Values converted to another JSON type.
    pub coerced: usize,
    /// Strings rewritten by `transform`.
    pub transformed: usize,
    /// Properties filled from `default`.
    pub defaulted: usize,
}

impl InstanceChanges {
    /// Whether the record was left untouched.
    pub fn is_empty(&self) -> bool {
        self.coerced == 0 && self.transformed == 0 && self.defaulted == 0
    }
}

/// Apply coercion, transforms, and defaults to `data` in place.
///
/// `if` schemas are compiled as they are reached. A validator that is used
/// for many records compiles them once and calls [`prepare_with`] instead.
pub fn prepare_instance(schema: &Value, data: &mut Value, config: &ValidatorConfig) -> InstanceChanges {
    let holds = |_: &str, condition: &Value, value: &Value| {
        build_engine(condition, config)
            .ok()
            .map(|engine| engine.is_valid(value))
    };
    prepare_with(schema, data, config, &holds)
}

pub(crate) fn prepare_with(
    schema: &Value,
    data: &mut Value,
    config: &ValidatorConfig,
    holds: &Condition<'_>,
) -> InstanceChanges {
    let mut changes = InstanceChanges::default();
    let mut visit = |node: &Map<String, Value>, value: &mut Value| {
        if config.coerce_types && coerce_value(node, value) {
            changes.coerced += 1;
        }
        if config.transform_keyword && transform_value(node, value) {
            changes.transformed += 1;
        }
        changes.defaulted += apply_defaults(node, value, config.use_defaults);
    };
    walk(schema, "", data, &mut visit, holds);
    changes
}

fn walk(
    schema: &Value,
    pointer: &str,
    data: &mut Value,
    visit: &mut dyn FnMut(&Map<String, Value>, &mut Value),
    holds: &Condition<'_>,
) {
    let kind = SchemaKind::of(schema);
    let Some(node) = kind.as_map() else {
        return;
    };
    visit(node, data);

    for child in subschemas(schema) {
        let child_pointer = child.pointer(pointer);
        match (child.keyword, child.name, child.index) {
            ("allOf", _, _) => walk(child.schema, &child_pointer, data, visit, holds),
            ("dependencies", Some(trigger), _) => {
                if data.as_object().is_some_and(|o| o.contains_key(trigger)) {
                    walk(child.schema, &child_pointer, data, visit, holds);
                }
            }
            ("properties", Some(name), _) => {
                if let Some(value) = data.as_object_mut().and_then(|o| o.get_mut(name)) {
                    walk(child.schema, &child_pointer, value, visit, holds);
                }
            }
            ("items", None, None) => {
                if let Some(items) = data.as_array_mut() {
                    for item in items {
                        walk(child.schema, &child_pointer, item, visit, holds);
                    }
                }
            }
            ("items", None, Some(index)) => {
                if let Some(item) = data.as_array_mut().and_then(|a| a.get_mut(index)) {
                    walk(child.schema, &child_pointer, item, visit, holds);
                }
            }
            _ => {}
        }
    }

    if let SchemaKind::Conditional(map) = kind {
        let Some(condition) = map.get("if") else {
            return;
        };
        let branch = match holds(&format!("{pointer}/if"), condition, &*data) {
            Some(true) => "then",
            Some(false) => "else",
            None => return,
        };
        if let Some(next) = map.get(branch) {
            walk(next, &format!("{pointer}/{branch}"), data, visit, holds);
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn apply_defaults(node: &Map<String, Value>, data: &mut Value, mode: DefaultsMode) -> usize {
    if mode == DefaultsMode::Off {
        return 0;
    }
    let (Some(properties), Some(object)) = (
        node.get("properties").and_then(Value::as_object),
        data.as_object_mut(),
    ) else {
        return 0;
    };
    let mut count = 0;
    for (name, property) in properties {
        let Some(default) = property.get("default") else {
            continue;
        };
        if mode.applies_to(object.get(name)) {
            object.insert(name.clone(), default.clone());
            count += 1;
        }
    }
    count
}

// ---------------------------------------------------------------------------
// Coercion
// ---------------------------------------------------------------------------

fn declared_types(node: &Map<String, Value>) -> Vec<&str> {
    match node.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(ts)) => ts.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn matches_type(value: &Value, declared: &str) -> bool {
    match declared {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

fn coerce_value(node: &Map<String, Value>, data: &mut Value) -> bool {
    let types = declared_types(node);
    if types.is_empty() || types.iter().any(|t| matches_type(data, t)) {
        return false;
    }
    for target in types {
        if let Some(converted) = coerce_to(data, target) {
            *data = converted;
            return true;
        }
    }
    false
}

/// Convert a scalar to `target`, or `None` when no clean conversion exists.
pub fn coerce_to(value: &Value, target: &str) -> Option<Value> {
    match (target, value) {
        ("string", Value::Number(n)) => Some(Value::String(number_to_string(n))),
        ("string", Value::Bool(b)) => Some(Value::String(b.to_string())),
        ("string", Value::Null) => Some(Value::String(String::new())),

        ("number", Value::String(s)) => parse_number(s, false),
        ("integer", Value::String(s)) => parse_number(s, true),
        ("number" | "integer", Value::Bool(b)) => Some(Value::from(u8::from(*b))),
        ("number" | "integer", Value::Null) => Some(Value::from(0)),

        ("boolean", Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(Value::Bool(true)),
            Some(f) if f == 0.0 => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Null) => Some(Value::Bool(false)),

        ("null", Value::String(s)) if s.is_empty() => Some(Value::Null),
        ("null", Value::Number(n)) if n.as_f64() == Some(0.0) => Some(Value::Null),
        ("null", Value::Bool(false)) => Some(Value::Null),

        _ => None,
    }
}

fn number_to_string(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

fn parse_number(s: &str, integer: bool) -> Option<Value> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::from(i));
    }
    let f = trimmed.parse::<f64>().ok().filter(|f| f.is_finite())?;
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        return Some(Value::from(f as i64));
    }
    if integer {
        return None;
    }
    Number::from_f64(f).map(Value::Number)
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

fn transform_value(node: &Map<String, Value>, data: &mut Value) -> bool {
    let Some(ops) = node.get("transform").and_then(Value::as_array) else {
        return false;
    };
    let Value::String(original) = data else {
        return false;
    };
    let mut out = original.clone();
    for op in ops.iter().filter_map(Value::as_str) {
        out = match op {
            "trim" => out.trim().to_string(),
            "trimStart" | "trimLeft" => out.trim_start().to_string(),
            "trimEnd" | "trimRight" => out.trim_end().to_string(),
            "toLowerCase" => out.to_lowercase(),
            "toUpperCase" => out.to_uppercase(),
            "toEnumCase" => enum_case(node, &out).unwrap_or(out),
            unknown => {
                tracing::trace!(op = unknown, "ignoring unknown transform");
                out
            }
        };
    }
    if out == *original {
        return false;
    }
    *original = out;
    true
}

fn enum_case(node: &Map<String, Value>, value: &str) -> Option<String> {
    let lowered = value.to_lowercase();
    node.get("enum")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .find(|candidate| candidate.to_lowercase() == lowered)
        .map(str::to_string)
}
