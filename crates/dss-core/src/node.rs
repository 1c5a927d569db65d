//! # Schema Node Kinds
//!
//! Schema documents are kept as `serde_json::Value` trees so that unknown
//! keywords and annotations survive every transformation untouched. What
//! this module adds is an explicit, closed description of where the
//! *schemas* sit inside such a tree:
//!
//! - [`SchemaKind`] classifies a node as an object-schema, array-schema,
//!   conditional-schema, or leaf constraint.
//! - [`KeywordShape`] says what a keyword's value holds (a schema, a map of
//!   named schemas, a list of schemas, or plain data).
//! - [`subschemas`] enumerates a node's direct child schemas.
//! - [`trace_schema_path`] walks a JSON Pointer produced by the validator
//!   back through the tree, keyword by keyword.
//!
//! Every pass that needs to recurse through schemas (defaults, coercion,
//! transforms, error rewriting) goes through these functions rather than
//! poking at keys ad hoc.

use serde_json::{Map, Value};

/// Classification of a schema node by the constraints it primarily carries.
#[derive(Debug, Clone, Copy)]
pub enum SchemaKind<'a> {
    /// Carries `if`; `then`/`else` apply depending on the outcome.
    Conditional(&'a Map<String, Value>),
    /// Constrains an object instance (`properties`, `required`, `dependencies`, ...).
    Object(&'a Map<String, Value>),
    /// Constrains an array instance (`items`, `contains`, ...).
    Array(&'a Map<String, Value>),
    /// Constrains the value itself (`type`, `enum`, `format`, boolean schemas, ...).
    Leaf(&'a Value),
}

const OBJECT_KEYWORDS: &[&str] = &[
    "properties",
    "required",
    "dependencies",
    "patternProperties",
    "additionalProperties",
    "propertyNames",
    "minProperties",
    "maxProperties",
];

const ARRAY_KEYWORDS: &[&str] = &[
    "items",
    "additionalItems",
    "contains",
    "minItems",
    "maxItems",
    "uniqueItems",
];

impl<'a> SchemaKind<'a> {
    /// Classify a schema node.
    ///
    /// `if` takes precedence, then object keywords, then array keywords.
    /// A declared `type` of `object`/`array` also decides the kind.
    pub fn of(schema: &'a Value) -> Self {
        let Some(map) = schema.as_object() else {
            return Self::Leaf(schema);
        };
        if map.contains_key("if") {
            return Self::Conditional(map);
        }
        let declared = map.get("type").and_then(Value::as_str);
        if declared == Some("object") || OBJECT_KEYWORDS.iter().any(|k| map.contains_key(*k)) {
            return Self::Object(map);
        }
        if declared == Some("array") || ARRAY_KEYWORDS.iter().any(|k| map.contains_key(*k)) {
            return Self::Array(map);
        }
        Self::Leaf(schema)
    }

    /// The underlying mapping, if the node is not a boolean or scalar.
    pub fn as_map(&self) -> Option<&'a Map<String, Value>> {
        match self {
            Self::Conditional(m) | Self::Object(m) | Self::Array(m) => Some(m),
            Self::Leaf(v) => v.as_object(),
        }
    }
}

/// What a keyword's value holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordShape {
    /// A single schema (`not`, `if`, `additionalProperties`, ...).
    Schema,
    /// A map from names to schemas (`properties`, `definitions`, ...).
    NamedSchemas,
    /// A list of schemas (`allOf`, `anyOf`, `oneOf`).
    SchemaList,
    /// A schema, or a list of positional schemas (`items`).
    SchemaOrList,
    /// A map from names to either a schema or a list of property names.
    Dependencies,
    /// Plain data (`enum`, `required`, `type`, annotations, unknown keywords).
    Data,
}

impl KeywordShape {
    /// Shape of a Draft 7 keyword. Unknown keywords are data.
    pub fn of(keyword: &str) -> Self {
        match keyword {
            "not" | "if" | "then" | "else" | "additionalProperties" | "additionalItems"
            | "contains" | "propertyNames" => Self::Schema,
            "properties" | "patternProperties" | "definitions" | "$defs" => Self::NamedSchemas,
            "allOf" | "anyOf" | "oneOf" => Self::SchemaList,
            "items" => Self::SchemaOrList,
            "dependencies" => Self::Dependencies,
            _ => Self::Data,
        }
    }

    /// Whether crossing `keyword` moves validation into a child instance.
    fn descends_instance(keyword: &str) -> bool {
        matches!(
            keyword,
            "properties" | "patternProperties" | "additionalProperties" | "items"
                | "additionalItems" | "contains"
        )
    }
}

/// A direct child schema of some node.
#[derive(Debug, Clone, Copy)]
pub struct Subschema<'a> {
    /// Keyword under which the child sits.
    pub keyword: &'a str,
    /// Property name or list index following the keyword, if any.
    pub name: Option<&'a str>,
    /// Position in a schema list, if any.
    pub index: Option<usize>,
    /// The child schema.
    pub schema: &'a Value,
}

impl Subschema<'_> {
    /// JSON Pointer of this child, given the pointer of its parent.
    pub fn pointer(&self, parent: &str) -> String {
        let mut out = format!("{parent}/{}", escape_segment(self.keyword));
        if let Some(name) = self.name {
            out.push('/');
            out.push_str(&escape_segment(name));
        }
        if let Some(index) = self.index {
            out.push('/');
            out.push_str(&index.to_string());
        }
        out
    }
}

/// Escape one JSON Pointer segment (`~` to `~0`, `/` to `~1`).
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Enumerate the direct child schemas of `schema`.
///
/// Property-name lists under `dependencies` are data, not schemas, and are
/// skipped. Non-object nodes have no children.
pub fn subschemas(schema: &Value) -> Vec<Subschema<'_>> {
    let mut out = Vec::new();
    let Some(map) = schema.as_object() else {
        return out;
    };
    for (keyword, value) in map {
        match KeywordShape::of(keyword) {
            KeywordShape::Schema => out.push(Subschema {
                keyword,
                name: None,
                index: None,
                schema: value,
            }),
            KeywordShape::NamedSchemas | KeywordShape::Dependencies => {
                if let Some(children) = value.as_object() {
                    for (name, child) in children {
                        if child.is_object() || child.is_boolean() {
                            out.push(Subschema {
                                keyword,
                                name: Some(name),
                                index: None,
                                schema: child,
                            });
                        }
                    }
                }
            }
            KeywordShape::SchemaList => {
                if let Some(children) = value.as_array() {
                    for (index, child) in children.iter().enumerate() {
                        out.push(Subschema {
                            keyword,
                            name: None,
                            index: Some(index),
                            schema: child,
                        });
                    }
                }
            }
            KeywordShape::SchemaOrList => match value {
                Value::Array(children) => {
                    for (index, child) in children.iter().enumerate() {
                        out.push(Subschema {
                            keyword,
                            name: None,
                            index: Some(index),
                            schema: child,
                        });
                    }
                }
                other => out.push(Subschema {
                    keyword,
                    name: None,
                    index: None,
                    schema: other,
                }),
            },
            KeywordShape::Data => {}
        }
    }
    out
}

/// Call `visit` on `schema` and every schema nested beneath it, pre-order.
pub fn visit_schemas<'a>(schema: &'a Value, visit: &mut dyn FnMut(&'a Value)) {
    visit(schema);
    for child in subschemas(schema) {
        visit_schemas(child.schema, visit);
    }
}

/// One keyword crossed while walking a schema path.
#[derive(Debug, Clone)]
pub struct KeywordStep<'a> {
    /// Schema node that holds the keyword.
    pub owner: &'a Value,
    /// Number of path segments consumed to reach `owner`.
    pub owner_depth: usize,
    /// The keyword itself.
    pub keyword: String,
    /// Property name or index following the keyword, if the shape takes one.
    pub argument: Option<String>,
    /// Value found at `keyword` (and `argument`), if present in the tree.
    pub target: Option<&'a Value>,
    /// Whether crossing this keyword moved into a child instance.
    pub descends_instance: bool,
}

/// Split a JSON Pointer into unescaped segments.
pub fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Walk `segments` through `root`, recording every keyword crossed.
///
/// The walk stops at the first segment that does not resolve, at a
/// data-shaped keyword, or at a property-name list under `dependencies`.
/// Trailing segments past that point are ignored.
pub fn trace_schema_path<'a>(root: &'a Value, segments: &[String]) -> Vec<KeywordStep<'a>> {
    let mut steps = Vec::new();
    let mut node = root;
    let mut i = 0;

    while i < segments.len() {
        let keyword = &segments[i];
        let Some(map) = node.as_object() else {
            break;
        };
        let value = map.get(keyword.as_str());
        let shape = KeywordShape::of(keyword);
        let takes_argument = match shape {
            KeywordShape::NamedSchemas | KeywordShape::SchemaList | KeywordShape::Dependencies => true,
            KeywordShape::SchemaOrList => value.is_some_and(Value::is_array),
            KeywordShape::Schema | KeywordShape::Data => false,
        };
        let argument = if takes_argument {
            segments.get(i + 1).cloned()
        } else {
            None
        };
        let target = match (&argument, value) {
            (Some(arg), Some(Value::Array(items))) => {
                arg.parse::<usize>().ok().and_then(|idx| items.get(idx))
            }
            (Some(arg), Some(Value::Object(children))) => children.get(arg.as_str()),
            (None, v) => v,
            _ => None,
        };

        steps.push(KeywordStep {
            owner: node,
            owner_depth: i,
            keyword: keyword.clone(),
            argument: argument.clone(),
            target,
            descends_instance: KeywordShape::descends_instance(keyword),
        });

        let Some(next) = target else {
            break;
        };
        if shape == KeywordShape::Data || (shape == KeywordShape::Dependencies && next.is_array()) {
            break;
        }
        node = next;
        i += if argument.is_some() { 2 } else { 1 };
    }

    steps
}
