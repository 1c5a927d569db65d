//! # Reference Resolution
//!
//! Dereferences a root schema document by inlining every `$ref` it reaches,
//! recursively, until the tree is self-contained.
//!
//! ## Reference Forms
//!
//! - `#/definitions/x`: a JSON Pointer into the current document.
//! - `./logic/A-B.json` or `logic/A-B.json#/if`: a file relative to the
//!   current document, with an optional pointer.
//! - `https://datastream.org/data-schema/<path>`: the canonical `$id` form.
//!   The base URI is stripped and `<path>` is read from the source root,
//!   so no network request is ever made.
//!
//! Any other absolute URI is rejected, as is a `$ref` that is not a string.
//! The fragment is percent-decoded before it is read as a JSON Pointer, so
//! `#/definitions/a%25b` names the key `a%b`.
//!
//! Keys written beside a `$ref` are merged over the referenced schema. An
//! inlined document loses its own `$id`: once inlined it no longer has a
//! base URI of its own.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use dss_core::SCHEMA_ID_BASE;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use thiserror::Error;

/// Error while dereferencing a schema tree.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A referenced document could not be read.
    #[error("cannot read '{path}': {source}")]
    Read {
        /// Path of the document.
        path: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// A referenced document is not valid JSON.
    #[error("invalid JSON in '{path}': {reason}")]
    Parse {
        /// Path of the document.
        path: String,
        /// Parser message.
        reason: String,
    },

    /// The pointer part of a reference does not exist in its document.
    #[error("unresolvable $ref '{reference}' in '{path}'")]
    PointerNotFound {
        /// The `$ref` value.
        reference: String,
        /// Document containing the `$ref`.
        path: String,
    },

    /// A `$ref` whose value is not a string.
    #[error("$ref in '{path}' must be a string, found {found}")]
    InvalidRef {
        /// Document containing the `$ref`.
        path: String,
        /// The value found instead.
        found: String,
    },

    /// A reference points at something other than the local source tree.
    #[error("unsupported $ref '{0}': only local files and canonical data-schema URIs are resolved")]
    Unsupported(String),

    /// Following references led back to a reference already being inlined.
    #[error("circular $ref '{reference}' in '{path}'")]
    Cycle {
        /// The `$ref` value.
        reference: String,
        /// Document containing the `$ref`.
        path: String,
    },
}

/// Inlines cross-document `$ref`s below a source root.
///
/// Parsed documents are cached for the lifetime of the dereferencer, so one
/// instance should not outlive a build phase that rewrites source files.
#[derive(Debug)]
pub struct Dereferencer {
    source_root: PathBuf,
    documents: HashMap<PathBuf, Value>,
}

impl Dereferencer {
    /// Create a dereferencer whose canonical `$id` URIs map into `source_root`.
    pub fn new(source_root: impl AsRef<Path>) -> Self {
        Self {
            source_root: source_root.as_ref().to_path_buf(),
            documents: HashMap::new(),
        }
    }

    /// Number of distinct documents read so far.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Load `root` and return it with every reachable `$ref` inlined.
    ///
    /// # Errors
    ///
    /// Fails on unreadable or unparsable documents, dangling pointers,
    /// non-local URIs, and reference cycles.
    pub fn dereference(&mut self, root: impl AsRef<Path>) -> Result<Value, ResolveError> {
        let root = normalize(root.as_ref());
        let document = self.load(&root)?;
        let mut active = Vec::new();
        let resolved = self.inline(document, &root, &mut active)?;
        tracing::debug!(
            root = %root.display(),
            documents = self.documents.len(),
            "dereferenced schema"
        );
        Ok(resolved)
    }

    fn load(&mut self, path: &Path) -> Result<Value, ResolveError> {
        if let Some(doc) = self.documents.get(path) {
            return Ok(doc.clone());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ResolveError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let doc: Value = serde_json::from_str(&content).map_err(|e| ResolveError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.documents.insert(path.to_path_buf(), doc.clone());
        Ok(doc)
    }

    fn inline(
        &mut self,
        value: Value,
        current: &Path,
        active: &mut Vec<(PathBuf, String)>,
    ) -> Result<Value, ResolveError> {
        match value {
            Value::Object(mut map) => {
                if let Some(found) = map.remove("$ref") {
                    let reference = match found {
                        Value::String(reference) => reference,
                        other => {
                            return Err(ResolveError::InvalidRef {
                                path: current.display().to_string(),
                                found: other.to_string(),
                            })
                        }
                    };
                    let (path, pointer) = self.locate(&reference, current)?;
                    let key = (path.clone(), pointer.clone());
                    if active.contains(&key) {
                        return Err(ResolveError::Cycle {
                            reference,
                            path: current.display().to_string(),
                        });
                    }

                    let document = self.load(&path)?;
                    let mut target = if pointer.is_empty() {
                        document
                    } else {
                        document
                            .pointer(&pointer)
                            .cloned()
                            .ok_or_else(|| ResolveError::PointerNotFound {
                                reference: reference.clone(),
                                path: current.display().to_string(),
                            })?
                    };
                    if pointer.is_empty() {
                        if let Some(obj) = target.as_object_mut() {
                            obj.remove("$id");
                        }
                    }

                    active.push(key);
                    let resolved = self.inline(target, &path, active)?;
                    active.pop();

                    if map.is_empty() {
                        return Ok(resolved);
                    }
                    let siblings = self.inline(Value::Object(map), current, active)?;
                    return Ok(merge(resolved, siblings));
                }

                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, child) in map {
                    out.insert(key, self.inline(child, current, active)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.inline(item, current, active))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            scalar => Ok(scalar),
        }
    }

    /// Split a `$ref` into the document it names and a JSON Pointer.
    fn locate(&self, reference: &str, current: &Path) -> Result<(PathBuf, String), ResolveError> {
        let (location, fragment) = match reference.split_once('#') {
            Some((location, fragment)) => (location, fragment),
            None => (reference, ""),
        };
        let path = if location.is_empty() {
            current.to_path_buf()
        } else if let Some(relative) = location.strip_prefix(SCHEMA_ID_BASE) {
            normalize(&self.source_root.join(relative))
        } else if location.contains("://") {
            return Err(ResolveError::Unsupported(reference.to_string()));
        } else {
            let base = current.parent().unwrap_or_else(|| Path::new(""));
            normalize(&base.join(location))
        };
        let pointer = percent_decode_str(fragment)
            .decode_utf8()
            .map_err(|_| ResolveError::PointerNotFound {
                reference: reference.to_string(),
                path: current.display().to_string(),
            })?;
        Ok((path, pointer.into_owned()))
    }
}

/// Overlay `overlay`'s keys onto `base` when both are objects.
fn merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}

/// Lexically resolve `.` and `..` so equal documents share one cache key.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
