//! # Key-Pruning Pass
//!
//! Removes metadata keys (documentation, annotations, generation markers)
//! from a schema tree before it ships. Pruning is by key name only, at any
//! depth: every mapping is visited and every element of every array, so
//! keys inside inlined fragments, `enum` members, and `default` values are
//! reached too.
//!
//! The pass is idempotent and never fails: scalars are left alone.

use std::collections::BTreeSet;

use serde_json::Value;

/// The set of key names to remove.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneKeys(BTreeSet<String>);

impl PruneKeys {
    /// Build a key set from names.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    /// Whether `key` is pruned.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the key names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<'a> FromIterator<&'a str> for PruneKeys {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Remove every key in `keys` from `tree`, at any depth.
///
/// Returns the number of keys removed.
pub fn prune_keys(tree: &mut Value, keys: &PruneKeys) -> usize {
    if keys.is_empty() {
        return 0;
    }
    match tree {
        Value::Object(map) => {
            let before = map.len();
            map.retain(|key, _| !keys.contains(key));
            let mut removed = before - map.len();
            for child in map.values_mut() {
                removed += prune_keys(child, keys);
            }
            removed
        }
        Value::Array(items) => items.iter_mut().map(|item| prune_keys(item, keys)).sum(),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => 0,
    }
}
