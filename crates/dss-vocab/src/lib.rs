//! # dss-vocab — Controlled Vocabulary Adapter
//!
//! The authoritative lists of permissible values for each record column are
//! maintained outside this toolchain. This crate is the narrow seam through
//! which the build consumes them:
//!
//! - [`Vocabulary`] filters candidate enum values down to the ones the
//!   vocabulary accepts ([`FileVocabulary`] reads one JSON list per column,
//!   [`MemoryVocabulary`] holds lists in memory).
//! - [`RulesetRegistry`] maps each configured [`ColumnPair`](dss_core::ColumnPair)
//!   to its "required-if" ruleset. The registry is built once at startup
//!   from a fixed pair list, so the set of available pairs is known before
//!   any fragment is regenerated.

pub mod registry;
pub mod subset;

pub use registry::{Ruleset, RulesetRegistry};
pub use subset::{sort_values, FileVocabulary, MemoryVocabulary, Vocabulary};

use thiserror::Error;

/// Errors raised by the vocabulary adapter.
#[derive(Error, Debug)]
pub enum VocabularyError {
    /// No vocabulary list exists for the column.
    #[error("no controlled vocabulary for column '{0}'")]
    UnknownColumn(String),

    /// A vocabulary list file could not be parsed.
    #[error("vocabulary load error for '{path}': {reason}")]
    LoadError {
        /// Path to the vocabulary file.
        path: String,
        /// Reason the file was rejected.
        reason: String,
    },

    /// No ruleset is registered for the pair.
    #[error("no required-if ruleset registered for '{0}'")]
    RulesetMissing(String),

    /// The ruleset exists but does not have the `if`/`then` shape.
    #[error("malformed ruleset for '{pair}': {reason}")]
    RulesetMalformed {
        /// Column-pair identifier.
        pair: String,
        /// What was wrong with it.
        reason: String,
    },

    /// IO error reading vocabulary or ruleset files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
