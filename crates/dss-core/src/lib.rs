//! # dss-core — Foundational Types for the DataStream Schema Toolchain
//!
//! This crate is the leaf of the `dss-*` workspace. It defines the
//! vocabulary every other crate speaks: which column pairs carry
//! conditional-requirement rules, which validation profiles exist and how
//! each one is configured, how a schema tree is traversed, and how
//! metadata keys are stripped from it.
//!
//! ## Key Design Principles
//!
//! 1. **Closed profile set.** [`Profile`] has exactly four variants. Every
//!    `match` on it is exhaustive, so adding a profile forces every consumer
//!    (output layout, pruned keys, validator options) to handle it.
//!
//! 2. **Typed column pairs.** A `"<ColumnFrom>-<ColumnTo>"` identifier is
//!    parsed once into a [`ColumnPair`]. File names and `$id` URIs are
//!    derived from the typed value, never re-split from strings.
//!
//! 3. **Explicit traversal.** Schema trees stay as `serde_json::Value`, but
//!    every pass that needs to know where subschemas live goes through
//!    [`SchemaKind`], a closed classification of schema nodes.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `dss-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod node;
pub mod pair;
pub mod profile;
pub mod prune;

pub use error::DssError;
pub use node::{subschemas, visit_schemas, SchemaKind, Subschema};
pub use pair::ColumnPair;
pub use profile::{DefaultsMode, OutputStyle, Profile, ProfileSpec, ValidatorConfig};
pub use prune::{prune_keys, PruneKeys};

/// Key marking a document as produced by the build rather than hand-authored.
///
/// Every profile strips it before emitting artifacts.
pub const GENERATED_MARKER: &str = "$generated";

/// Base URI shared by every `$id` in the schema source tree.
pub const SCHEMA_ID_BASE: &str = "https://datastream.org/data-schema/";
