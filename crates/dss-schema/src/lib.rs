//! # dss-schema — Schema Composition & Compilation
//!
//! The build engine of the DataStream schema toolchain. It runs in two
//! strictly ordered phases over a schema source tree.
//!
//! ## Fragment Regeneration (`fragment`)
//!
//! For each configured column pair, [`regenerate_pair`] folds the previous
//! logic fragment, the pair's ruleset, the carve-in values, and the
//! optional overrides into a new logic fragment, then derives the
//! quality-control fragment from it. Both are written back into the
//! source tree.
//!
//! ## Profile Compilation (`compile`)
//!
//! For each [`Profile`](dss_core::Profile), [`ProfileCompiler`] resolves the
//! root schema ([`Dereferencer`]), prunes the profile's metadata keys,
//! and writes the schema, its module wrapper, and a [`StandaloneBundle`]
//! from which a [`CompiledValidator`] can be rebuilt anywhere.
//!
//! ## Validation (`validate`)
//!
//! [`CompiledValidator`] validates records with the `jsonschema` crate
//! (Draft 7), after applying the profile's coercion, transform, and
//! default rules to the record, and reports [`Violation`]s keyed by the
//! failing keyword.
//!
//! ## Crate Policy
//!
//! - Depends on `dss-core` and `dss-vocab` internally.
//! - All I/O is synchronous; nothing here spawns threads.
//! - A failure in one pair or one profile never stops the others.

pub mod bundle;
pub mod compile;
pub mod fragment;
pub mod instance;
mod messages;
pub mod resolve;
pub mod template;
pub mod validate;

pub use bundle::{schema_digest, StandaloneBundle, BUNDLE_FORMAT};
pub use compile::{read_version, BuildError, BuildReport, ProfileArtifacts, ProfileCompiler};
pub use fragment::{
    derive_quality_control, regenerate, regenerate_all, regenerate_pair, Fragment, FragmentError,
    FragmentKind, FragmentStore, LogicReport, PairReport, DEFAULT_CARVE_INS,
};
pub use instance::{prepare_instance, InstanceChanges};
pub use resolve::{Dereferencer, ResolveError};
pub use template::csv_headers;
pub use validate::{
    load_records, CompiledValidator, SchemaValidationError, ValidationViolations, Violation,
};
