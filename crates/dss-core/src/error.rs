//! # Error Types
//!
//! Errors shared by every crate in the toolchain. Crate-specific failures
//! (reference resolution, fragment regeneration, validator compilation)
//! live in their own crates and wrap this type where needed.

use thiserror::Error;

/// Top-level error type for the foundational types.
#[derive(Error, Debug)]
pub enum DssError {
    /// A column-pair identifier did not have the `"<From>-<To>"` shape.
    #[error("invalid column pair {0:?}: expected \"<ColumnFrom>-<ColumnTo>\"")]
    InvalidColumnPair(String),

    /// A profile name did not match any known profile.
    #[error("unknown profile: {0:?}")]
    UnknownProfile(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
