//! # dss-cli — The `dss` Command
//!
//! Drives the two build phases of the DataStream schema toolchain and
//! validates records against their output.
//!
//! ## Subcommands
//!
//! - `dss logic`: regenerate logic and quality-control fragments for the
//!   configured column pairs.
//! - `dss build`: resolve, prune, and compile every profile.
//! - `dss all`: `logic` then `build`.
//! - `dss validate --profile P FILE`: validate records against a built profile.
//!
//! ```bash
//! dss all
//! dss build --profile primary --profile frontend
//! dss validate --profile quality-control records.json
//! ```
//!
//! ## Exit Codes
//!
//! 0 when every unit of work succeeded, 1 when any pair, profile, or
//! record failed, 2 on an operational error (unreadable config, missing
//! bundle, unparsable record file).

pub mod build;
pub mod config;
pub mod logic;
pub mod validate;

use std::path::{Path, PathBuf};

/// Resolve a path that may be relative to the project root.
///
/// If the path is absolute, returns it as-is. If relative and the file
/// exists relative to `root`, uses that. Otherwise returns the path
/// relative to the current directory.
pub fn resolve_path(path: &Path, root: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let relative = root.join(path);
    if relative.exists() {
        relative
    } else {
        path.to_path_buf()
    }
}
