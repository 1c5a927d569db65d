//! # Validation Profiles — Single Source of Truth
//!
//! Defines the four named validation targets and the per-profile settings
//! that shape their artifacts. This is the ONE table of profile policy in
//! the toolchain; the compiler and the CLI both read it from here.
//!
//! ## Trust Boundary
//!
//! `primary` is the canonical strict record shape and `quality-control`
//! runs on records that were already coerced upstream: neither coerces
//! types, so a type mismatch is a rejection. `frontend` and `backend` are
//! lenient ingestion shapes and coerce. Do not unify the two groups.
//!
//! | profile | pruned keys | output | coerce | errorMessage | enum ceiling |
//! |---|---|---|---|---|---|
//! | primary | `$generated`, `errorMessage` | pretty | off | off | 200 |
//! | frontend | `$generated`, `title`, `description` | minified | on | on | 200 |
//! | backend | `$generated`, `errorMessage`, `title`, `description` | minified | on | off | 1500 |
//! | quality-control | `$generated` | minified | off | on | 200 |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DssError;
use crate::GENERATED_MARKER;

/// Enumeration size above which an `enum` is reported as oversized.
pub const DEFAULT_ENUM_CEILING: usize = 200;

/// Raised ceiling for the backend profile, which carries full controlled
/// vocabularies.
pub const BACKEND_ENUM_CEILING: usize = 1500;

/// A named validation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Canonical strict record shape.
    Primary,
    /// Lenient shape for browser-side ingestion.
    Frontend,
    /// Lenient shape for server-side ingestion.
    Backend,
    /// Cross-field plausibility rules run after ingestion.
    QualityControl,
}

impl Profile {
    /// All profiles in build order.
    pub fn all() -> &'static [Profile] {
        &[
            Self::Primary,
            Self::Frontend,
            Self::Backend,
            Self::QualityControl,
        ]
    }

    /// Identifier used for the root schema file stem and the output directory.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::QualityControl => "quality-control",
        }
    }

    /// Full build policy for this profile.
    pub fn spec(&self) -> ProfileSpec {
        let base = ValidatorConfig::default();
        match self {
            Self::Primary => ProfileSpec {
                profile: *self,
                pruned_keys: &[GENERATED_MARKER, "errorMessage"],
                output: OutputStyle::Pretty,
                validator: base,
            },
            Self::Frontend => ProfileSpec {
                profile: *self,
                pruned_keys: &[GENERATED_MARKER, "title", "description"],
                output: OutputStyle::Minified,
                validator: ValidatorConfig {
                    coerce_types: true,
                    error_messages: true,
                    ..base
                },
            },
            Self::Backend => ProfileSpec {
                profile: *self,
                pruned_keys: &[GENERATED_MARKER, "errorMessage", "title", "description"],
                output: OutputStyle::Minified,
                validator: ValidatorConfig {
                    coerce_types: true,
                    enum_ceiling: BACKEND_ENUM_CEILING,
                    ..base
                },
            },
            Self::QualityControl => ProfileSpec {
                profile: *self,
                pruned_keys: &[GENERATED_MARKER],
                output: OutputStyle::Minified,
                validator: ValidatorConfig {
                    error_messages: true,
                    ..base
                },
            },
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = DssError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(Self::Primary),
            "frontend" => Ok(Self::Frontend),
            "backend" => Ok(Self::Backend),
            "quality-control" => Ok(Self::QualityControl),
            other => Err(DssError::UnknownProfile(other.to_string())),
        }
    }
}

/// How the resolved schema is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStyle {
    /// Two-space indented JSON.
    Pretty,
    /// Compact JSON for constrained runtimes.
    Minified,
}

/// When a schema `default` is written into the record under validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultsMode {
    /// Never inject defaults.
    Off,
    /// Inject only when the property is missing.
    Missing,
    /// Inject when the property is missing, `null`, or `""`.
    Empty,
}

impl DefaultsMode {
    /// Whether a property holding `value` (or absent, when `None`) takes the default.
    pub fn applies_to(&self, value: Option<&serde_json::Value>) -> bool {
        match (self, value) {
            (Self::Off, _) => false,
            (_, None) => true,
            (Self::Missing, Some(_)) => false,
            (Self::Empty, Some(v)) => v.is_null() || v.as_str().is_some_and(str::is_empty),
        }
    }
}

/// Options handed to the validator compiler for one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Convert mismatched scalar types before validation instead of rejecting.
    pub coerce_types: bool,
    /// Default-value injection policy.
    pub use_defaults: DefaultsMode,
    /// Rewrite errors through `errorMessage` annotations.
    pub error_messages: bool,
    /// Collect every error rather than stopping at the first.
    pub all_errors: bool,
    /// Apply the `transform` keyword to string values.
    pub transform_keyword: bool,
    /// Enumerations longer than this are reported as oversized.
    pub enum_ceiling: usize,
    /// Format checkers to enable. Only `date` is recognised.
    pub formats: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            coerce_types: false,
            use_defaults: DefaultsMode::Empty,
            error_messages: false,
            all_errors: true,
            transform_keyword: true,
            enum_ceiling: DEFAULT_ENUM_CEILING,
            formats: vec!["date".to_string()],
        }
    }
}

/// The complete build policy for one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSpec {
    /// Which profile this is.
    pub profile: Profile,
    /// Metadata keys removed from the resolved tree.
    pub pruned_keys: &'static [&'static str],
    /// Serialization style of `index.json`.
    pub output: OutputStyle,
    /// Validator compiler options.
    pub validator: ValidatorConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_str_roundtrip() {
        for profile in Profile::all() {
            let parsed: Profile = profile.as_str().parse().unwrap();
            assert_eq!(*profile, parsed);
        }
        assert!("Primary".parse::<Profile>().is_err());
        assert!("qc".parse::<Profile>().is_err());
    }

    #[test]
    fn test_serde_format_matches_as_str() {
        for profile in Profile::all() {
            let json = serde_json::to_string(profile).unwrap();
            assert_eq!(json, format!("\"{}\"", profile.as_str()));
        }
    }

    #[test]
    fn test_coercion_asymmetry() {
        assert!(!Profile::Primary.spec().validator.coerce_types);
        assert!(!Profile::QualityControl.spec().validator.coerce_types);
        assert!(Profile::Frontend.spec().validator.coerce_types);
        assert!(Profile::Backend.spec().validator.coerce_types);
    }

    #[test]
    fn test_error_messages_and_pruning_agree() {
        // A profile that prunes errorMessage must not try to honour it.
        for profile in Profile::all() {
            let spec = profile.spec();
            if spec.pruned_keys.contains(&"errorMessage") {
                assert!(!spec.validator.error_messages, "{profile}");
            } else {
                assert!(spec.validator.error_messages, "{profile}");
            }
            assert!(spec.pruned_keys.contains(&GENERATED_MARKER));
        }
    }

    #[test]
    fn test_only_primary_is_pretty() {
        for profile in Profile::all() {
            let expected = if *profile == Profile::Primary {
                OutputStyle::Pretty
            } else {
                OutputStyle::Minified
            };
            assert_eq!(profile.spec().output, expected);
        }
    }

    #[test]
    fn test_backend_raises_enum_ceiling() {
        assert_eq!(Profile::Backend.spec().validator.enum_ceiling, BACKEND_ENUM_CEILING);
        assert_eq!(Profile::Primary.spec().validator.enum_ceiling, DEFAULT_ENUM_CEILING);
    }

    #[test]
    fn test_empty_defaults_mode() {
        let mode = DefaultsMode::Empty;
        assert!(mode.applies_to(None));
        assert!(mode.applies_to(Some(&json!(null))));
        assert!(mode.applies_to(Some(&json!(""))));
        assert!(!mode.applies_to(Some(&json!("x"))));
        assert!(!mode.applies_to(Some(&json!(0))));
        assert!(!DefaultsMode::Missing.applies_to(Some(&json!(""))));
        assert!(!DefaultsMode::Off.applies_to(None));
    }
}
