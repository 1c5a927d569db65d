//! # Column Pairs
//!
//! A column pair `(ColumnFrom, ColumnTo)` names a conditional-requirement
//! relationship between two record fields: certain values of `ColumnFrom`
//! make `ColumnTo` meaningful (logic fragment), and every other value makes
//! it disallowed (quality-control fragment).
//!
//! The textual identifier `"<ColumnFrom>-<ColumnTo>"` doubles as the file
//! stem of every fragment scoped to the pair.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DssError;
use crate::SCHEMA_ID_BASE;

/// An ordered pair of record columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnPair {
    from: String,
    to: String,
}

impl ColumnPair {
    /// Build a pair from its two column names.
    ///
    /// # Errors
    ///
    /// Returns [`DssError::InvalidColumnPair`] if either name is empty or
    /// contains the `-` separator.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Result<Self, DssError> {
        let from = from.into();
        let to = to.into();
        if !is_column_name(&from) || !is_column_name(&to) {
            return Err(DssError::InvalidColumnPair(format!("{from}-{to}")));
        }
        Ok(Self { from, to })
    }

    /// The column whose value triggers the rule.
    pub fn from_column(&self) -> &str {
        &self.from
    }

    /// The column the rule requires or forbids.
    pub fn to_column(&self) -> &str {
        &self.to
    }

    /// The `"<From>-<To>"` identifier, used as the fragment file stem.
    pub fn id(&self) -> String {
        format!("{}-{}", self.from, self.to)
    }

    /// `$id` of the logic fragment for this pair.
    pub fn logic_uri(&self) -> String {
        format!("{SCHEMA_ID_BASE}logic/{}.json", self.id())
    }

    /// `$id` of the quality-control fragment for this pair.
    pub fn quality_control_uri(&self) -> String {
        format!("{SCHEMA_ID_BASE}quality-control/{}.json", self.id())
    }
}

fn is_column_name(s: &str) -> bool {
    !s.is_empty() && !s.contains('-') && !s.chars().any(char::is_whitespace)
}

impl fmt::Display for ColumnPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

impl FromStr for ColumnPair {
    type Err = DssError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to) = s
            .split_once('-')
            .ok_or_else(|| DssError::InvalidColumnPair(s.to_string()))?;
        Self::new(from, to).map_err(|_| DssError::InvalidColumnPair(s.to_string()))
    }
}

impl TryFrom<String> for ColumnPair {
    type Error = DssError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColumnPair> for String {
    fn from(pair: ColumnPair) -> Self {
        pair.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pair_identifier() {
        let pair: ColumnPair = "CharacteristicName-MethodSpeciation".parse().unwrap();
        assert_eq!(pair.from_column(), "CharacteristicName");
        assert_eq!(pair.to_column(), "MethodSpeciation");
        assert_eq!(pair.id(), "CharacteristicName-MethodSpeciation");
        assert_eq!(pair.to_string(), pair.id());
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for bad in ["", "NoSeparator", "-To", "From-", "A-B-C", "A B-C"] {
            assert!(bad.parse::<ColumnPair>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn derives_fragment_uris() {
        let pair = ColumnPair::new("CharacteristicName", "ResultSampleFraction").unwrap();
        assert_eq!(
            pair.logic_uri(),
            "https://datastream.org/data-schema/logic/CharacteristicName-ResultSampleFraction.json"
        );
        assert_eq!(
            pair.quality_control_uri(),
            "https://datastream.org/data-schema/quality-control/CharacteristicName-ResultSampleFraction.json"
        );
    }

    #[test]
    fn serde_uses_identifier_string() {
        let pair: ColumnPair = "A-B".parse().unwrap();
        let json = serde_json::to_string(&pair).unwrap();
        assert_eq!(json, "\"A-B\"");
        let back: ColumnPair = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pair);
        assert!(serde_json::from_str::<ColumnPair>("\"A-B-C\"").is_err());
    }
}
