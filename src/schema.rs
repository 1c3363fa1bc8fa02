//! Inferred per-chunk schema and its on-disk artifact.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

const NOT_APPLICABLE: &str = "n/a";

/// Positional layout of the email token relative to the credential token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Placement {
    #[serde(rename = "email:poh")]
    EmailPoh,
    #[serde(rename = "poh:email")]
    PohEmail,
    #[serde(rename = "unknown:email:unknown")]
    UnknownEmailUnknown,
    #[serde(rename = "email")]
    EmailOnly,
    #[serde(rename = "n/a")]
    NotApplicable,
}

impl Placement {
    pub fn as_str(self) -> &'static str {
        match self {
            Placement::EmailPoh => "email:poh",
            Placement::PohEmail => "poh:email",
            Placement::UnknownEmailUnknown => "unknown:email:unknown",
            Placement::EmailOnly => "email",
            Placement::NotApplicable => NOT_APPLICABLE,
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field separator under a placement, or `n/a`.
/// Serialized as the bare character, or the string `"n/a"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Delimiter {
    Char(char),
    NotApplicable,
}

impl Delimiter {
    pub fn as_char(self) -> Option<char> {
        match self {
            Delimiter::Char(c) => Some(c),
            Delimiter::NotApplicable => None,
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delimiter::Char(c) => write!(f, "{c}"),
            Delimiter::NotApplicable => f.write_str(NOT_APPLICABLE),
        }
    }
}

impl Serialize for Delimiter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Delimiter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == NOT_APPLICABLE {
            return Ok(Delimiter::NotApplicable);
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Delimiter::Char(c)),
            _ => Err(de::Error::custom(format!(
                "delimiter must be a single character or \"n/a\", got {s:?}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub placement: Placement,
    pub delimiter: Delimiter,
}

impl Schema {
    pub const UNDETERMINED: Schema = Schema {
        placement: Placement::NotApplicable,
        delimiter: Delimiter::NotApplicable,
    };
}

impl Default for Schema {
    fn default() -> Self {
        Self::UNDETERMINED
    }
}

/// What the detector writes per chunk and the parser reads back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaArtifact {
    pub filename: String,
    pub schema: Schema,
}
