//! `type/subtype` media types.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A structurally valid mimetype: exactly two non-empty `/`-separated parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MimeType {
    essence: String,
    slash: usize,
}

impl MimeType {
    pub fn type_(&self) -> &str {
        &self.essence[..self.slash]
    }

    pub fn subtype(&self) -> &str {
        &self.essence[self.slash + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.essence
    }
}

impl FromStr for MimeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [type_, subtype] if !type_.is_empty() && !subtype.is_empty() => Ok(Self {
                essence: s.to_string(),
                slash: type_.len(),
            }),
            [_] => Err(format!("'{s}' is missing a subtype")),
            [_, _] => Err(format!("'{s}' has an empty type or subtype")),
            _ => Err(format!("'{s}' has too many parts")),
        }
    }
}

/// Check a mimetype string, returning the reason it is malformed.
pub fn validate_mimetype(value: &str) -> Result<(), String> {
    value.parse::<MimeType>().map(|_| ())
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.essence)
    }
}

impl Serialize for MimeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.essence)
    }
}

impl<'de> Deserialize<'de> for MimeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
