use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::value::ValueError;

/// Dotted property address on a target, e.g. `position` or `material.diffuseColor`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    segments: Vec<String>,
}

impl PropertyPath {
    /// Parse a property path.
    ///
    /// Rules:
    /// - segments are separated by '.'
    /// - no empty segments, no whitespace
    pub fn parse(s: &str) -> Result<Self, ValueError> {
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(ValueError::InvalidPath(s.to_string()));
        }
        let segments: Vec<String> = s.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ValueError::InvalidPath(s.to_string()));
        }
        Ok(PropertyPath { segments })
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Leaf property name.
    pub fn leaf(&self) -> &str {
        self.segments.last().map(|s| s.as_str()).unwrap_or_default()
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for PropertyPath {
    type Err = ValueError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyPath::parse(s)
    }
}

// Serde support: serialize as string, deserialize from string
impl Serialize for PropertyPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PropertyPath {
    fn deserialize<D>(deserializer: D) -> Result<PropertyPath, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PropertyPath::parse(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nested() {
        let p = PropertyPath::parse("material.diffuseColor").unwrap();
        assert_eq!(p.segments().collect::<Vec<_>>(), vec!["material", "diffuseColor"]);
        assert_eq!(p.leaf(), "diffuseColor");
        assert_eq!(p.to_string(), "material.diffuseColor");
    }

    #[test]
    fn parse_single_segment() {
        let p = PropertyPath::parse("influence").unwrap();
        assert_eq!(p.len(), 1);
        assert_eq!(p.leaf(), "influence");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(PropertyPath::parse("").is_err());
        assert!(PropertyPath::parse("position .x").is_err());
        assert!(PropertyPath::parse("position..x").is_err());
        assert!(PropertyPath::parse(".x").is_err());
    }
}
