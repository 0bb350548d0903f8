//! Target paths into the output tree
//!
//! A path is a `/`-separated list of element names from the resource root
//! to the leaf. Any segment may carry a grouping key in brackets:
//! `identifier[hcn]/value`, `item[C]/item[C1]/answer/valueCoding/code`.
//! Keys may themselves contain `/` (extension URLs), so splitting honours
//! bracket nesting.

use crate::domain::MappingError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One step of a [`TargetPath`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub name: String,
    pub key: Option<String>,
}

impl Segment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
        }
    }

    pub fn keyed(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: Some(key.into()),
        }
    }

    fn parse(raw: &str, whole: &str) -> Result<Self, MappingError> {
        let invalid = || MappingError::InvalidPath(whole.to_string());
        let (name, key) = match raw.find('[') {
            Some(open) => {
                let rest = raw[open + 1..].strip_suffix(']').ok_or_else(invalid)?;
                if rest.trim().is_empty() {
                    return Err(invalid());
                }
                (&raw[..open], Some(rest.to_string()))
            }
            None => (raw, None),
        };
        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_name {
            return Err(invalid());
        }
        Ok(Self {
            name: name.to_string(),
            key,
        })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}[{}]", self.name, key),
            None => f.write_str(&self.name),
        }
    }
}

/// Ordered list of segments from a resource root to a leaf
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetPath(Vec<Segment>);

impl TargetPath {
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// All segments but the last
    pub fn parent(&self) -> &[Segment] {
        &self.0[..self.0.len().saturating_sub(1)]
    }

    /// The last segment
    pub fn leaf(&self) -> &Segment {
        // parsing guarantees at least one segment
        &self.0[self.0.len() - 1]
    }

    /// Appends a segment, returning a new path
    pub fn join(&self, segment: Segment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for TargetPath {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;

        for (i, c) in s.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| MappingError::InvalidPath(s.to_string()))?
                }
                '/' if depth == 0 => {
                    segments.push(Segment::parse(&s[start..i], s)?);
                    start = i + 1;
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err(MappingError::InvalidPath(s.to_string()));
        }
        segments.push(Segment::parse(&s[start..], s)?);

        Ok(Self(segments))
    }
}

impl fmt::Display for TargetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl Serialize for TargetPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TargetPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
