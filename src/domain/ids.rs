//! Resource identifiers and identifier generation
//!
//! Identifiers are either assigned externally (carried in the admin metadata
//! of the flat file) or generated here. Generation goes through the
//! [`IdSource`] trait so a deterministic source can be threaded through the
//! engine under test.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// FHIR resource identifier newtype wrapper
///
/// # Examples
///
/// ```
/// use ltcf_bridge::domain::ids::ResourceId;
/// use std::str::FromStr;
///
/// let id = ResourceId::from_str("7d44b88c-4199-4bad-97dc-d78268e01398").unwrap();
/// assert_eq!(id.as_str(), "7d44b88c-4199-4bad-97dc-d78268e01398");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a new ResourceId from a string
    ///
    /// Surrounding whitespace is trimmed; blank identifiers are rejected.
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err("Resource ID cannot be empty".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Wraps a generated UUID in canonical lowercase hyphenated form
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid.hyphenated().to_string())
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of freshly generated resource identifiers
pub trait IdSource {
    /// Returns the next unused identifier
    fn next_id(&mut self) -> ResourceId;
}

/// Random 128-bit identifiers (UUID v4)
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn next_id(&mut self) -> ResourceId {
        ResourceId::from_uuid(Uuid::new_v4())
    }
}

/// Deterministic identifiers for reproducible output
///
/// Produces `00000000-0000-0000-0000-000000000001`, `...0002`, and so on.
#[derive(Debug, Default, Clone)]
pub struct SequentialIdSource {
    next: u128,
}

impl SequentialIdSource {
    /// Creates a source whose first identifier is `start`
    pub fn starting_at(start: u128) -> Self {
        Self { next: start }
    }
}

impl IdSource for SequentialIdSource {
    fn next_id(&mut self) -> ResourceId {
        self.next += 1;
        ResourceId::from_uuid(Uuid::from_u128(self.next))
    }
}
