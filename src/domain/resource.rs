//! Resource types and operation codes

use super::errors::{BridgeError, MappingError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Top-level resource produced by the mapping engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    /// Patient demographics
    Patient,
    /// Care episode
    Encounter,
    /// The assessment itself
    QuestionnaireResponse,
}

impl ResourceType {
    /// All supported resource types
    pub const ALL: [ResourceType; 3] = [
        ResourceType::Patient,
        ResourceType::Encounter,
        ResourceType::QuestionnaireResponse,
    ];

    /// The schema element name of the resource
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Patient => "Patient",
            ResourceType::Encounter => "Encounter",
            ResourceType::QuestionnaireResponse => "QuestionnaireResponse",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Patient" => Ok(ResourceType::Patient),
            "Encounter" => Ok(ResourceType::Encounter),
            "QuestionnaireResponse" => Ok(ResourceType::QuestionnaireResponse),
            other => Err(MappingError::UnsupportedResource(other.to_string())),
        }
    }
}

/// Administrative operation code governing how a resource is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// New resource (the default when no code is given)
    #[default]
    Create,
    /// Update an existing resource via `$update`
    Update,
    /// Reuse an existing resource; leave it out of the bundle
    Use,
    /// Resubmission of corrected data
    Correction,
    /// Removal of a previously submitted resource
    Delete,
}

impl Operation {
    /// Canonical upper-case code
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Use => "USE",
            Operation::Correction => "CORRECTION",
            Operation::Delete => "DELETE",
        }
    }

    /// Parses an optional raw code; absent or blank means CREATE
    pub fn from_optional(raw: Option<&str>) -> Result<Self, BridgeError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(code) => code.parse(),
            None => Ok(Operation::Create),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Operation::Create),
            "UPDATE" => Ok(Operation::Update),
            "USE" => Ok(Operation::Use),
            "CORRECTION" => Ok(Operation::Correction),
            "DELETE" => Ok(Operation::Delete),
            _ => Err(BridgeError::Validation(format!(
                "Invalid operation code: {s}. Expected one of CREATE, UPDATE, USE, CORRECTION, DELETE"
            ))),
        }
    }
}
