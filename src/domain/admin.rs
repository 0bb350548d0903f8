//! Strongly-typed administrative metadata
//!
//! The admin group of a flat file carries the per-resource operation codes,
//! externally assigned identifiers and the fiscal/quarter routing keys.

use super::ids::ResourceId;
use super::record::ParsedRecord;
use super::resource::{Operation, ResourceType};
use super::result::Result;
use serde::Serialize;

/// Admin field keys as they appear in the flat file
pub mod keys {
    pub const PATIENT_OPERATION: &str = "PatOper";
    pub const ENCOUNTER_OPERATION: &str = "EncOper";
    pub const ASSESSMENT_OPERATION: &str = "QROper";
    pub const PATIENT_ID: &str = "PatID";
    pub const ENCOUNTER_ID: &str = "EncID";
    pub const ASSESSMENT_ID: &str = "QRID";
    pub const FISCAL: &str = "Fiscal";
    pub const QUARTER: &str = "Quarter";
    pub const SUBMITTER_ID: &str = "SubmitterID";
}

/// Operation code and optional existing identifier for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceControl {
    /// Requested operation (CREATE when absent)
    pub operation: Operation,

    /// Externally assigned identifier, if any
    pub existing_id: Option<ResourceId>,
}

impl ResourceControl {
    fn from_fields(operation: Option<&str>, id: Option<&str>) -> Result<Self> {
        Ok(Self {
            operation: Operation::from_optional(operation)?,
            existing_id: id.and_then(|raw| ResourceId::new(raw).ok()),
        })
    }
}

impl Default for ResourceControl {
    fn default() -> Self {
        Self {
            operation: Operation::Create,
            existing_id: None,
        }
    }
}

/// Administrative metadata extracted from a [`ParsedRecord`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdminMetadata {
    pub patient: ResourceControl,
    pub encounter: ResourceControl,
    pub questionnaire_response: ResourceControl,

    /// Fiscal year routing key
    pub fiscal: Option<String>,

    /// Fiscal quarter routing key
    pub quarter: Option<String>,

    /// Submitting organization/system
    pub submitter_id: Option<String>,
}

impl AdminMetadata {
    /// Extracts the admin metadata from a parsed record
    ///
    /// # Errors
    ///
    /// Returns a validation error if an operation code is not one of
    /// CREATE, UPDATE, USE, CORRECTION or DELETE.
    pub fn from_record(record: &ParsedRecord) -> Result<Self> {
        let admin = &record.admin;
        Ok(Self {
            patient: ResourceControl::from_fields(
                admin.value(keys::PATIENT_OPERATION),
                admin.value(keys::PATIENT_ID),
            )?,
            encounter: ResourceControl::from_fields(
                admin.value(keys::ENCOUNTER_OPERATION),
                admin.value(keys::ENCOUNTER_ID),
            )?,
            questionnaire_response: ResourceControl::from_fields(
                admin.value(keys::ASSESSMENT_OPERATION),
                admin.value(keys::ASSESSMENT_ID),
            )?,
            fiscal: admin.value(keys::FISCAL).map(str::to_string),
            quarter: admin.value(keys::QUARTER).map(str::to_string),
            submitter_id: admin.value(keys::SUBMITTER_ID).map(str::to_string),
        })
    }

    /// Returns the control block for a resource type
    pub fn control(&self, resource: ResourceType) -> &ResourceControl {
        match resource {
            ResourceType::Patient => &self.patient,
            ResourceType::Encounter => &self.encounter,
            ResourceType::QuestionnaireResponse => &self.questionnaire_response,
        }
    }
}
