//! Encounter (care episode) table

use super::{Constant, ContextValue, FieldRule, ResourceCatalog, Source, ValueKind};
use crate::domain::{MappingError, ResourceType};

const ACT_CODE_SYSTEM: &str = "http://terminology.hl7.org/CodeSystem/v3-ActCode";
const FACILITY_SYSTEM: &str = "https://fhir.ltcf.ca/NamingSystem/facility-id";
const EPISODE_SYSTEM: &str = "https://fhir.ltcf.ca/NamingSystem/episode-id";
const PROGRAM_TYPE_SYSTEM: &str = "https://fhir.ltcf.ca/CodeSystem/ltc-program-type";
const REASON_SYSTEM: &str = "https://fhir.ltcf.ca/CodeSystem/interrai-assessment-reason";
const ADMIT_SOURCE_SYSTEM: &str = "https://fhir.ltcf.ca/CodeSystem/interrai-admitted-from";
const DISCHARGE_SYSTEM: &str = "https://fhir.ltcf.ca/CodeSystem/interrai-discharged-to";

pub(super) fn catalog() -> Result<ResourceCatalog, MappingError> {
    let rules = vec![
        FieldRule::new(Source::encounter("EpisodeID"), "identifier[episode]/value", ValueKind::String)?
            .with_companion("identifier[episode]/system", ValueKind::Uri, EPISODE_SYSTEM)?,
        FieldRule::new(Source::encounter("ProgramType"), "type/coding/code", ValueKind::Code)?
            .with_companion("type/coding/system", ValueKind::Uri, PROGRAM_TYPE_SYSTEM)?,
        FieldRule::new(
            Source::context(ContextValue::PatientReference),
            "subject/reference",
            ValueKind::String,
        )?,
        FieldRule::new(Source::encounter("B2"), "period/start", ValueKind::Date)?,
        FieldRule::new(Source::encounter("R3"), "period/end", ValueKind::Date)?,
        FieldRule::new(Source::encounter("A8"), "reasonCode/coding/code", ValueKind::Code)?
            .with_companion("reasonCode/coding/system", ValueKind::Uri, REASON_SYSTEM)?,
        FieldRule::new(
            Source::encounter("B3"),
            "hospitalization/admitSource/coding/code",
            ValueKind::Code,
        )?
        .with_companion(
            "hospitalization/admitSource/coding/system",
            ValueKind::Uri,
            ADMIT_SOURCE_SYSTEM,
        )?,
        FieldRule::new(
            Source::encounter("R2"),
            "hospitalization/dischargeDisposition/coding/code",
            ValueKind::Code,
        )?
        .with_companion(
            "hospitalization/dischargeDisposition/coding/system",
            ValueKind::Uri,
            DISCHARGE_SYSTEM,
        )?,
        FieldRule::new(
            Source::encounter("FacilityID"),
            "serviceProvider/identifier/value",
            ValueKind::String,
        )?
        .with_companion(
            "serviceProvider/identifier/system",
            ValueKind::Uri,
            FACILITY_SYSTEM,
        )?,
    ];

    Ok(ResourceCatalog {
        resource: ResourceType::Encounter,
        element_order: [
            "id",
            "meta",
            "extension",
            "identifier",
            "status",
            "class",
            "type",
            "serviceType",
            "priority",
            "subject",
            "episodeOfCare",
            "period",
            "length",
            "reasonCode",
            "hospitalization",
            "location",
            "serviceProvider",
        ]
        .iter()
        .map(|e| e.to_string())
        .collect(),
        preamble: vec![
            Constant::new("status", ValueKind::Code, "finished")?,
            Constant::new("class/system", ValueKind::Uri, ACT_CODE_SYSTEM)?,
            Constant::new("class/code", ValueKind::Code, "IMP")?,
        ],
        scaffold: Vec::new(),
        rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_comes_from_context() {
        let catalog = catalog().unwrap();
        let context: Vec<_> = catalog.context_rules().collect();
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].target.to_string(), "subject/reference");
    }

    #[test]
    fn test_element_order_places_status_before_subject() {
        let catalog = catalog().unwrap();
        assert!(catalog.element_rank("status") < catalog.element_rank("subject"));
        assert!(catalog.element_rank("period") < catalog.element_rank("serviceProvider"));
        assert_eq!(catalog.element_rank("unknownElement"), catalog.element_order.len());
    }
}
