//! Patient demographics table

use super::{FieldRule, ResourceCatalog, Source, Transform, ValueKind};
use crate::domain::{MappingError, ResourceType};

/// Provincial health card number naming system
pub const HEALTH_CARD_SYSTEM: &str =
    "https://fhir.infoway-inforoute.ca/NamingSystem/ca-on-patient-hcn";

/// Companion target carrying the health card naming system
pub const HEALTH_CARD_SYSTEM_TARGET: &str = "identifier[hcn]/system";

/// Facility chart (medical record) number naming system
pub const CHART_NUMBER_SYSTEM: &str = "https://fhir.ltcf.ca/NamingSystem/facility-chart-number";

/// Complex extension grouping the indigenous identity flags
pub const INDIGENOUS_IDENTITY_URL: &str =
    "https://fhir.ltcf.ca/StructureDefinition/ext-indigenous-identity";

/// Interpreter-needed flag
pub const INTERPRETER_URL: &str =
    "http://hl7.org/fhir/StructureDefinition/patient-interpreterRequired";

const MARITAL_STATUS_SYSTEM: &str = "https://fhir.ltcf.ca/CodeSystem/interrai-marital-status";
const LANGUAGE_SYSTEM: &str = "urn:ietf:bcp:47";

/// Value written in place of an unknown health card number
pub const UNKNOWN_SENTINEL: &str = "unknown";

pub(super) fn catalog() -> Result<ResourceCatalog, MappingError> {
    let indigenous = |flag: &str| format!("extension[{INDIGENOUS_IDENTITY_URL}]/extension[{flag}]/valueCode");

    let rules = vec![
        FieldRule::new(Source::patient("A9A"), &indigenous("firstNations"), ValueKind::Code)?,
        FieldRule::new(Source::patient("A9B"), &indigenous("metis"), ValueKind::Code)?,
        FieldRule::new(Source::patient("A9C"), &indigenous("inuit"), ValueKind::Code)?,
        FieldRule::new(
            Source::patient("A7B"),
            &format!("extension[{INTERPRETER_URL}]/valueBoolean"),
            ValueKind::Boolean,
        )?,
        FieldRule::new(Source::patient("A5A"), "identifier[hcn]/value", ValueKind::String)?
            .with_companion(HEALTH_CARD_SYSTEM_TARGET, ValueKind::Uri, HEALTH_CARD_SYSTEM)?
            .with_sentinel(UNKNOWN_SENTINEL),
        FieldRule::new(
            Source::patient("A5B"),
            "identifier[hcn]/assigner/display",
            ValueKind::String,
        )?
        .requires(Source::patient("A5A")),
        FieldRule::new(Source::patient("A5C"), "identifier[chart]/value", ValueKind::String)?
            .with_companion("identifier[chart]/system", ValueKind::Uri, CHART_NUMBER_SYSTEM)?,
        FieldRule::new(Source::patient("A2"), "gender", ValueKind::Code)?.with_transform(
            Transform::code_map(&[("1", "male"), ("2", "female"), ("3", "other"), ("9", "unknown")]),
        ),
        FieldRule::new(Source::patient("A3"), "birthDate", ValueKind::Date)?,
        FieldRule::new(Source::patient("A6B"), "address/state", ValueKind::String)?,
        FieldRule::new(Source::patient("A6A"), "address/postalCode", ValueKind::String)?,
        FieldRule::new(Source::patient("A4"), "maritalStatus/coding/code", ValueKind::Code)?
            .with_companion("maritalStatus/coding/system", ValueKind::Uri, MARITAL_STATUS_SYSTEM)?,
        FieldRule::new(
            Source::patient("A7A"),
            "communication/language/coding/code",
            ValueKind::Code,
        )?
        .with_companion(
            "communication/language/coding/system",
            ValueKind::Uri,
            LANGUAGE_SYSTEM,
        )?,
        // older extracts carry OrgID under [ADMIN]
        FieldRule::new(
            Source::patient("OrgID"),
            "managingOrganization/reference",
            ValueKind::String,
        )?
        .or_from(Source::admin("OrgID"))
        .with_transform(Transform::template("Organization/{value}")),
    ];

    Ok(ResourceCatalog {
        resource: ResourceType::Patient,
        element_order: [
            "id",
            "meta",
            "extension",
            "identifier",
            "active",
            "name",
            "telecom",
            "gender",
            "birthDate",
            "deceasedBoolean",
            "address",
            "maritalStatus",
            "communication",
            "generalPractitioner",
            "managingOrganization",
        ]
        .iter()
        .map(|e| e.to_string())
        .collect(),
        preamble: Vec::new(),
        scaffold: Vec::new(),
        rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_card_rule_has_sentinel_and_system() {
        let catalog = catalog().unwrap();
        let hcn = catalog
            .rules
            .iter()
            .find(|r| r.source == Source::patient("A5A"))
            .unwrap();
        assert_eq!(hcn.sentinel.as_deref(), Some(UNKNOWN_SENTINEL));
        assert_eq!(hcn.companions.len(), 1);
        assert_eq!(hcn.companions[0].value, HEALTH_CARD_SYSTEM);
    }

    #[test]
    fn test_indigenous_flags_share_group() {
        let catalog = catalog().unwrap();
        let parents: Vec<_> = catalog
            .rules
            .iter()
            .filter(|r| r.target.to_string().contains(INDIGENOUS_IDENTITY_URL))
            .map(|r| r.target.segments()[0].clone())
            .collect();
        assert_eq!(parents.len(), 3);
        assert!(parents.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_patient_reads_only_record_fields() {
        let catalog = catalog().unwrap();
        assert_eq!(catalog.context_rules().count(), 0);
        assert!(catalog.preamble.is_empty());
    }

    #[test]
    fn test_managing_organization_reads_patient_group_first() {
        let catalog = catalog().unwrap();
        let org = catalog
            .rules
            .iter()
            .find(|r| r.target.to_string() == "managingOrganization/reference")
            .unwrap();
        assert_eq!(org.source, Source::patient("OrgID"));
        assert_eq!(org.fallback, Some(Source::admin("OrgID")));
    }
}
