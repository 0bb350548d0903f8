//! Integration tests for the mapping engine
//!
//! These tests drive flat-file text through the parser, the bundle
//! assembler and the XML serializer with deterministic identifiers.

use ltcf_bridge::adapters::flatfile;
use ltcf_bridge::core::builder::{
    BuildContext, SentinelPolicy, TreeBuilder, DATA_ABSENT_REASON_URL,
};
use ltcf_bridge::core::bundle::{AssembledBundle, AssemblyOptions, BundleAssembler};
use ltcf_bridge::core::catalog::{patient, FieldCatalog, FieldRule, Source, Transform, ValueKind};
use ltcf_bridge::core::prune::{has_empty_branch, prune};
use ltcf_bridge::core::serialize::to_xml;
use ltcf_bridge::domain::{
    AdminMetadata, BridgeError, MappingError, Operation, ParsedRecord, ResourceType, Result,
    SequentialIdSource,
};
use test_case::test_case;

const BASE: &str = "\
[ADMIN]
Fiscal=2024
Quarter=Q2
SubmitterID=ORG1

[PATIENT]
A2=2
A3=1948-03-09

[ENCOUNTER]
B2=2024-02-01

[SECTION A]
A12=2024-02-03

[SECTION C]
C1=1
";

fn assemble_with(text: &str, options: AssemblyOptions) -> Result<AssembledBundle> {
    let record = flatfile::parse_str(text)?;
    let admin = AdminMetadata::from_record(&record)?;
    let catalog = FieldCatalog::standard()?;
    let mut ids = SequentialIdSource::default();
    BundleAssembler::new(&catalog, options).assemble(&record, &admin, &mut ids)
}

fn assemble(text: &str) -> AssembledBundle {
    assemble_with(text, AssemblyOptions::default()).unwrap()
}

fn with_patient_field(field: &str) -> String {
    BASE.replace("A3=1948-03-09", &format!("A3=1948-03-09\n{field}"))
}

fn with_admin_fields(fields: &str) -> String {
    BASE.replace("SubmitterID=ORG1", &format!("SubmitterID=ORG1\n{fields}"))
}

const RESOURCES: [ResourceType; 3] = [
    ResourceType::Patient,
    ResourceType::Encounter,
    ResourceType::QuestionnaireResponse,
];

/// A value every rule of this shape accepts
fn sample_value(rule: &FieldRule) -> String {
    if let Transform::CodeMap { entries } = &rule.transform {
        if let Some((from, _)) = entries.first() {
            return from.clone();
        }
    }
    match rule.kind {
        ValueKind::Date => "2024-01-15",
        ValueKind::Integer | ValueKind::Boolean => "1",
        ValueKind::Decimal => "1.5",
        _ => "x",
    }
    .to_string()
}

fn fill(record: &mut ParsedRecord, source: &Source, value: String) {
    match source {
        Source::Admin { key } => record.admin.insert(key, value),
        Source::Patient { key } => record.patient.insert(key, value),
        Source::Encounter { key } => record.encounter.insert(key, value),
        Source::Assessment { section, key } => record.section_mut(section).insert(key, value),
        Source::Context { .. } => {}
    }
}

fn reference_context() -> BuildContext {
    BuildContext {
        patient_reference: Some("urn:uuid:patient".to_string()),
        encounter_reference: Some("urn:uuid:encounter".to_string()),
        sentinel_policy: SentinelPolicy::Omit,
    }
}

#[test]
fn test_entries_in_fixed_order() {
    let assembled = assemble(BASE);
    let types: Vec<_> = assembled.bundle.entries.iter().map(|e| e.resource_type).collect();
    assert_eq!(
        types,
        vec![
            ResourceType::Encounter,
            ResourceType::QuestionnaireResponse,
            ResourceType::Patient
        ]
    );

    let xml = to_xml(&assembled.bundle).unwrap();
    let encounter = xml.find("<Encounter>").unwrap();
    let response = xml.find("<QuestionnaireResponse>").unwrap();
    let patient = xml.find("<Patient>").unwrap();
    assert!(encounter < response && response < patient);
}

#[test]
fn test_document_shape() {
    let xml = to_xml(&assemble(BASE).bundle).unwrap();
    assert!(xml.contains("<Bundle xmlns=\"http://hl7.org/fhir\">"));
    assert!(xml.contains("<type value=\"transaction\"/>"));
    assert_eq!(xml.matches("<entry>").count(), 3);
    assert_eq!(xml.matches("<fullUrl ").count(), 3);
    assert_eq!(xml.matches("<request>").count(), 3);
}

#[test]
fn test_unknown_health_card_is_omitted_by_default() {
    let assembled = assemble(&with_patient_field("A5A=unknown"));
    let patient = assembled.bundle.entry(ResourceType::Patient).unwrap();

    assert!(patient.resource.keyed_child("identifier", "hcn").is_none());
    let xml = to_xml(&assembled.bundle).unwrap();
    assert!(!xml.contains(patient::HEALTH_CARD_SYSTEM));
}

#[test]
fn test_unknown_health_card_with_data_absent_reason() {
    let options = AssemblyOptions {
        sentinel_policy: SentinelPolicy::DataAbsentReason,
        strict_update_ids: false,
    };
    let assembled = assemble_with(&with_patient_field("A5A=unknown"), options).unwrap();
    let xml = to_xml(&assembled.bundle).unwrap();

    assert!(xml.contains(DATA_ABSENT_REASON_URL));
    assert!(!xml.contains("<value value=\"unknown\"/>"));
}

#[test]
fn test_sentinel_match_is_case_sensitive() {
    let assembled = assemble(&with_patient_field("A5A=Unknown"));
    let xml = to_xml(&assembled.bundle).unwrap();
    assert!(xml.contains("<value value=\"Unknown\"/>"));
    assert!(xml.contains(patient::HEALTH_CARD_SYSTEM));
}

#[test]
fn test_health_card_with_system() {
    let xml = to_xml(&assemble(&with_patient_field("A5A=1234567890")).bundle).unwrap();
    assert!(xml.contains("<value value=\"1234567890\"/>"));
    assert!(xml.contains(patient::HEALTH_CARD_SYSTEM));
}

#[test]
fn test_absent_section_a_emits_nothing_for_it() {
    let text = BASE.replace("[SECTION A]\nA12=2024-02-03\n", "");
    let assembled = assemble(&text);
    let response = assembled
        .bundle
        .entry(ResourceType::QuestionnaireResponse)
        .unwrap();

    assert!(response.resource.child("authored").is_none());
    assert!(response.resource.keyed_child("item", "A").is_none());
    assert!(response.resource.keyed_child("item", "C").is_some());
}

#[test]
fn test_blank_value_is_absent() {
    let text = BASE.replace("A12=2024-02-03", "A12=");
    let assembled = assemble(&text);
    let response = assembled
        .bundle
        .entry(ResourceType::QuestionnaireResponse)
        .unwrap();
    assert!(response.resource.child("authored").is_none());
}

#[test]
fn test_patient_use_references_existing_id() {
    let assembled = assemble(&with_admin_fields("PatOper=USE\nPatID=pat-42"));

    assert!(assembled.bundle.entry(ResourceType::Patient).is_none());
    let xml = to_xml(&assembled.bundle).unwrap();
    assert!(xml.contains("<reference value=\"Patient/pat-42\"/>"));
    assert!(!xml.contains("<Patient>"));
}

#[test]
fn test_update_uses_supplied_identifier() {
    let assembled = assemble(&with_admin_fields("EncOper=UPDATE\nEncID=enc-7"));
    let encounter = assembled.bundle.entry(ResourceType::Encounter).unwrap();

    assert_eq!(encounter.id.as_str(), "enc-7");
    assert_eq!(encounter.full_url, "Encounter/enc-7");
    assert_eq!(encounter.request.target(), "POST /Encounter/enc-7/$update");

    let xml = to_xml(&assembled.bundle).unwrap();
    assert!(xml.contains("<reference value=\"Encounter/enc-7\"/>"));
}

#[test]
fn test_identities_match_bundle_entries() {
    let assembled = assemble(BASE);
    assert_eq!(assembled.identities.len(), 3);

    for identity in assembled.identities.iter() {
        let entry = assembled.bundle.entry(identity.resource).unwrap();
        assert_eq!(entry.id, identity.id);
        assert_eq!(entry.full_url, identity.reference);
        assert!(identity.generated);
    }
}

#[test]
fn test_same_input_same_document() {
    let first = to_xml(&assemble(BASE).bundle).unwrap();
    let second = to_xml(&assemble(BASE).bundle).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_pruning_is_idempotent_on_assembled_resources() {
    let assembled = assemble(BASE);
    for entry in &assembled.bundle.entries {
        assert!(!has_empty_branch(&entry.resource));

        let mut again = entry.resource.clone();
        let stats = prune(&mut again);
        assert_eq!(stats.removed, 0);
        assert_eq!(again, entry.resource);
    }
}

#[test]
fn test_invalid_date_fails_loudly() {
    let text = BASE.replace("A3=1948-03-09", "A3=1948-13-40");
    let err = assemble_with(&text, AssemblyOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Mapping(MappingError::InvalidValue { ref field, .. }) if field == "patient/A3"
    ));
}

#[test]
fn test_strict_update_without_identifier_fails() {
    let options = AssemblyOptions {
        sentinel_policy: SentinelPolicy::Omit,
        strict_update_ids: true,
    };
    let err = assemble_with(&with_admin_fields("PatOper=UPDATE"), options).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Mapping(MappingError::MissingIdentifier { .. })
    ));
}

#[test_case("CREATE", Operation::Create)]
#[test_case("correction", Operation::Correction)]
#[test_case("Delete", Operation::Delete)]
fn test_operation_codes_recorded(code: &str, expected: Operation) {
    let assembled = assemble(&with_admin_fields(&format!("QROper={code}")));
    let identity = assembled
        .identities
        .get(ResourceType::QuestionnaireResponse)
        .unwrap();
    assert_eq!(identity.operation, expected);
    assert!(identity.included);
}

#[test]
fn test_no_assessment_data_no_questionnaire_response() {
    let text = BASE
        .replace("[SECTION A]\nA12=2024-02-03\n", "")
        .replace("[SECTION C]\nC1=1\n", "");
    let assembled = assemble(&text);
    assert!(assembled
        .bundle
        .entry(ResourceType::QuestionnaireResponse)
        .is_none());
    assert_eq!(assembled.bundle.entries.len(), 2);
}

#[test]
fn test_every_catalogued_field_prunes_to_no_empty_branch() {
    let catalog = FieldCatalog::standard().unwrap();
    let mut record = ParsedRecord::new();
    for resource in RESOURCES {
        for rule in catalog.resource(resource).unwrap().record_rules() {
            fill(&mut record, &rule.source, sample_value(rule));
        }
    }

    let builder = TreeBuilder::new(&catalog);
    for resource in RESOURCES {
        let table = catalog.resource(resource).unwrap();
        let mut built = builder.build(&record, resource, &reference_context()).unwrap();
        assert_eq!(built.fields_mapped, table.record_rules().count(), "{resource}");

        prune(&mut built.root);
        assert!(!built.root.children().is_empty(), "{resource}");
        assert!(!has_empty_branch(&built.root), "{resource}");

        let mut again = built.root.clone();
        assert_eq!(prune(&mut again).removed, 0, "{resource}");
        assert_eq!(again, built.root);
    }
}

#[test]
fn test_dependent_fields_without_primary_leave_nothing_behind() {
    let catalog = FieldCatalog::standard().unwrap();
    let builder = TreeBuilder::new(&catalog);

    let mut record = ParsedRecord::new();
    record.patient.insert("A5B", "ON");
    record.section_mut("SECTION R").insert("R1A", "Return home");
    for resource in [ResourceType::Patient, ResourceType::QuestionnaireResponse] {
        let mut built = builder.build(&record, resource, &reference_context()).unwrap();
        prune(&mut built.root);
        assert_eq!(built.fields_mapped, 0, "{resource}");
        assert!(built.root.children().is_empty(), "{resource}");
    }

    let text = BASE
        .replace("A3=1948-03-09", "A3=1948-03-09\nA5B=ON")
        .replace("C1=1\n", "C1=1\n\n[SECTION R]\nR1A=Return home\n");
    let assembled = assemble(&text);
    let patient = assembled.bundle.entry(ResourceType::Patient).unwrap();
    let response = assembled
        .bundle
        .entry(ResourceType::QuestionnaireResponse)
        .unwrap();

    assert!(patient.resource.keyed_child("identifier", "hcn").is_none());
    assert!(response.resource.keyed_child("item", "R").is_none());
    for entry in &assembled.bundle.entries {
        assert!(!has_empty_branch(&entry.resource), "{}", entry.resource_type);
    }
    let xml = to_xml(&assembled.bundle).unwrap();
    assert!(!xml.contains("Return home"));
    assert!(!xml.contains(patient::HEALTH_CARD_SYSTEM));
}

#[test]
fn test_managing_organization_from_patient_group() {
    let assembled = assemble(&with_patient_field("A5A=unknown\nOrgID=ORG1"));
    let patient = assembled.bundle.entry(ResourceType::Patient).unwrap();

    assert!(patient.resource.keyed_child("identifier", "hcn").is_none());
    let reference = patient
        .resource
        .child("managingOrganization")
        .and_then(|org| org.child("reference"))
        .unwrap();
    assert_eq!(reference.value_str().as_deref(), Some("Organization/ORG1"));

    let xml = to_xml(&assembled.bundle).unwrap();
    assert!(xml.contains("<birthDate value=\"1948-03-09\"/>"));
    assert!(xml.contains("<reference value=\"Organization/ORG1\"/>"));
}
