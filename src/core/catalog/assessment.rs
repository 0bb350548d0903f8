//! Assessment (QuestionnaireResponse) table
//!
//! The assessment has a couple of hundred questions spread over twenty
//! sections. Rather than listing one rule per question by hand, each section
//! is described by a compact question list and the rules are generated from
//! it: a question `C1` in section C lands at `item[C]/item[C1]/answer/...`,
//! and a sub-question `C2a` of group `C2` at `item[C]/item[C2]/item[C2a]/...`.

use super::{Constant, ContextValue, FieldRule, ResourceCatalog, Scaffold, Source, ValueKind};
use crate::domain::{MappingError, ResourceType};

/// Canonical URL of the assessment questionnaire
pub const QUESTIONNAIRE_URL: &str = "https://fhir.ltcf.ca/Questionnaire/interrai-ltcf";

/// Where the questionnaire URL is written in the response
pub const QUESTIONNAIRE_TARGET: &str = "questionnaire";

/// Code system of coded assessment responses
pub const RESPONSE_SYSTEM: &str = "https://fhir.ltcf.ca/CodeSystem/interrai-ltcf-responses";

#[derive(Debug, Clone, Copy)]
enum Answer {
    Coded,
    /// Coded answer with a free-text detail nested under it
    CodedWithDetail(&'static str),
    Integer,
    Decimal,
    Date,
    Text,
    /// No answer of its own; only sub-questions
    Group,
}

#[derive(Debug, Clone, Copy)]
struct Question {
    code: &'static str,
    answer: Answer,
    sub: &'static [Question],
}

const fn q(code: &'static str, answer: Answer) -> Question {
    Question {
        code,
        answer,
        sub: &[],
    }
}

const fn coded(code: &'static str) -> Question {
    q(code, Answer::Coded)
}

const fn group(code: &'static str, sub: &'static [Question]) -> Question {
    Question {
        code,
        answer: Answer::Group,
        sub,
    }
}

struct Section {
    letter: &'static str,
    title: &'static str,
    questions: &'static [Question],
}

const SECTIONS: &[Section] = &[
    Section {
        letter: "A",
        title: "Identification Information",
        questions: &[
            coded("A8"),
            q("A12", Answer::Date),
            coded("A13"),
        ],
    },
    Section {
        letter: "B",
        title: "Intake and Initial History",
        questions: &[
            q("B2", Answer::Date),
            coded("B3"),
            coded("B4"),
            group("B5", &[coded("B5a"), coded("B5b"), coded("B5c"), coded("B5d")]),
            coded("B6"),
            coded("B7"),
            coded("B8"),
        ],
    },
    Section {
        letter: "C",
        title: "Cognition",
        questions: &[
            coded("C1"),
            group("C2", &[coded("C2a"), coded("C2b"), coded("C2c"), coded("C2d")]),
            group("C3", &[coded("C3a"), coded("C3b"), coded("C3c")]),
            coded("C4"),
            coded("C5"),
        ],
    },
    Section {
        letter: "D",
        title: "Communication and Vision",
        questions: &[
            coded("D1"),
            coded("D2"),
            group("D3", &[coded("D3a"), coded("D3b")]),
            group("D4", &[coded("D4a"), coded("D4b")]),
        ],
    },
    Section {
        letter: "E",
        title: "Mood and Behaviour",
        questions: &[
            group(
                "E1",
                &[
                    coded("E1a"),
                    coded("E1b"),
                    coded("E1c"),
                    coded("E1d"),
                    coded("E1e"),
                    coded("E1f"),
                    coded("E1g"),
                    coded("E1h"),
                    coded("E1i"),
                    coded("E1j"),
                    coded("E1k"),
                ],
            ),
            group("E2", &[coded("E2a"), coded("E2b"), coded("E2c")]),
            group(
                "E3",
                &[
                    coded("E3a"),
                    coded("E3b"),
                    coded("E3c"),
                    coded("E3d"),
                    coded("E3e"),
                    coded("E3f"),
                ],
            ),
            coded("E4"),
        ],
    },
    Section {
        letter: "F",
        title: "Psychosocial Well-Being",
        questions: &[
            group(
                "F1",
                &[
                    coded("F1a"),
                    coded("F1b"),
                    coded("F1c"),
                    coded("F1d"),
                    coded("F1e"),
                    coded("F1f"),
                    coded("F1g"),
                ],
            ),
            coded("F2"),
            group("F3", &[coded("F3a"), coded("F3b"), coded("F3c")]),
            coded("F4"),
        ],
    },
    Section {
        letter: "G",
        title: "Functional Status",
        questions: &[
            group(
                "G1",
                &[
                    coded("G1a"),
                    coded("G1b"),
                    coded("G1c"),
                    coded("G1d"),
                    coded("G1e"),
                    coded("G1f"),
                    coded("G1g"),
                    coded("G1h"),
                ],
            ),
            group("G2", &[coded("G2a"), coded("G2b")]),
            group("G3", &[q("G3a", Answer::Integer), q("G3b", Answer::Integer)]),
            group("G4", &[coded("G4a"), coded("G4b")]),
        ],
    },
    Section {
        letter: "H",
        title: "Continence",
        questions: &[coded("H1"), coded("H2"), coded("H3"), coded("H4")],
    },
    Section {
        letter: "I",
        title: "Disease Diagnoses",
        questions: &[group(
            "I1",
            &[
                coded("I1a"),
                coded("I1b"),
                coded("I1c"),
                coded("I1d"),
                coded("I1e"),
                coded("I1f"),
                coded("I1g"),
                coded("I1h"),
                coded("I1i"),
                coded("I1j"),
                coded("I1k"),
                coded("I1l"),
                coded("I1m"),
                coded("I1n"),
                coded("I1o"),
                coded("I1p"),
                coded("I1q"),
                coded("I1r"),
                coded("I1s"),
                coded("I1t"),
            ],
        )],
    },
    Section {
        letter: "J",
        title: "Health Conditions",
        questions: &[
            coded("J1"),
            group(
                "J2",
                &[
                    coded("J2a"),
                    coded("J2b"),
                    coded("J2c"),
                    coded("J2d"),
                    coded("J2e"),
                    coded("J2f"),
                    coded("J2g"),
                    coded("J2h"),
                    coded("J2i"),
                    coded("J2j"),
                    coded("J2k"),
                    coded("J2l"),
                    coded("J2m"),
                    coded("J2n"),
                ],
            ),
            coded("J3"),
            coded("J4"),
            group(
                "J5",
                &[
                    coded("J5a"),
                    coded("J5b"),
                    coded("J5c"),
                    coded("J5d"),
                    coded("J5e"),
                ],
            ),
            group("J6", &[coded("J6a"), coded("J6b"), coded("J6c")]),
            coded("J7"),
            coded("J8"),
        ],
    },
    Section {
        letter: "K",
        title: "Oral and Nutritional Status",
        questions: &[
            group("K1", &[q("K1a", Answer::Integer), q("K1b", Answer::Decimal)]),
            group(
                "K2",
                &[coded("K2a"), coded("K2b"), coded("K2c"), coded("K2d")],
            ),
            coded("K3"),
            group("K4", &[coded("K4a"), coded("K4b"), coded("K4c")]),
        ],
    },
    Section {
        letter: "L",
        title: "Skin Condition",
        questions: &[
            coded("L1"),
            coded("L2"),
            coded("L3"),
            coded("L4"),
            coded("L5"),
            coded("L6"),
        ],
    },
    Section {
        letter: "M",
        title: "Activity Pursuits",
        questions: &[
            coded("M1"),
            group(
                "M2",
                &[
                    coded("M2a"),
                    coded("M2b"),
                    coded("M2c"),
                    coded("M2d"),
                    coded("M2e"),
                    coded("M2f"),
                    coded("M2g"),
                    coded("M2h"),
                ],
            ),
            coded("M3"),
        ],
    },
    Section {
        letter: "N",
        title: "Medications",
        questions: &[
            q("N1", Answer::Integer),
            group("N2", &[coded("N2a"), coded("N2b"), coded("N2c")]),
            coded("N3"),
        ],
    },
    Section {
        letter: "O",
        title: "Treatments and Procedures",
        questions: &[
            group(
                "O1",
                &[
                    coded("O1a"),
                    coded("O1b"),
                    coded("O1c"),
                    coded("O1d"),
                    coded("O1e"),
                    coded("O1f"),
                    coded("O1g"),
                    coded("O1h"),
                ],
            ),
            group(
                "O2",
                &[
                    coded("O2a"),
                    coded("O2b"),
                    coded("O2c"),
                    coded("O2d"),
                    coded("O2e"),
                    coded("O2f"),
                ],
            ),
            group(
                "O3",
                &[
                    q("O3aD", Answer::Integer),
                    q("O3aM", Answer::Integer),
                    q("O3bD", Answer::Integer),
                    q("O3bM", Answer::Integer),
                    q("O3cD", Answer::Integer),
                    q("O3cM", Answer::Integer),
                    q("O3dD", Answer::Integer),
                    q("O3dM", Answer::Integer),
                    q("O3eD", Answer::Integer),
                    q("O3eM", Answer::Integer),
                    q("O3fD", Answer::Integer),
                    q("O3fM", Answer::Integer),
                ],
            ),
            q("O4", Answer::Integer),
            group("O5", &[coded("O5a"), coded("O5b"), coded("O5c")]),
        ],
    },
    Section {
        letter: "P",
        title: "Responsibility and Advance Directives",
        questions: &[
            coded("P1"),
            group(
                "P2",
                &[
                    coded("P2a"),
                    coded("P2b"),
                    coded("P2c"),
                    coded("P2d"),
                    coded("P2e"),
                    coded("P2f"),
                    coded("P2g"),
                ],
            ),
        ],
    },
    Section {
        letter: "Q",
        title: "Social Supports",
        questions: &[
            group(
                "Q1",
                &[
                    coded("Q1a"),
                    coded("Q1b"),
                    coded("Q1c"),
                    coded("Q1d"),
                    coded("Q1e"),
                ],
            ),
            coded("Q2"),
            coded("Q3"),
        ],
    },
    Section {
        letter: "R",
        title: "Discharge Potential",
        questions: &[
            q("R1", Answer::CodedWithDetail("R1A")),
            coded("R2"),
            coded("R3"),
        ],
    },
    Section {
        letter: "S",
        title: "Discharge",
        questions: &[q("S1", Answer::Date), coded("S2")],
    },
    Section {
        letter: "T",
        title: "Assessment Information",
        questions: &[
            group("T1", &[coded("T1a"), coded("T1b"), coded("T1c")]),
            q("T2", Answer::Date),
            q("T3", Answer::Text),
        ],
    },
];

fn section_name(letter: &str) -> String {
    format!("SECTION {letter}")
}

fn push_question_rules(
    rules: &mut Vec<FieldRule>,
    section: &Section,
    parent: &str,
    question: &Question,
) -> Result<(), MappingError> {
    let prefix = format!("{parent}/item[{}]", question.code);
    let source = || Source::assessment(&section_name(section.letter), question.code);

    let leaf = |kind: ValueKind| -> Result<FieldRule, MappingError> {
        let element = match kind {
            ValueKind::Integer => "valueInteger",
            ValueKind::Decimal => "valueDecimal",
            ValueKind::Date => "valueDate",
            ValueKind::Boolean => "valueBoolean",
            _ => "valueString",
        };
        FieldRule::new(source(), &format!("{prefix}/answer/{element}"), kind)
    };
    let coded_rule = || -> Result<FieldRule, MappingError> {
        FieldRule::new(source(), &format!("{prefix}/answer/valueCoding/code"), ValueKind::Code)?
            .with_companion(
                &format!("{prefix}/answer/valueCoding/system"),
                ValueKind::Uri,
                RESPONSE_SYSTEM,
            )
    };

    match question.answer {
        Answer::Coded => rules.push(coded_rule()?),
        Answer::CodedWithDetail(detail) => {
            rules.push(coded_rule()?);
            rules.push(
                FieldRule::new(
                    Source::assessment(&section_name(section.letter), detail),
                    &format!("{prefix}/answer/item[{detail}]/answer/valueString"),
                    ValueKind::String,
                )?
                .requires(source()),
            );
        }
        Answer::Integer => rules.push(leaf(ValueKind::Integer)?),
        Answer::Decimal => rules.push(leaf(ValueKind::Decimal)?),
        Answer::Date => rules.push(leaf(ValueKind::Date)?),
        Answer::Text => rules.push(leaf(ValueKind::String)?),
        Answer::Group => {}
    }

    for sub in question.sub {
        push_question_rules(rules, section, &prefix, sub)?;
    }
    Ok(())
}

pub(super) fn catalog() -> Result<ResourceCatalog, MappingError> {
    let mut rules = vec![
        FieldRule::new(
            Source::context(ContextValue::PatientReference),
            "subject/reference",
            ValueKind::String,
        )?,
        FieldRule::new(
            Source::context(ContextValue::EncounterReference),
            "encounter/reference",
            ValueKind::String,
        )?,
        FieldRule::new(Source::assessment("SECTION A", "A12"), "authored", ValueKind::Date)?,
        FieldRule::new(
            Source::admin("SubmitterID"),
            "author/identifier/value",
            ValueKind::String,
        )?,
    ];
    let mut scaffold = Vec::with_capacity(SECTIONS.len());

    for section in SECTIONS {
        let root = format!("item[{}]", section.letter);
        scaffold.push(Scaffold {
            target: root.parse()?,
            text: Some(section.title.to_string()),
        });
        for question in section.questions {
            push_question_rules(&mut rules, section, &root, question)?;
        }
    }

    Ok(ResourceCatalog {
        resource: ResourceType::QuestionnaireResponse,
        element_order: [
            "id",
            "meta",
            "extension",
            "identifier",
            "basedOn",
            "partOf",
            "questionnaire",
            "status",
            "subject",
            "encounter",
            "authored",
            "author",
            "source",
            "item",
        ]
        .iter()
        .map(|e| e.to_string())
        .collect(),
        preamble: vec![
            Constant::new(QUESTIONNAIRE_TARGET, ValueKind::Uri, QUESTIONNAIRE_URL)?,
            Constant::new("status", ValueKind::Code, "completed")?,
        ],
        scaffold,
        rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(catalog: &'a ResourceCatalog, section: &str, key: &str) -> &'a FieldRule {
        let source = Source::assessment(section, key);
        catalog
            .rules
            .iter()
            .find(|r| r.source == source)
            .unwrap_or_else(|| panic!("no rule for {section}/{key}"))
    }

    #[test]
    fn test_every_section_is_scaffolded() {
        let catalog = catalog().unwrap();
        assert_eq!(catalog.scaffold.len(), 20);
        assert_eq!(catalog.scaffold[0].target.to_string(), "item[A]");
        assert_eq!(
            catalog.scaffold[2].text.as_deref(),
            Some("Cognition")
        );
    }

    #[test]
    fn test_coded_question_path() {
        let catalog = catalog().unwrap();
        let rule = find(&catalog, "SECTION C", "C1");
        assert_eq!(rule.target.to_string(), "item[C]/item[C1]/answer/valueCoding/code");
        assert_eq!(rule.kind, ValueKind::Code);
        assert_eq!(
            rule.companions[0].target.to_string(),
            "item[C]/item[C1]/answer/valueCoding/system"
        );
    }

    #[test]
    fn test_sub_question_is_nested_under_group() {
        let catalog = catalog().unwrap();
        let rule = find(&catalog, "SECTION G", "G1a");
        assert_eq!(
            rule.target.to_string(),
            "item[G]/item[G1]/item[G1a]/answer/valueCoding/code"
        );
        assert!(catalog
            .rules
            .iter()
            .all(|r| r.source != Source::assessment("SECTION G", "G1")));
    }

    #[test]
    fn test_numeric_and_date_answers() {
        let catalog = catalog().unwrap();
        assert_eq!(
            find(&catalog, "SECTION K", "K1a").target.to_string(),
            "item[K]/item[K1]/item[K1a]/answer/valueInteger"
        );
        assert_eq!(find(&catalog, "SECTION K", "K1b").kind, ValueKind::Decimal);
        assert_eq!(find(&catalog, "SECTION O", "O3aM").kind, ValueKind::Integer);
        assert_eq!(
            find(&catalog, "SECTION A", "A12").target.to_string(),
            "authored"
        );
    }

    #[test]
    fn test_care_goal_detail_depends_on_primary() {
        let catalog = catalog().unwrap();
        let detail = find(&catalog, "SECTION R", "R1A");
        assert_eq!(
            detail.target.to_string(),
            "item[R]/item[R1]/answer/item[R1A]/answer/valueString"
        );
        assert_eq!(detail.requires, Some(Source::assessment("SECTION R", "R1")));

        let primary = catalog
            .rules
            .iter()
            .position(|r| r.source == Source::assessment("SECTION R", "R1"))
            .unwrap();
        let secondary = catalog
            .rules
            .iter()
            .position(|r| r.source == Source::assessment("SECTION R", "R1A"))
            .unwrap();
        assert!(primary < secondary);
    }

    #[test]
    fn test_context_rules_reference_subject_and_encounter() {
        let catalog = catalog().unwrap();
        let targets: Vec<String> = catalog
            .context_rules()
            .map(|r| r.target.to_string())
            .collect();
        assert_eq!(targets, vec!["subject/reference", "encounter/reference"]);
    }
}
