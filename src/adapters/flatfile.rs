//! Flat-file tokenizer
//!
//! An assessment file is a sequence of bracketed section headers followed
//! by `KEY=VALUE` lines:
//!
//! ```text
//! [ADMIN]
//! PatOper=CREATE
//! Fiscal=2024
//!
//! [PATIENT]
//! A3=1950-01-01
//!
//! [SECTION C]
//! C1=0
//! ```
//!
//! Headers are case-insensitive. Blank lines and lines starting with `#`
//! are ignored. A value may be empty; the engine treats it as absent.

use crate::domain::{ParseError, ParsedRecord, Result};
use std::path::Path;

/// Group a header line selects
#[derive(Debug, Clone, PartialEq, Eq)]
enum Group {
    Admin,
    Patient,
    Encounter,
    Section(String),
}

impl Group {
    fn from_header(header: &str) -> Option<Self> {
        let normalized = header
            .split_whitespace()
            .map(str::to_ascii_uppercase)
            .collect::<Vec<_>>();
        match normalized.as_slice() {
            [one] if one == "ADMIN" => Some(Group::Admin),
            [one] if one == "PATIENT" => Some(Group::Patient),
            [one] if one == "ENCOUNTER" => Some(Group::Encounter),
            [section, letter] if section == "SECTION" && is_section_letter(letter) => {
                Some(Group::Section(format!("SECTION {letter}")))
            }
            _ => None,
        }
    }
}

fn is_section_letter(letter: &str) -> bool {
    !letter.is_empty() && letter.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Parses flat-file text into a [`ParsedRecord`]
///
/// # Errors
///
/// Fails on an unknown header, a line that is not `KEY=VALUE`, a field
/// before the first header, or a file with no fields at all.
pub fn parse_str(input: &str) -> Result<ParsedRecord> {
    let mut record = ParsedRecord::new();
    let mut current: Option<Group> = None;
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    for (index, raw) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let group = Group::from_header(header).ok_or_else(|| ParseError::UnknownSection {
                line: line_no,
                header: header.trim().to_string(),
            })?;
            if let Group::Section(name) = &group {
                // a section header alone still registers the section
                record.section_mut(name);
            }
            current = Some(group);
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(ParseError::MalformedLine {
                line: line_no,
                content: line.to_string(),
            }
            .into());
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError::MalformedLine {
                line: line_no,
                content: line.to_string(),
            }
            .into());
        }

        let fields = match &current {
            None => {
                return Err(ParseError::FieldOutsideSection {
                    line: line_no,
                    key: key.to_string(),
                }
                .into())
            }
            Some(Group::Admin) => &mut record.admin,
            Some(Group::Patient) => &mut record.patient,
            Some(Group::Encounter) => &mut record.encounter,
            Some(Group::Section(name)) => record.section_mut(name),
        };
        fields.insert(key, value.trim());
    }

    if record.field_count() == 0 {
        return Err(ParseError::Empty.into());
    }

    tracing::debug!(fields = record.field_count(), "Parsed flat file");
    Ok(record)
}

/// Parses raw bytes, reading non-UTF-8 input as Latin-1
pub fn parse_bytes(bytes: &[u8]) -> Result<ParsedRecord> {
    match std::str::from_utf8(bytes) {
        Ok(text) => parse_str(text),
        Err(_) => {
            tracing::debug!("Flat file is not UTF-8; decoding as Latin-1");
            let text: String = bytes.iter().map(|&b| b as char).collect();
            parse_str(&text)
        }
    }
}

/// Reads and parses a flat file
pub async fn parse_file(path: impl AsRef<Path>) -> Result<ParsedRecord> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    parse_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BridgeError;

    const SAMPLE: &str = "\
# exported 2024-04-02
[ADMIN]
PatOper=CREATE
Fiscal=2024

[patient]
A3 = 1950-01-01
A5A=unknown

[Section  C]
C1=0
C2=
";

    #[test]
    fn test_parse_groups() {
        let record = parse_str(SAMPLE).unwrap();
        assert_eq!(record.admin.value("PATOPER"), Some("CREATE"));
        assert_eq!(record.patient.value("a3"), Some("1950-01-01"));
        assert_eq!(record.assessment_value("SECTION C", "C1"), Some("0"));
        assert_eq!(record.section("SECTION C").unwrap().get("C2"), Some(""));
        assert_eq!(record.field_count(), 6);
    }

    #[test]
    fn test_value_may_contain_equals() {
        let record = parse_str("[ENCOUNTER]\nNote=a=b\n").unwrap();
        assert_eq!(record.encounter.value("Note"), Some("a=b"));
    }

    #[test]
    fn test_crlf_and_bom() {
        let record = parse_str("\u{feff}[ADMIN]\r\nOrgID=ORG1\r\n").unwrap();
        assert_eq!(record.admin.value("OrgID"), Some("ORG1"));
    }

    #[test]
    fn test_unknown_section() {
        let err = parse_str("[VITALS]\nX=1\n").unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Parse(ParseError::UnknownSection { line: 1, .. })
        ));
    }

    #[test]
    fn test_field_before_header() {
        let err = parse_str("A3=1950-01-01\n[PATIENT]\n").unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Parse(ParseError::FieldOutsideSection { line: 1, .. })
        ));
    }

    #[test]
    fn test_malformed_line() {
        let err = parse_str("[PATIENT]\njust text\n").unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Parse(ParseError::MalformedLine { line: 2, .. })
        ));
        assert!(parse_str("[PATIENT]\n=value\n").is_err());
    }

    #[test]
    fn test_empty_file() {
        let err = parse_str("# nothing\n[ADMIN]\n").unwrap_err();
        assert!(matches!(err, BridgeError::Parse(ParseError::Empty)));
    }

    #[test]
    fn test_latin1_fallback() {
        let bytes = b"[PATIENT]\nName=Ren\xe9e\n";
        let record = parse_bytes(bytes).unwrap();
        assert_eq!(record.patient.value("Name"), Some("Ren\u{e9}e"));
    }
}
