//! Parsed flat-file record
//!
//! A [`ParsedRecord`] is what the flat-file tokenizer hands to the mapping
//! engine: administrative metadata, patient fields, encounter fields and the
//! assessment fields grouped by section. Field keys are case-insensitive.
//! A blank value is treated exactly like an absent key by every consumer.

use serde::Serialize;
use std::collections::BTreeMap;

/// Case-insensitive mapping from field key to raw string value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldMap {
    fields: BTreeMap<String, String>,
}

impl FieldMap {
    /// Creates an empty field map
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, replacing any previous value for the same key
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.fields.insert(normalize_key(key.as_ref()), value.into());
    }

    /// Returns the raw value for a key, blank values included
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(&normalize_key(key)).map(String::as_str)
    }

    /// Returns the trimmed value for a key, or `None` when absent or blank
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Whether the key is present with a non-blank value
    pub fn has(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    /// Whether at least one field carries a non-blank value
    pub fn has_values(&self) -> bool {
        self.fields.values().any(|v| !v.trim().is_empty())
    }

    /// Number of fields (blank ones included)
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the map holds no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(normalized key, raw value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// The in-memory result of flat-file parsing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedRecord {
    /// Administrative/control fields
    pub admin: FieldMap,

    /// Patient demographics
    pub patient: FieldMap,

    /// Encounter data
    pub encounter: FieldMap,

    /// Assessment fields keyed by normalized section name (`SECTION A`)
    pub assessment: BTreeMap<String, FieldMap>,
}

impl ParsedRecord {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fields of an assessment section, if the section exists
    pub fn section(&self, name: &str) -> Option<&FieldMap> {
        self.assessment.get(&normalize_section(name))
    }

    /// Returns the field map of a section, creating it when missing
    pub fn section_mut(&mut self, name: &str) -> &mut FieldMap {
        self.assessment.entry(normalize_section(name)).or_default()
    }

    /// Looks up a non-blank assessment value
    pub fn assessment_value(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|fields| fields.value(key))
    }

    /// Whether any assessment section carries a non-blank value
    pub fn has_assessment_data(&self) -> bool {
        self.assessment.values().any(FieldMap::has_values)
    }

    /// Whether the record holds no fields in any group
    pub fn is_empty(&self) -> bool {
        self.admin.is_empty()
            && self.patient.is_empty()
            && self.encounter.is_empty()
            && self.assessment.values().all(FieldMap::is_empty)
    }

    /// Total number of fields across all groups
    pub fn field_count(&self) -> usize {
        self.admin.len()
            + self.patient.len()
            + self.encounter.len()
            + self.assessment.values().map(FieldMap::len).sum::<usize>()
    }
}

/// Normalizes a field key for case-insensitive lookup
pub fn normalize_key(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

/// Normalizes a section name: upper case, single spaces (`section  a` → `SECTION A`)
pub fn normalize_section(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_ascii_uppercase)
        .collect::<Vec<_>>()
        .join(" ")
}
