//! Field catalog
//!
//! The catalog is a declarative table: one [`FieldRule`] per mapped field,
//! naming where the value comes from, where it lands in the output tree and
//! what kind of value it is. The tree builder interprets it; nothing in the
//! engine branches on individual field codes.
//!
//! The built-in tables live in [`patient`], [`encounter`] and
//! [`assessment`]. A versioned replacement can be loaded from TOML with
//! [`FieldCatalog::from_toml_file`].

pub mod assessment;
pub mod encounter;
pub mod patient;

use super::tree::{Scalar, Segment, TargetPath};
use crate::domain::record::{normalize_key, normalize_section};
use crate::domain::{BridgeError, MappingError, ParsedRecord, ResourceType, Result};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

/// Lexical form of a FHIR decimal
const DECIMAL_PATTERN: &str = r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?$";

fn is_fhir_decimal(raw: &str) -> bool {
    static DECIMAL: OnceLock<Option<Regex>> = OnceLock::new();
    DECIMAL
        .get_or_init(|| Regex::new(DECIMAL_PATTERN).ok())
        .as_ref()
        .is_some_and(|re| re.is_match(raw))
}

/// Declared type of a mapped value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Integer,
    Decimal,
    Date,
    Code,
    Boolean,
    Uri,
}

impl ValueKind {
    /// Coerces a raw (trimmed, non-blank) value into a typed scalar
    pub fn coerce(&self, field: &str, raw: &str) -> std::result::Result<Scalar, MappingError> {
        let invalid = || MappingError::InvalidValue {
            field: field.to_string(),
            kind: self.to_string(),
            value: raw.to_string(),
        };
        match self {
            ValueKind::String => Ok(Scalar::String(raw.to_string())),
            ValueKind::Code => Ok(Scalar::Code(raw.to_string())),
            ValueKind::Uri => Ok(Scalar::Uri(raw.to_string())),
            ValueKind::Integer => raw.parse().map(Scalar::Integer).map_err(|_| invalid()),
            ValueKind::Decimal => {
                let unsigned = raw
                    .strip_prefix('+')
                    .filter(|rest| !rest.starts_with('-'))
                    .unwrap_or(raw);
                if is_fhir_decimal(unsigned) {
                    Ok(Scalar::Decimal(unsigned.to_string()))
                } else {
                    Err(invalid())
                }
            }
            ValueKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
                .map(Scalar::Date)
                .map_err(|_| invalid()),
            ValueKind::Boolean => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "y" | "yes" => Ok(Scalar::Boolean(true)),
                "0" | "false" | "n" | "no" => Ok(Scalar::Boolean(false)),
                _ => Err(invalid()),
            },
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Decimal => "decimal",
            ValueKind::Date => "date",
            ValueKind::Code => "code",
            ValueKind::Boolean => "boolean",
            ValueKind::Uri => "uri",
        };
        f.write_str(name)
    }
}

/// Values supplied by the caller rather than the flat file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextValue {
    PatientReference,
    EncounterReference,
}

/// Where a rule reads its value from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "group", rename_all = "snake_case")]
pub enum Source {
    Admin { key: String },
    Patient { key: String },
    Encounter { key: String },
    Assessment { section: String, key: String },
    Context { value: ContextValue },
}

impl Source {
    pub fn admin(key: &str) -> Self {
        Source::Admin {
            key: normalize_key(key),
        }
    }

    pub fn patient(key: &str) -> Self {
        Source::Patient {
            key: normalize_key(key),
        }
    }

    pub fn encounter(key: &str) -> Self {
        Source::Encounter {
            key: normalize_key(key),
        }
    }

    pub fn assessment(section: &str, key: &str) -> Self {
        Source::Assessment {
            section: normalize_section(section),
            key: normalize_key(key),
        }
    }

    pub fn context(value: ContextValue) -> Self {
        Source::Context { value }
    }

    /// Whether the value comes from the flat file
    pub fn is_record(&self) -> bool {
        !matches!(self, Source::Context { .. })
    }

    /// Whether the value comes from the `[ADMIN]` group
    pub fn is_admin(&self) -> bool {
        matches!(self, Source::Admin { .. })
    }

    /// Looks up a non-blank record value; context sources always yield `None`
    pub fn lookup<'r>(&self, record: &'r ParsedRecord) -> Option<&'r str> {
        match self {
            Source::Admin { key } => record.admin.value(key),
            Source::Patient { key } => record.patient.value(key),
            Source::Encounter { key } => record.encounter.value(key),
            Source::Assessment { section, key } => record.assessment_value(section, key),
            Source::Context { .. } => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Admin { key } => write!(f, "admin/{key}"),
            Source::Patient { key } => write!(f, "patient/{key}"),
            Source::Encounter { key } => write!(f, "encounter/{key}"),
            Source::Assessment { section, key } => write!(f, "{section}/{key}"),
            Source::Context { value } => write!(f, "context/{value:?}"),
        }
    }
}

/// Rewrite applied to a raw value before coercion
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Transform {
    #[default]
    Verbatim,
    /// Translate source codes; unmapped codes are rejected
    CodeMap { entries: Vec<(String, String)> },
    /// Substitute the value into `{value}`
    Template { template: String },
}

impl Transform {
    pub fn code_map(entries: &[(&str, &str)]) -> Self {
        Transform::CodeMap {
            entries: entries
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    pub fn template(template: &str) -> Self {
        Transform::Template {
            template: template.to_string(),
        }
    }

    /// Applies the transform, returning `None` for an unmapped code
    pub fn apply(&self, raw: &str) -> Option<String> {
        match self {
            Transform::Verbatim => Some(raw.to_string()),
            Transform::CodeMap { entries } => entries
                .iter()
                .find(|(from, _)| from.eq_ignore_ascii_case(raw))
                .map(|(_, to)| to.clone()),
            Transform::Template { template } => Some(template.replace("{value}", raw)),
        }
    }
}

/// A fixed value written at a path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub target: TargetPath,
    pub kind: ValueKind,
    pub value: String,
}

impl Constant {
    pub fn new(target: &str, kind: ValueKind, value: &str) -> std::result::Result<Self, MappingError> {
        Ok(Self {
            target: target.parse()?,
            kind,
            value: value.to_string(),
        })
    }

    /// The typed scalar of this constant
    pub fn scalar(&self) -> std::result::Result<Scalar, MappingError> {
        self.kind.coerce(&self.target.to_string(), &self.value)
    }
}

/// A container created before any rule runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaffold {
    pub target: TargetPath,
    /// Display text label added to the container
    #[serde(default)]
    pub text: Option<String>,
}

/// One mapped field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    pub source: Source,
    pub target: TargetPath,
    pub kind: ValueKind,

    #[serde(default)]
    pub transform: Transform,

    /// Literal value that must never be emitted as data
    #[serde(default)]
    pub sentinel: Option<String>,

    /// Read when `source` is absent or blank
    #[serde(default)]
    pub fallback: Option<Source>,

    /// Rule fires only if a rule reading this source fired before it
    #[serde(default)]
    pub requires: Option<Source>,

    /// Constants written alongside the value, before it
    #[serde(default)]
    pub companions: Vec<Constant>,
}

impl FieldRule {
    pub fn new(
        source: Source,
        target: &str,
        kind: ValueKind,
    ) -> std::result::Result<Self, MappingError> {
        let target: TargetPath = target.parse()?;
        Ok(Self {
            source,
            target,
            kind,
            transform: Transform::Verbatim,
            sentinel: None,
            fallback: None,
            requires: None,
            companions: Vec::new(),
        })
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_sentinel(mut self, sentinel: &str) -> Self {
        self.sentinel = Some(sentinel.to_string());
        self
    }

    pub fn requires(mut self, source: Source) -> Self {
        self.requires = Some(source);
        self
    }

    pub fn or_from(mut self, fallback: Source) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// The value this rule reads and the source it came from
    pub fn lookup<'r>(&self, record: &'r ParsedRecord) -> Option<(&Source, &'r str)> {
        std::iter::once(&self.source)
            .chain(self.fallback.as_ref())
            .find_map(|source| source.lookup(record).map(|raw| (source, raw)))
    }

    pub fn with_companion(
        mut self,
        target: &str,
        kind: ValueKind,
        value: &str,
    ) -> std::result::Result<Self, MappingError> {
        self.companions.push(Constant::new(target, kind, value)?);
        Ok(self)
    }

    /// The nearest keyed ancestor container this field belongs under
    pub fn group(&self) -> Option<&Segment> {
        self.target.parent().iter().rev().find(|s| s.key.is_some())
    }
}

/// Rules and layout for one resource type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCatalog {
    pub resource: ResourceType,

    /// Schema order of the resource's top-level elements
    #[serde(default)]
    pub element_order: Vec<String>,

    /// Constants emitted only when at least one record field was mapped
    #[serde(default)]
    pub preamble: Vec<Constant>,

    /// Containers created up front, whether or not anything lands in them
    #[serde(default)]
    pub scaffold: Vec<Scaffold>,

    pub rules: Vec<FieldRule>,
}

impl ResourceCatalog {
    /// Rank of a top-level element in the schema order
    pub fn element_rank(&self, name: &str) -> usize {
        self.element_order
            .iter()
            .position(|e| e == name)
            .unwrap_or(self.element_order.len())
    }

    /// Rules reading from the flat file
    pub fn record_rules(&self) -> impl Iterator<Item = &FieldRule> {
        self.rules.iter().filter(|r| r.source.is_record())
    }

    /// Rules reading from the build context
    pub fn context_rules(&self) -> impl Iterator<Item = &FieldRule> {
        self.rules.iter().filter(|r| !r.source.is_record())
    }
}

/// The complete catalog for all three resource types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCatalog {
    /// Catalog version, recorded with every submission outcome
    pub version: String,
    pub resources: Vec<ResourceCatalog>,
}

impl FieldCatalog {
    /// Version string of the built-in tables
    pub const STANDARD_VERSION: &'static str = "ltcf-9.1.2";

    /// The built-in catalog
    ///
    /// # Errors
    ///
    /// Returns an error only if a built-in target path is malformed.
    pub fn standard() -> Result<Self> {
        let catalog = Self {
            version: Self::STANDARD_VERSION.to_string(),
            resources: vec![
                patient::catalog()?,
                encounter::catalog()?,
                assessment::catalog()?,
            ],
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Loads a catalog from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Configuration(format!(
                "Failed to read field catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parses a catalog from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let catalog: FieldCatalog = toml::from_str(contents)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Serializes the catalog as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BridgeError::Serialization(format!("Failed to write catalog: {e}")))
    }

    /// Rules for one resource type
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the resource type if the catalog
    /// has no table for it.
    pub fn resource(&self, resource: ResourceType) -> Result<&ResourceCatalog> {
        self.resources
            .iter()
            .find(|r| r.resource == resource)
            .ok_or_else(|| {
                BridgeError::Configuration(format!(
                    "Field catalog has no table for resource type {resource}"
                ))
            })
    }

    /// Replaces the value of every preamble or companion constant written at
    /// `target`, returning how many were changed
    pub fn override_constant(
        &mut self,
        resource: ResourceType,
        target: &str,
        value: &str,
    ) -> Result<usize> {
        let target: TargetPath = target.parse()?;
        let mut changed = 0;
        for table in self.resources.iter_mut().filter(|r| r.resource == resource) {
            let companions = table.rules.iter_mut().flat_map(|r| r.companions.iter_mut());
            for constant in table.preamble.iter_mut().chain(companions) {
                if constant.target == target {
                    constant.value = value.to_string();
                    constant.scalar()?;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    /// Total number of rules
    pub fn rule_count(&self) -> usize {
        self.resources.iter().map(|r| r.rules.len()).sum()
    }

    fn validate(&self) -> Result<()> {
        for resource in ResourceType::ALL {
            let count = self.resources.iter().filter(|r| r.resource == resource).count();
            if count != 1 {
                return Err(BridgeError::Configuration(format!(
                    "Field catalog must contain exactly one table for {resource}, found {count}"
                )));
            }
        }
        for table in &self.resources {
            if let Some(rule) = table
                .rules
                .iter()
                .find(|r| r.fallback.as_ref().is_some_and(|f| !f.is_record()))
            {
                return Err(BridgeError::Configuration(format!(
                    "Field rule for {} falls back to a context value",
                    rule.source
                )));
            }
            for constant in table.preamble.iter().chain(table.rules.iter().flat_map(|r| &r.companions)) {
                constant.scalar()?;
            }
        }
        Ok(())
    }
}
