//! Conditional tree builder
//!
//! Interprets a [`ResourceCatalog`] against a [`ParsedRecord`]. A rule whose
//! source value is absent or blank creates nothing; a rule whose value is
//! present creates its typed leaf at the target path, creating intermediate
//! containers on demand and reusing them across rules.

use super::catalog::{ContextValue, FieldCatalog, FieldRule, ResourceCatalog, Source};
use super::tree::{Node, Scalar, TargetPath};
use crate::domain::{MappingError, ParsedRecord, ResourceType, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Extension marking a value as deliberately absent
pub const DATA_ABSENT_REASON_URL: &str =
    "http://hl7.org/fhir/StructureDefinition/data-absent-reason";

/// What to do with a source value equal to a rule's sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentinelPolicy {
    /// Leave the field out entirely
    #[default]
    Omit,
    /// Emit the element with a data-absent-reason extension instead of a value
    DataAbsentReason,
}

/// Caller-supplied values a catalog can refer to
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    /// Reference to the bundle's Patient entry
    pub patient_reference: Option<String>,

    /// Reference to the bundle's Encounter entry
    pub encounter_reference: Option<String>,

    pub sentinel_policy: SentinelPolicy,
}

impl BuildContext {
    fn resolve(&self, value: ContextValue) -> Option<&str> {
        match value {
            ContextValue::PatientReference => self.patient_reference.as_deref(),
            ContextValue::EncounterReference => self.encounter_reference.as_deref(),
        }
    }
}

/// A built resource subtree plus build counters
#[derive(Debug, Clone)]
pub struct BuiltResource {
    pub resource: ResourceType,
    pub root: Node,

    /// Record fields that produced output
    pub fields_mapped: usize,

    /// Fields among `fields_mapped` read from outside the `[ADMIN]` group
    pub content_mapped: usize,

    /// Sentinel values left out under [`SentinelPolicy::Omit`]
    pub sentinels_omitted: usize,
}

/// Builds resource trees from the field catalog
pub struct TreeBuilder<'c> {
    catalog: &'c FieldCatalog,
}

impl<'c> TreeBuilder<'c> {
    pub fn new(catalog: &'c FieldCatalog) -> Self {
        Self { catalog }
    }

    /// Builds the tree of one resource type
    ///
    /// Scaffold containers are created first and may stay empty; the
    /// pruning pass removes them. Administrative fields, preamble constants
    /// and context references are only emitted when at least one field
    /// outside the `[ADMIN]` group was mapped.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::InvalidValue`] when a present value cannot be
    /// coerced to its declared kind or a code has no mapping, and a
    /// configuration error when the catalog has no table for `resource`.
    pub fn build(
        &self,
        record: &ParsedRecord,
        resource: ResourceType,
        context: &BuildContext,
    ) -> Result<BuiltResource> {
        let table = self.catalog.resource(resource)?;
        let mut root = Node::container(resource.as_str());

        for scaffold in &table.scaffold {
            let container = root.ensure_path(scaffold.target.segments());
            if let Some(text) = &scaffold.text {
                if container.child("text").is_none() {
                    container.push(Node::label("text", text.clone()));
                }
            }
        }

        let mut fired = HashSet::new();
        let mut deferred = Vec::new();
        let mut content_mapped = 0;
        let mut sentinels_omitted = 0;

        for rule in table.record_rules() {
            if let Some(required) = &rule.requires {
                if !fired.contains(required) {
                    tracing::trace!(field = %rule.source, requires = %required, "Dependency not met");
                    continue;
                }
            }
            let Some((source, raw)) = rule.lookup(record) else {
                continue;
            };

            let leaf = if rule.sentinel.as_deref() == Some(raw) {
                match context.sentinel_policy {
                    SentinelPolicy::Omit => {
                        tracing::debug!(field = %source, "Sentinel value omitted");
                        sentinels_omitted += 1;
                        continue;
                    }
                    SentinelPolicy::DataAbsentReason => {
                        absent_value(rule.target.leaf().name.as_str())
                    }
                }
            } else {
                Node::value(rule.target.leaf().name.clone(), coerce(rule, source, raw)?)
            };

            fired.insert(&rule.source);
            if source.is_admin() {
                deferred.push((rule, leaf));
            } else {
                place(&mut root, rule, leaf)?;
                content_mapped += 1;
            }
        }

        let mut fields_mapped = content_mapped;
        if content_mapped > 0 {
            for (rule, leaf) in deferred {
                place(&mut root, rule, leaf)?;
                fields_mapped += 1;
            }
            for rule in table.context_rules() {
                let Source::Context { value } = &rule.source else {
                    continue;
                };
                if let Some(reference) = context.resolve(*value) {
                    let leaf = Node::value(
                        rule.target.leaf().name.clone(),
                        coerce(rule, &rule.source, reference)?,
                    );
                    place(&mut root, rule, leaf)?;
                }
            }
            for constant in &table.preamble {
                let leaf = Node::value(constant.target.leaf().name.clone(), constant.scalar()?);
                put(&mut root, &constant.target, leaf);
            }
        } else if !deferred.is_empty() {
            tracing::debug!(
                resource = %resource,
                dropped = deferred.len(),
                "Administrative fields dropped without record content"
            );
        }

        order_elements(&mut root, table);

        tracing::debug!(
            resource = %resource,
            fields_mapped,
            sentinels_omitted,
            nodes = root.node_count(),
            "Built resource tree"
        );

        Ok(BuiltResource {
            resource,
            root,
            fields_mapped,
            content_mapped,
            sentinels_omitted,
        })
    }
}

fn coerce(rule: &FieldRule, source: &Source, raw: &str) -> std::result::Result<Scalar, MappingError> {
    let field = source.to_string();
    let transformed = rule
        .transform
        .apply(raw)
        .ok_or_else(|| MappingError::InvalidValue {
            field: field.clone(),
            kind: format!("mapped {}", rule.kind),
            value: raw.to_string(),
        })?;
    rule.kind.coerce(&field, &transformed)
}

fn absent_value(name: &str) -> Node {
    Node::unset_value(name).with_child(
        Node::keyed("extension", DATA_ABSENT_REASON_URL)
            .with_child(Node::value("valueCode", Scalar::Code("unknown".to_string()))),
    )
}

/// Writes a rule's companions and then its leaf
fn place(root: &mut Node, rule: &FieldRule, leaf: Node) -> std::result::Result<(), MappingError> {
    for companion in &rule.companions {
        let parent = root.ensure_path(companion.target.parent());
        if parent.child(&companion.target.leaf().name).is_none() {
            parent.push(Node::value(companion.target.leaf().name.clone(), companion.scalar()?));
        }
    }
    put(root, &rule.target, leaf);
    Ok(())
}

fn put(root: &mut Node, target: &TargetPath, leaf: Node) {
    root.ensure_path(target.parent()).push(leaf);
}

/// Sorts top-level elements into schema order, keeping relative order of equals
fn order_elements(root: &mut Node, table: &ResourceCatalog) {
    root.children_mut()
        .sort_by_key(|child| table.element_rank(child.name()));
}
