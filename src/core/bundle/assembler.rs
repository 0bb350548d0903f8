//! Bundle assembler
//!
//! Resolves the identity of every resource first so references can point
//! at the right entries, then builds, prunes and wraps each included
//! resource. Entry order is Encounter, QuestionnaireResponse, Patient.

use super::entry::{full_url, resolve_id, wrap_entry, Entry};
use super::Bundle;
use crate::core::builder::{BuildContext, SentinelPolicy, TreeBuilder};
use crate::core::catalog::FieldCatalog;
use crate::core::prune::{prune, PruneStats};
use crate::domain::{
    AdminMetadata, BridgeError, IdSource, Operation, ParsedRecord, ResourceId, ResourceType,
    Result,
};
use serde::Serialize;

/// Entry order inside the bundle
pub const ENTRY_ORDER: [ResourceType; 3] = [
    ResourceType::Encounter,
    ResourceType::QuestionnaireResponse,
    ResourceType::Patient,
];

/// Assembly settings taken from the mapping configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct AssemblyOptions {
    pub sentinel_policy: SentinelPolicy,
    pub strict_update_ids: bool,
}

/// Identity decided for one resource of a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceIdentity {
    pub resource: ResourceType,
    pub operation: Operation,
    pub id: ResourceId,

    /// True when the identifier was generated rather than supplied
    pub generated: bool,

    /// Whether the resource has an entry in the bundle
    pub included: bool,

    /// How other entries refer to this resource
    pub reference: String,
}

/// Identities of the resources of one file, for the outcome recorder
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceIdentities(Vec<ResourceIdentity>);

impl ResourceIdentities {
    pub fn get(&self, resource: ResourceType) -> Option<&ResourceIdentity> {
        self.0.iter().find(|i| i.resource == resource)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceIdentity> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn exclude(&mut self, resource: ResourceType) {
        if let Some(identity) = self.0.iter_mut().find(|i| i.resource == resource) {
            identity.included = false;
        }
    }
}

/// Output of [`BundleAssembler::assemble`]
#[derive(Debug, Clone)]
pub struct AssembledBundle {
    pub bundle: Bundle,
    pub identities: ResourceIdentities,

    /// Record fields mapped across all included resources
    pub fields_mapped: usize,

    /// Pruning counters summed over all included resources
    pub pruned: PruneStats,
}

/// Builds the transaction bundle of one parsed record
pub struct BundleAssembler<'c> {
    builder: TreeBuilder<'c>,
    options: AssemblyOptions,
}

impl<'c> BundleAssembler<'c> {
    pub fn new(catalog: &'c FieldCatalog, options: AssemblyOptions) -> Self {
        Self {
            builder: TreeBuilder::new(catalog),
            options,
        }
    }

    /// Assembles the bundle for `record`
    ///
    /// Patient and Encounter are left out when their operation is USE; the
    /// QuestionnaireResponse is included whenever the record carries
    /// assessment data that the catalog maps.
    ///
    /// # Errors
    ///
    /// Fails on an empty record, on a value that cannot be coerced to its
    /// declared kind and, with strict identifiers, on UPDATE without an
    /// existing identifier. Nothing is produced for a failed record.
    pub fn assemble(
        &self,
        record: &ParsedRecord,
        admin: &AdminMetadata,
        ids: &mut dyn IdSource,
    ) -> Result<AssembledBundle> {
        if record.is_empty() {
            return Err(BridgeError::InvalidInput(
                "record contains no fields".to_string(),
            ));
        }

        let mut identities = self.resolve_identities(record, admin, ids)?;
        let reference = |resource: ResourceType| identities.get(resource).map(|i| i.reference.clone());
        let context = BuildContext {
            patient_reference: reference(ResourceType::Patient),
            encounter_reference: reference(ResourceType::Encounter),
            sentinel_policy: self.options.sentinel_policy,
        };

        let mut entries: Vec<Entry> = Vec::with_capacity(ENTRY_ORDER.len());
        let mut fields_mapped = 0;
        let mut pruned = PruneStats::default();

        for resource in ENTRY_ORDER {
            let Some(identity) = identities.get(resource).filter(|i| i.included) else {
                continue;
            };
            let (operation, id) = (identity.operation, identity.id.clone());
            let mut built = self.builder.build(record, resource, &context)?;
            if resource == ResourceType::QuestionnaireResponse && built.content_mapped == 0 {
                tracing::warn!(
                    resource = %resource,
                    "Assessment sections carry no catalogued fields; entry left out"
                );
                identities.exclude(resource);
                continue;
            }
            let stats = prune(&mut built.root);
            pruned.rounds += stats.rounds;
            pruned.removed += stats.removed;
            fields_mapped += built.fields_mapped;

            entries.push(wrap_entry(resource, operation, id, built.root));
        }

        let bundle = Bundle::transaction(ids.next_id(), entries);
        tracing::debug!(
            bundle_id = %bundle.id,
            entries = bundle.entries.len(),
            fields_mapped,
            pruned = pruned.removed,
            "Assembled bundle"
        );

        Ok(AssembledBundle {
            bundle,
            identities,
            fields_mapped,
            pruned,
        })
    }

    fn resolve_identities(
        &self,
        record: &ParsedRecord,
        admin: &AdminMetadata,
        ids: &mut dyn IdSource,
    ) -> Result<ResourceIdentities> {
        let mut identities = Vec::with_capacity(3);

        for resource in [ResourceType::Patient, ResourceType::Encounter] {
            let control = admin.control(resource);
            let resolved = resolve_id(resource, control, ids, self.options.strict_update_ids)?;
            let included = control.operation != Operation::Use;
            if !included && resolved.generated {
                tracing::warn!(
                    resource = %resource,
                    "USE requested without an existing identifier; reference will not resolve"
                );
            }
            let reference = if included {
                full_url(resource, &resolved.id, control.operation)
            } else {
                format!("{resource}/{}", resolved.id)
            };
            identities.push(ResourceIdentity {
                resource,
                operation: control.operation,
                id: resolved.id,
                generated: resolved.generated,
                included,
                reference,
            });
        }

        if record.has_assessment_data() {
            let resource = ResourceType::QuestionnaireResponse;
            let control = admin.control(resource);
            if control.operation == Operation::Use {
                tracing::warn!(
                    resource = %resource,
                    "USE is not honoured for the assessment; it is included"
                );
            }
            let resolved = resolve_id(resource, control, ids, self.options.strict_update_ids)?;
            identities.push(ResourceIdentity {
                resource,
                operation: control.operation,
                reference: full_url(resource, &resolved.id, control.operation),
                id: resolved.id,
                generated: resolved.generated,
                included: true,
            });
        }

        Ok(ResourceIdentities(identities))
    }
}
