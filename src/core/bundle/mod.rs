//! Transaction bundle model
//!
//! A [`Bundle`] is an ordered list of wrapped [`Entry`]s plus a bundle
//! identifier. It is produced by the [`BundleAssembler`] and turned into
//! XML by [`crate::core::serialize`].

pub mod assembler;
pub mod entry;

pub use assembler::{
    AssembledBundle, AssemblyOptions, BundleAssembler, ResourceIdentities, ResourceIdentity,
};
pub use entry::{full_url, resolve_id, wrap_entry, Entry, RequestDirective};

use crate::domain::{ResourceId, ResourceType};
use serde::Serialize;

/// Bundle type of every submitted document
pub const TRANSACTION: &str = "transaction";

/// An assembled transaction bundle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bundle {
    pub id: ResourceId,
    pub bundle_type: String,
    pub entries: Vec<Entry>,
}

impl Bundle {
    /// Creates a transaction bundle
    pub fn transaction(id: ResourceId, entries: Vec<Entry>) -> Self {
        Self {
            id,
            bundle_type: TRANSACTION.to_string(),
            entries,
        }
    }

    /// The entry of a resource type, if included
    pub fn entry(&self, resource: ResourceType) -> Option<&Entry> {
        self.entries.iter().find(|e| e.resource_type == resource)
    }

    /// Whether the bundle carries no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
