//! Entry/request wrapper
//!
//! Attaches an identifier, a full URL and a request directive to a built
//! resource. Whether a resource is included at all is decided by the
//! assembler, not here.

use crate::core::tree::{Node, Scalar};
use crate::domain::{
    IdSource, MappingError, Operation, ResourceControl, ResourceId, ResourceType, Result,
};
use serde::Serialize;
use std::fmt;

/// HTTP method of every transaction entry
pub const REQUEST_METHOD: &str = "POST";

/// Per-entry request directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestDirective {
    pub method: String,
    pub url: String,
}

impl RequestDirective {
    /// `POST /<Type>/<id>/$update` for UPDATE, `POST urn:uuid:<id>` otherwise
    pub fn for_operation(resource: ResourceType, id: &ResourceId, operation: Operation) -> Self {
        let url = match operation {
            Operation::Update => format!("/{resource}/{id}/$update"),
            _ => format!("urn:uuid:{id}"),
        };
        Self {
            method: REQUEST_METHOD.to_string(),
            url,
        }
    }

    /// Method and URL as one string
    pub fn target(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

impl fmt::Display for RequestDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Full URL of an entry: stable `<Type>/<id>` for updates, `urn:uuid:<id>` otherwise
pub fn full_url(resource: ResourceType, id: &ResourceId, operation: Operation) -> String {
    match operation {
        Operation::Update => format!("{resource}/{id}"),
        _ => format!("urn:uuid:{id}"),
    }
}

/// Identifier chosen for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedId {
    pub id: ResourceId,

    /// True when no usable existing identifier was supplied
    pub generated: bool,
}

/// Picks the existing identifier or generates a new one
///
/// With `strict_update_ids`, UPDATE without an existing identifier fails
/// instead of silently creating a new resource.
pub fn resolve_id(
    resource: ResourceType,
    control: &ResourceControl,
    ids: &mut dyn IdSource,
    strict_update_ids: bool,
) -> Result<ResolvedId> {
    if let Some(id) = &control.existing_id {
        return Ok(ResolvedId {
            id: id.clone(),
            generated: false,
        });
    }
    if control.operation == Operation::Update {
        if strict_update_ids {
            return Err(MappingError::MissingIdentifier {
                resource: resource.to_string(),
            }
            .into());
        }
        tracing::warn!(
            resource = %resource,
            "UPDATE requested without an existing identifier; generating a new one"
        );
    }
    Ok(ResolvedId {
        id: ids.next_id(),
        generated: true,
    })
}

/// A resource wrapped for inclusion in a bundle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub resource_type: ResourceType,
    pub operation: Operation,
    pub id: ResourceId,
    pub full_url: String,
    pub resource: Node,
    pub request: RequestDirective,
}

/// Wraps a built resource, writing its identifier as the first element
pub fn wrap_entry(
    resource_type: ResourceType,
    operation: Operation,
    id: ResourceId,
    mut resource: Node,
) -> Entry {
    resource.push_front(Node::value("id", Scalar::String(id.to_string())));
    Entry {
        resource_type,
        operation,
        full_url: full_url(resource_type, &id, operation),
        request: RequestDirective::for_operation(resource_type, &id, operation),
        id,
        resource,
    }
}
