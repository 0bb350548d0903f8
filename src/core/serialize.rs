//! XML serialization of assembled bundles
//!
//! Writes the FHIR XML form: a `Bundle` root declaring the FHIR namespace,
//! `id` and `type`, then one `entry` per resource with `fullUrl`,
//! `resource` and `request`. Scalars go in `value` attributes; a keyed
//! extension's URL goes in its `url` attribute, written first.

use super::bundle::{Bundle, Entry};
use super::tree::Node;
use crate::domain::{BridgeError, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};

/// FHIR XML namespace
pub const FHIR_NAMESPACE: &str = "http://hl7.org/fhir";

fn write_error(e: impl std::fmt::Display) -> BridgeError {
    BridgeError::Serialization(format!("Failed to write XML: {e}"))
}

/// Serializes a bundle as an indented UTF-8 XML document
pub fn to_xml(bundle: &Bundle) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_error)?;

    let mut root = BytesStart::new("Bundle");
    root.push_attribute(("xmlns", FHIR_NAMESPACE));
    writer.write_event(Event::Start(root)).map_err(write_error)?;

    write_value(&mut writer, "id", bundle.id.as_str())?;
    write_value(&mut writer, "type", &bundle.bundle_type)?;
    for entry in &bundle.entries {
        write_entry(&mut writer, entry)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("Bundle")))
        .map_err(write_error)?;

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| BridgeError::Serialization(format!("XML is not valid UTF-8: {e}")))
}

/// Serializes a single resource tree without the bundle envelope
pub fn node_to_xml(node: &Node) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    write_node(&mut writer, node)?;
    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| BridgeError::Serialization(format!("XML is not valid UTF-8: {e}")))
}

fn write_entry<W: Write>(writer: &mut Writer<W>, entry: &Entry) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new("entry")))
        .map_err(write_error)?;

    write_value(writer, "fullUrl", &entry.full_url)?;

    writer
        .write_event(Event::Start(BytesStart::new("resource")))
        .map_err(write_error)?;
    write_node(writer, &entry.resource)?;
    writer
        .write_event(Event::End(BytesEnd::new("resource")))
        .map_err(write_error)?;

    writer
        .write_event(Event::Start(BytesStart::new("request")))
        .map_err(write_error)?;
    write_value(writer, "method", &entry.request.method)?;
    write_value(writer, "url", &entry.request.url)?;
    writer
        .write_event(Event::End(BytesEnd::new("request")))
        .map_err(write_error)?;

    writer
        .write_event(Event::End(BytesEnd::new("entry")))
        .map_err(write_error)?;
    Ok(())
}

fn write_value<W: Write>(writer: &mut Writer<W>, name: &str, value: &str) -> Result<()> {
    let mut element = BytesStart::new(name);
    element.push_attribute(("value", value));
    writer.write_event(Event::Empty(element)).map_err(write_error)
}

fn write_node<W: Write>(writer: &mut Writer<W>, node: &Node) -> Result<()> {
    let mut element = BytesStart::new(node.name());
    for (name, value) in node.attributes() {
        element.push_attribute((name.as_str(), value.as_str()));
    }
    if let Some(value) = node.value_str() {
        element.push_attribute(("value", value.as_str()));
    }

    if node.children().is_empty() {
        return writer.write_event(Event::Empty(element)).map_err(write_error);
    }

    writer.write_event(Event::Start(element)).map_err(write_error)?;
    for child in node.children() {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.name())))
        .map_err(write_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bundle::wrap_entry;
    use crate::core::tree::Scalar;
    use crate::domain::{Operation, ResourceId, ResourceType};

    fn bundle_with(entries: Vec<Entry>) -> Bundle {
        Bundle::transaction(ResourceId::new("bundle-1").unwrap(), entries)
    }

    #[test]
    fn test_document_shape() {
        let patient = Node::container("Patient")
            .with_child(Node::value("birthDate", Scalar::String("1950-01-01".to_string())));
        let entry = wrap_entry(
            ResourceType::Patient,
            Operation::Create,
            ResourceId::new("p1").unwrap(),
            patient,
        );
        let xml = to_xml(&bundle_with(vec![entry])).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<Bundle xmlns=\"http://hl7.org/fhir\">"));

        let positions: Vec<usize> = [
            "<id value=\"bundle-1\"/>",
            "<type value=\"transaction\"/>",
            "<entry>",
            "<fullUrl value=\"urn:uuid:p1\"/>",
            "<resource>",
            "<Patient>",
            "<id value=\"p1\"/>",
            "<birthDate value=\"1950-01-01\"/>",
            "</Patient>",
            "<request>",
            "<method value=\"POST\"/>",
            "<url value=\"urn:uuid:p1\"/>",
            "</Bundle>",
        ]
        .iter()
        .map(|needle| xml.find(needle).unwrap_or_else(|| panic!("missing {needle} in {xml}")))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_url_attribute_precedes_value() {
        let node = Node::keyed("extension", "http://example.org/ext")
            .with_child(Node::value("valueCode", Scalar::Code("1".to_string())));
        let xml = node_to_xml(&node).unwrap();
        assert!(xml.contains("<extension url=\"http://example.org/ext\">"));
        assert!(xml.contains("<valueCode value=\"1\"/>"));
    }

    #[test]
    fn test_values_are_escaped() {
        let node = Node::value("valueString", Scalar::String("Tom & \"Jerry\" <x>".to_string()));
        let xml = node_to_xml(&node).unwrap();
        assert!(xml.contains("&amp;"));
        assert!(xml.contains("&lt;x&gt;"));
        assert!(!xml.contains("<x>"));
    }

    #[test]
    fn test_item_link_id_serialized_as_element() {
        let item = Node::keyed("item", "C1").with_child(
            Node::container("answer").with_child(Node::value("valueInteger", Scalar::Integer(3))),
        );
        let xml = node_to_xml(&item).unwrap();
        let link = xml.find("<linkId value=\"C1\"/>").unwrap();
        let answer = xml.find("<answer>").unwrap();
        assert!(link < answer);
        assert!(xml.contains("<valueInteger value=\"3\"/>"));
    }

    #[test]
    fn test_empty_bundle() {
        let xml = to_xml(&bundle_with(Vec::new())).unwrap();
        assert!(!xml.contains("<entry>"));
        assert!(xml.contains("<type value=\"transaction\"/>"));
    }
}
