//! Generic output tree
//!
//! Every resource is first built as a tree of [`Node`]s and only then
//! serialized. A node has a schema-defined name, an optional grouping key,
//! at most one typed [`Scalar`] value and an ordered list of children.
//!
//! A node with neither a value nor children is *empty*; the pruning pass
//! ([`crate::core::prune`]) removes such nodes before serialization.

pub mod path;

pub use path::{Segment, TargetPath};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a node stands for in the output schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    /// Structural element holding other elements
    Container,
    /// Element conveying a scalar in its `value` attribute
    Value,
    /// Identifying label of a keyed container (e.g. `linkId` of an `item`)
    Label,
}

/// Typed scalar carried by a value node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Scalar {
    String(String),
    Integer(i64),
    /// Kept in its validated textual form so no precision is lost
    Decimal(String),
    Date(NaiveDate),
    Code(String),
    Boolean(bool),
    Uri(String),
}

impl Scalar {
    /// The lexical form written to the `value` attribute
    pub fn render(&self) -> String {
        match self {
            Scalar::String(s) | Scalar::Decimal(s) | Scalar::Code(s) | Scalar::Uri(s) => {
                s.clone()
            }
            Scalar::Integer(i) => i.to_string(),
            Scalar::Date(d) => d.format("%Y-%m-%d").to_string(),
            Scalar::Boolean(b) => b.to_string(),
        }
    }

    /// Whether the rendered value is blank
    pub fn is_blank(&self) -> bool {
        match self {
            Scalar::String(s) | Scalar::Decimal(s) | Scalar::Code(s) | Scalar::Uri(s) => {
                s.trim().is_empty()
            }
            _ => false,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// How a container's grouping key is written out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStyle {
    /// As a first child label element with the given name
    Label(&'static str),
    /// As an attribute with the given name
    Attribute(&'static str),
    /// Not written; only distinguishes sibling containers
    Discriminator,
}

/// Returns how keys of containers with this element name are materialized
pub fn key_style(element: &str) -> KeyStyle {
    match element {
        "item" => KeyStyle::Label("linkId"),
        "extension" | "modifierExtension" => KeyStyle::Attribute("url"),
        _ => KeyStyle::Discriminator,
    }
}

/// One node of the output tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    name: String,
    key: Option<String>,
    role: NodeRole,
    value: Option<Scalar>,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Node {
    /// Creates an empty container
    pub fn container(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
            role: NodeRole::Container,
            value: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Creates a value node
    pub fn value(name: impl Into<String>, value: Scalar) -> Self {
        Self {
            role: NodeRole::Value,
            value: Some(value),
            ..Self::container(name)
        }
    }

    /// Creates a value node whose value was never set
    pub fn unset_value(name: impl Into<String>) -> Self {
        Self {
            role: NodeRole::Value,
            ..Self::container(name)
        }
    }

    /// Creates a label node
    pub fn label(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: NodeRole::Label,
            value: Some(Scalar::String(text.into())),
            ..Self::container(name)
        }
    }

    /// Creates a keyed container, materializing the key per [`key_style`]
    pub fn keyed(name: impl Into<String>, key: impl Into<String>) -> Self {
        let name = name.into();
        let key = key.into();
        let mut node = Self::container(name.clone());
        match key_style(&name) {
            KeyStyle::Label(label) => node.children.push(Node::label(label, key.clone())),
            KeyStyle::Attribute(attr) => node.attributes.push((attr.to_string(), key.clone())),
            KeyStyle::Discriminator => {}
        }
        node.key = Some(key);
        node
    }

    /// Adds an attribute (builder style)
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Appends a child (builder style)
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    pub fn scalar(&self) -> Option<&Scalar> {
        self.value.as_ref()
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    /// Appends a child
    pub fn push(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Inserts a child at the front
    pub fn push_front(&mut self, child: Node) {
        self.children.insert(0, child);
    }

    /// Rendered value, if the node carries one
    pub fn value_str(&self) -> Option<String> {
        self.value.as_ref().map(Scalar::render)
    }

    /// Value of a named attribute
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the node carries neither a value nor children
    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    /// Whether every child is a label (true for a childless node)
    pub fn has_only_labels(&self) -> bool {
        self.children.iter().all(|c| c.role == NodeRole::Label)
    }

    /// First child with the given name
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Child container with the given name and key
    pub fn keyed_child(&self, name: &str, key: &str) -> Option<&Node> {
        self.children
            .iter()
            .find(|c| c.name == name && c.key.as_deref() == Some(key))
    }

    /// Follows a target path, matching names and keys at each level
    pub fn find(&self, path: &TargetPath) -> Option<&Node> {
        let mut current = self;
        for segment in path.segments() {
            current = current
                .children
                .iter()
                .find(|c| c.name == segment.name && c.key.as_deref() == segment.key.as_deref())?;
        }
        Some(current)
    }

    /// Returns the container matching `segment`, creating it on demand
    ///
    /// Repeated calls with the same segment return the same instance.
    pub fn ensure_container(&mut self, segment: &Segment) -> &mut Node {
        let position = self.children.iter().position(|c| {
            c.role == NodeRole::Container
                && c.name == segment.name
                && c.key.as_deref() == segment.key.as_deref()
        });
        let index = match position {
            Some(index) => index,
            None => {
                let node = match &segment.key {
                    Some(key) => Node::keyed(segment.name.clone(), key.clone()),
                    None => Node::container(segment.name.clone()),
                };
                self.children.push(node);
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// Walks/creates the containers of `segments` and returns the last one
    pub fn ensure_path(&mut self, segments: &[Segment]) -> &mut Node {
        segments
            .iter()
            .fold(self, |node, segment| node.ensure_container(segment))
    }

    /// Total number of nodes in this subtree, the node itself included
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Node::node_count).sum::<usize>()
    }

    /// Visits every node depth-first, parents before children
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_render() {
        let date = NaiveDate::from_ymd_opt(1950, 1, 1).unwrap();
        assert_eq!(Scalar::Date(date).render(), "1950-01-01");
        assert_eq!(Scalar::Integer(42).render(), "42");
        assert_eq!(Scalar::Decimal("72.5".to_string()).render(), "72.5");
        assert_eq!(Scalar::Boolean(true).render(), "true");
        assert!(Scalar::Code(" ".to_string()).is_blank());
        assert!(!Scalar::Integer(0).is_blank());
    }

    #[test]
    fn test_keyed_item_gets_link_id_label() {
        let item = Node::keyed("item", "C1");
        assert_eq!(item.children().len(), 1);
        let label = &item.children()[0];
        assert_eq!(label.name(), "linkId");
        assert_eq!(label.role(), NodeRole::Label);
        assert_eq!(label.value_str().as_deref(), Some("C1"));
        assert!(item.has_only_labels());
    }

    #[test]
    fn test_keyed_extension_gets_url_attribute() {
        let ext = Node::keyed("extension", "http://example.org/ext");
        assert_eq!(ext.attribute("url"), Some("http://example.org/ext"));
        assert!(ext.children().is_empty());
    }

    #[test]
    fn test_discriminator_key_is_not_rendered() {
        let identifier = Node::keyed("identifier", "hcn");
        assert!(identifier.children().is_empty());
        assert!(identifier.attributes().is_empty());
        assert_eq!(identifier.key(), Some("hcn"));
    }

    #[test]
    fn test_ensure_path_is_idempotent() {
        let path: TargetPath = "item[A]/item[A12]".parse().unwrap();
        let mut root = Node::container("QuestionnaireResponse");

        root.ensure_path(path.segments())
            .push(Node::value("answer", Scalar::Code("1".to_string())));
        root.ensure_path(path.segments())
            .push(Node::value("answer", Scalar::Code("2".to_string())));

        assert_eq!(root.children().len(), 1);
        let question = root.find(&path).unwrap();
        assert_eq!(question.children_named("answer").count(), 2);
    }

    #[test]
    fn test_different_keys_create_siblings() {
        let mut root = Node::container("Patient");
        root.ensure_container(&Segment::keyed("identifier", "hcn"));
        root.ensure_container(&Segment::keyed("identifier", "chart"));
        root.ensure_container(&Segment::keyed("identifier", "hcn"));

        assert_eq!(root.children_named("identifier").count(), 2);
        assert!(root.keyed_child("identifier", "chart").is_some());
    }

    #[test]
    fn test_empty_and_counts() {
        let mut root = Node::container("Encounter");
        assert!(root.is_empty());
        root.push(Node::unset_value("status"));
        assert!(!root.is_empty());
        assert!(root.children()[0].is_empty());
        assert_eq!(root.node_count(), 2);
    }
}
