//! Component snapshots of the live UI tree.
//!
//! A [`Component`] is an immutable copy of one node of the remote tree as it
//! looked when the session answered a query. Its identity is its
//! [`NodePath`], the child-index path from the forest root, which is only
//! meaningful until the application mutates its UI.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// Attribute keys with meaning to the core.
///
/// Every other key is opaque and only ever compared as text.
pub mod keys {
    /// Component class name (e.g. `JCheckBox`)
    pub const CLASS: &str = "class";
    /// Visible text or label
    pub const TEXT: &str = "text";
    /// Window or dialog title
    pub const TITLE: &str = "title";
    /// Selection state of toggles and tree nodes
    pub const SELECTED: &str = "selected";
    /// Whether the component accepts input
    pub const ENABLED: &str = "enabled";
}

/// A single attribute value as reported by the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    /// Free text
    Text(String),
    /// Native boolean
    Bool(bool),
    /// Member of an application-defined enumeration
    Enum(String),
}

impl AttrValue {
    /// Textual form used by every predicate comparison
    #[must_use]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) | Self::Enum(s) => Cow::Borrowed(s.as_str()),
            Self::Bool(true) => Cow::Borrowed("true"),
            Self::Bool(false) => Cow::Borrowed("false"),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Position of a node in the tree, as child indices from the forest root
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// Path of the `index`-th top-level node
    #[must_use]
    pub fn root(index: usize) -> Self {
        Self(vec![index])
    }

    /// Build a path from raw indices
    #[must_use]
    pub fn from_indices(indices: impl Into<Vec<usize>>) -> Self {
        Self(indices.into())
    }

    /// Path of the `index`-th child of this node
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Child indices from the forest root
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Number of steps from the forest root
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Whether this node is a strict ancestor of `other`
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other.0.len() > self.0.len() && other.0.starts_with(&self.0)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for index in &self.0 {
            write!(f, "/{index}")?;
        }
        Ok(())
    }
}

/// Snapshot of one UI node and its subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    tag: String,
    #[serde(default)]
    path: NodePath,
    #[serde(default)]
    attributes: BTreeMap<String, AttrValue>,
    #[serde(default)]
    children: Vec<Component>,
}

impl Component {
    /// Create an unplaced component with the given tag
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            path: NodePath::default(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        let _ = self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the `class` attribute
    #[must_use]
    pub fn with_class(self, class: impl Into<String>) -> Self {
        self.with_attr(keys::CLASS, AttrValue::Text(class.into()))
    }

    /// Set the `text` attribute
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_attr(keys::TEXT, AttrValue::Text(text.into()))
    }

    /// Set the `selected` attribute as text, the way most transports report it
    #[must_use]
    pub fn with_selected(self, selected: bool) -> Self {
        self.with_attr(keys::SELECTED, selected.to_string())
    }

    /// Set the `enabled` attribute
    #[must_use]
    pub fn with_enabled(self, enabled: bool) -> Self {
        self.with_attr(keys::ENABLED, enabled)
    }

    /// Append a child
    #[must_use]
    pub fn with_child(mut self, child: Component) -> Self {
        self.children.push(child);
        self
    }

    /// Append several children
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = Component>) -> Self {
        self.children.extend(children);
        self
    }

    /// Assign `path` to this node and derived paths to its whole subtree
    #[must_use]
    pub fn placed_at(mut self, path: NodePath) -> Self {
        self.assign_path(path);
        self
    }

    fn assign_path(&mut self, path: NodePath) {
        for (index, child) in self.children.iter_mut().enumerate() {
            child.assign_path(path.child(index));
        }
        self.path = path;
    }

    /// Node tag (element kind)
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Tree position at snapshot time
    #[must_use]
    pub const fn path(&self) -> &NodePath {
        &self.path
    }

    /// All attributes
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, AttrValue> {
        &self.attributes
    }

    /// A single attribute
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// Textual form of an attribute
    #[must_use]
    pub fn attribute_text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.attributes.get(key).map(AttrValue::as_text)
    }

    /// Ordered children
    #[must_use]
    pub fn children(&self) -> &[Component] {
        &self.children
    }

    /// This node followed by its subtree in document order
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// The subtree below this node in document order, excluding the node itself
    #[must_use]
    pub fn descendants(&self) -> Walk<'_> {
        Walk {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// Short human description used in logs and errors
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = format!("<{}", self.tag);
        for key in [keys::CLASS, keys::TEXT, keys::TITLE] {
            if let Some(value) = self.attribute_text(key) {
                out.push_str(&format!(" {key}='{value}'"));
            }
        }
        out.push_str(&format!("> at {}", self.path));
        out
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut BTreeMap<String, AttrValue> {
        &mut self.attributes
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Component> {
        &mut self.children
    }
}

/// Depth-first, pre-order traversal
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<&'a Component>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Component;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Assign root paths to a forest of top-level components
#[must_use]
pub fn place_forest(roots: Vec<Component>) -> Vec<Component> {
    roots
        .into_iter()
        .enumerate()
        .map(|(index, root)| root.placed_at(NodePath::root(index)))
        .collect()
}

/// Find the node at `path` inside a forest
#[must_use]
pub fn locate<'a>(roots: &'a [Component], path: &NodePath) -> Option<&'a Component> {
    let (first, rest) = path.indices().split_first()?;
    let mut node = roots.get(*first)?;
    for index in rest {
        node = node.children.get(*index)?;
    }
    Some(node)
}
