use std::collections::BTreeMap;

/// Field name that addresses a node's display label in searches.
pub const LABEL_FIELD: &str = "label";

/// One entry of the input forest, owned by the caller.
///
/// The index never keeps references into records; it copies what it needs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeRecord {
    /// Explicit identifier. `None` (or an empty string) asks the builder to derive one.
    pub id: Option<String>,
    /// Display label.
    pub label: String,
    /// Additional label-like text fields (`name`, `title`, `description`, ...).
    pub fields: BTreeMap<String, String>,
    /// Nested children in display order.
    pub children: Vec<Self>,
}

impl NodeRecord {
    /// Creates a record without an id.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Creates a record with an explicit id.
    pub fn with_id(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            label: label.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children.extend(children);
        self
    }
}

/// A node as stored in the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub fields: BTreeMap<String, String>,
}

impl Node {
    /// Returns the text of a label-like field; `"label"` addresses [`Node::label`].
    pub fn field(&self, name: &str) -> Option<&str> {
        if name == LABEL_FIELD {
            Some(self.label.as_str())
        } else {
            self.fields.get(name).map(String::as_str)
        }
    }
}

/// Minimal forest contract used by the visible-order walk and the renderer.
///
/// A proper forest is expected (not a DAG):
/// - no cycles;
/// - each node has at most one parent;
/// - slots are dense and stable for the lifetime of one index.
pub trait TreeModel {
    /// Returns the roots in display order.
    fn roots(&self) -> &[usize];
    /// Returns the node's children in display order.
    fn children_of(&self, slot: usize) -> &[usize];
    /// Returns `true` if the slot refers to a node.
    fn contains(&self, slot: usize) -> bool;
    /// Returns an approximate size hint (not required to be exact).
    fn size_hint(&self) -> usize {
        0
    }
}
