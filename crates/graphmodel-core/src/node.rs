//! Graph nodes as seen by the association layer.
//!
//! A [`Node`] is a typed entity: its runtime type name, its store-assigned id
//! (absent until saved) and its properties. A [`RawNode`] is what the query
//! engine hands back before the row has been mapped to a type.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Store-assigned node identity.
pub type NodeId = i64;

/// Store-assigned relationship identity.
pub type RelationshipId = i64;

/// A typed graph entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Identity in the store, `None` until the node has been saved.
    pub id: Option<NodeId>,
    /// Runtime node type.
    pub node_type: String,
    /// Property values.
    pub properties: BTreeMap<String, Value>,
}

impl Node {
    /// A node that has not been saved yet.
    #[must_use]
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            id: None,
            node_type: node_type.into(),
            properties: BTreeMap::new(),
        }
    }

    /// A node that already exists in the store.
    #[must_use]
    pub fn persisted(node_type: impl Into<String>, id: NodeId) -> Self {
        Self {
            id: Some(id),
            ..Self::new(node_type)
        }
    }

    /// Set a property (builder form).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Whether the node has a store identity.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Get a property value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// An untyped result row returned by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub id: NodeId,
    /// Every label on the stored node.
    pub labels: Vec<String>,
    pub properties: BTreeMap<String, Value>,
}

impl RawNode {
    #[must_use]
    pub fn new<I, S>(id: NodeId, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            labels: labels.into_iter().map(Into::into).collect(),
            properties: BTreeMap::new(),
        }
    }

    /// Set a property (builder form).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Check whether the row carries `label`.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Materialize the row as a node of `node_type`.
    #[must_use]
    pub fn into_node(self, node_type: impl Into<String>) -> Node {
        Node {
            id: Some(self.id),
            node_type: node_type.into(),
            properties: self.properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_state() {
        let draft = Node::new("Person").with("name", "Ada");
        assert!(!draft.is_persisted());
        assert_eq!(draft.get("name"), Some(&Value::Text("Ada".into())));

        let saved = Node::persisted("Person", 4);
        assert!(saved.is_persisted());
        assert!(saved.properties.is_empty());
    }

    #[test]
    fn raw_node_materializes() {
        let raw = RawNode::new(9, ["Vehicle", "Car"]).with("wheels", 4);
        assert!(raw.has_label("Car"));
        assert!(!raw.has_label("Bike"));

        let node = raw.into_node("Car");
        assert_eq!(node.id, Some(9));
        assert_eq!(node.node_type, "Car");
        assert_eq!(node.get("wheels"), Some(&Value::BigInt(4)));
    }
}
