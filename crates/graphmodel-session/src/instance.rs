//! A node paired with its association cache.

use graphmodel_core::{Node, NodeId};
use graphmodel_query::AssociationCache;

/// A loaded node and the association results cached for it.
///
/// The cache belongs to this instance alone and is dropped with it.
#[derive(Debug)]
pub struct Instance {
    node: Node,
    associations: AssociationCache,
}

impl Instance {
    pub fn new(node: Node) -> Self {
        Self {
            node,
            associations: AssociationCache::new(),
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Mutable access to properties. Does not touch the cache.
    pub fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    pub fn into_node(self) -> Node {
        self.node
    }

    pub fn node_type(&self) -> &str {
        &self.node.node_type
    }

    pub fn id(&self) -> Option<NodeId> {
        self.node.id
    }

    pub fn is_persisted(&self) -> bool {
        self.node.is_persisted()
    }

    /// Record the id the store assigned on save.
    pub fn mark_saved(&mut self, id: NodeId) {
        self.node.id = Some(id);
        self.associations.clear();
    }

    pub fn cache(&self) -> &AssociationCache {
        &self.associations
    }

    pub fn cache_mut(&mut self) -> &mut AssociationCache {
        &mut self.associations
    }
}

impl From<Node> for Instance {
    fn from(node: Node) -> Self {
        Self::new(node)
    }
}
