//! Values produced and consumed by association accessors.

use graphmodel_core::{Node, QueryEngine, Result, TargetResolver};
use graphmodel_query::QueryProxy;

/// The result of reading a to-many association.
#[derive(Debug, Clone)]
pub enum Collection {
    /// The owner is not saved, so nothing can be related to it yet.
    Empty,
    /// Results already materialized through the association cache.
    Loaded(Vec<Node>),
    /// A traversal that runs when asked for results.
    Pending(QueryProxy),
}

impl Collection {
    pub fn all<E, R>(&self, engine: &E, resolver: &R) -> Result<Vec<Node>>
    where
        E: QueryEngine + ?Sized,
        R: TargetResolver + ?Sized,
    {
        match self {
            Collection::Empty => Ok(Vec::new()),
            Collection::Loaded(nodes) => Ok(nodes.clone()),
            Collection::Pending(proxy) => proxy.all(engine, resolver),
        }
    }

    pub fn first<E, R>(&self, engine: &E, resolver: &R) -> Result<Option<Node>>
    where
        E: QueryEngine + ?Sized,
        R: TargetResolver + ?Sized,
    {
        match self {
            Collection::Empty => Ok(None),
            Collection::Loaded(nodes) => Ok(nodes.first().cloned()),
            Collection::Pending(proxy) => proxy.first(engine, resolver),
        }
    }

    pub fn count<E: QueryEngine + ?Sized>(&self, engine: &E) -> Result<u64> {
        match self {
            Collection::Empty => Ok(0),
            Collection::Loaded(nodes) => Ok(nodes.len() as u64),
            Collection::Pending(proxy) => proxy.count(engine),
        }
    }

    /// The underlying traversal, if results have not been materialized.
    pub fn proxy(&self) -> Option<&QueryProxy> {
        match self {
            Collection::Pending(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn into_proxy(self) -> Option<QueryProxy> {
        match self {
            Collection::Pending(proxy) => Some(proxy),
            _ => None,
        }
    }
}

/// What an accessor read returns, by association kind.
#[derive(Debug, Clone)]
pub enum Association {
    One(Option<Node>),
    Many(Collection),
}

/// What an accessor write accepts, by association kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// Relate exactly this node, or nothing.
    One(Option<Node>),
    /// Relate exactly these nodes.
    Many(Vec<Node>),
}

impl Assignment {
    pub fn into_targets(self) -> Vec<Node> {
        match self {
            Assignment::One(node) => node.into_iter().collect(),
            Assignment::Many(nodes) => nodes,
        }
    }
}

impl From<Node> for Assignment {
    fn from(node: Node) -> Self {
        Assignment::One(Some(node))
    }
}

impl From<Option<Node>> for Assignment {
    fn from(node: Option<Node>) -> Self {
        Assignment::One(node)
    }
}

impl From<Vec<Node>> for Assignment {
    fn from(nodes: Vec<Node>) -> Self {
        Assignment::Many(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmodel_core::{LabelResolver, RawNode, RealizedQuery, Value};

    struct PanickingEngine;

    impl QueryEngine for PanickingEngine {
        fn fetch_nodes(&self, query: &RealizedQuery) -> Result<Vec<RawNode>> {
            panic!("unexpected query: {}", query.text)
        }

        fn fetch_values(&self, query: &RealizedQuery) -> Result<Vec<Value>> {
            panic!("unexpected query: {}", query.text)
        }

        fn execute(&self, query: &RealizedQuery) -> Result<u64> {
            panic!("unexpected write: {}", query.text)
        }
    }

    #[test]
    fn empty_and_loaded_never_query() {
        let empty = Collection::Empty;
        assert!(empty.all(&PanickingEngine, &LabelResolver).unwrap().is_empty());
        assert_eq!(empty.count(&PanickingEngine).unwrap(), 0);
        assert!(empty.first(&PanickingEngine, &LabelResolver).unwrap().is_none());
        assert!(empty.proxy().is_none());

        let loaded = Collection::Loaded(vec![Node::persisted("Vehicle", 1)]);
        assert_eq!(loaded.count(&PanickingEngine).unwrap(), 1);
        assert_eq!(
            loaded.first(&PanickingEngine, &LabelResolver).unwrap(),
            Some(Node::persisted("Vehicle", 1))
        );
    }

    #[test]
    fn assignment_targets() {
        assert!(Assignment::One(None).into_targets().is_empty());
        assert_eq!(
            Assignment::from(Node::persisted("Vehicle", 1)).into_targets().len(),
            1
        );
        assert_eq!(
            Assignment::from(vec![Node::persisted("Vehicle", 1), Node::persisted("Vehicle", 2)])
                .into_targets()
                .len(),
            2
        );
    }
}
