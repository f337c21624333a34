//! Collaborator traits for executing realized queries.
//!
//! - [`QueryEngine`] - runs a [`RealizedQuery`] against the graph store
//! - [`TargetResolver`] - maps an untyped result row to a concrete node type
//!
//! The association layer never inspects query text; it builds a
//! [`RealizedQuery`], hands it to the engine and resolves whatever rows come
//! back.

use crate::association::TargetClassSpec;
use crate::error::{AssociationError, AssociationErrorKind, Error, Result};
use crate::node::{Node, RawNode};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Concrete query text plus its bound parameters.
///
/// Parameters live in a `BTreeMap` so that two realizations of the same
/// traversal compare, print and hash identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealizedQuery {
    pub text: String,
    pub params: BTreeMap<String, Value>,
}

impl RealizedQuery {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: BTreeMap::new(),
        }
    }

    /// Bind a parameter (builder form).
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Get a bound parameter.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }
}

/// Executes realized queries against the graph store.
///
/// Implementations own transport and session handling. Transaction control
/// defaults to a no-op for engines that do not support it.
pub trait QueryEngine {
    /// Run a read returning node rows.
    fn fetch_nodes(&self, query: &RealizedQuery) -> Result<Vec<RawNode>>;

    /// Run a read returning one scalar per row (ids, counts).
    fn fetch_values(&self, query: &RealizedQuery) -> Result<Vec<Value>>;

    /// Run a write, returning the number of affected relationships.
    fn execute(&self, query: &RealizedQuery) -> Result<u64>;

    /// Open a transaction.
    fn begin(&self) -> Result<()> {
        Ok(())
    }

    /// Commit the open transaction.
    fn commit(&self) -> Result<()> {
        Ok(())
    }

    /// Roll back the open transaction.
    fn rollback(&self) -> Result<()> {
        Ok(())
    }
}

/// Maps result rows to concrete node types.
pub trait TargetResolver {
    /// Resolve `raw` against the declared target of the traversal.
    fn resolve(&self, target: &TargetClassSpec, raw: RawNode) -> Result<Node>;
}

/// Resolver that only looks at labels, with no knowledge of a type hierarchy.
///
/// - `Single(T)` always yields `T`
/// - `Multi` yields the first candidate present among the row's labels
/// - `Unresolved` yields the row's first label
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelResolver;

impl TargetResolver for LabelResolver {
    fn resolve(&self, target: &TargetClassSpec, raw: RawNode) -> Result<Node> {
        let node_type = match target {
            TargetClassSpec::Single(name) => Some(name.clone()),
            TargetClassSpec::Multi(names) => names.iter().find(|n| raw.has_label(n)).cloned(),
            TargetClassSpec::Unresolved => raw.labels.first().cloned(),
        };
        match node_type {
            Some(node_type) => Ok(raw.into_node(node_type)),
            None => Err(unresolved_target(target, &raw)),
        }
    }
}

/// Error for a row that matches none of the declared target types.
pub fn unresolved_target(target: &TargetClassSpec, raw: &RawNode) -> Error {
    Error::Association(AssociationError {
        kind: AssociationErrorKind::UnresolvedTarget,
        node_type: raw.labels.join(":"),
        association: None,
        message: format!(
            "node {} with labels [{}] matches none of [{}]",
            raw.id,
            raw.labels.join(", "),
            target.candidates().join(", ")
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realized_query_params_are_ordered() {
        let q = RealizedQuery::new("MATCH (n) RETURN n")
            .bind("b", 2)
            .bind("a", 1);
        let keys: Vec<&str> = q.params.keys().map(String::as_str).collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(q.param("a"), Some(&Value::BigInt(1)));
    }

    #[test]
    fn label_resolver() {
        let raw = RawNode::new(1, ["Vehicle", "Bike"]);
        let single = TargetClassSpec::Single("Vehicle".into());
        let multi = TargetClassSpec::Multi(vec!["Car".into(), "Bike".into()]);

        assert_eq!(
            LabelResolver.resolve(&single, raw.clone()).unwrap().node_type,
            "Vehicle"
        );
        assert_eq!(
            LabelResolver.resolve(&multi, raw.clone()).unwrap().node_type,
            "Bike"
        );
        assert_eq!(
            LabelResolver
                .resolve(&TargetClassSpec::Unresolved, raw)
                .unwrap()
                .node_type,
            "Vehicle"
        );

        let err = LabelResolver
            .resolve(&multi, RawNode::new(2, ["Boat"]))
            .unwrap_err();
        assert_eq!(
            err.association_kind(),
            Some(AssociationErrorKind::UnresolvedTarget)
        );
    }
}
