//! Composable association traversals.
//!
//! A [`QueryProxy`] is one link in a chain that starts at a saved node or at
//! a node type and follows declared associations hop by hop. Nothing touches
//! the store until the chain is realized and executed; [`QueryProxy::realize`]
//! is the single place where a chain turns into query text and parameters.
//!
//! # Example
//!
//! ```ignore
//! let recent = QueryProxy::root(ProxyRoot::instance("Person", 7))
//!     .extend(vehicles, HopOptions::new().filter(Filter::gte("year", 2020)))
//!     .order_by(OrderBy::desc("year"))
//!     .all(&engine, &schema)?;
//! ```

use crate::clause::{Filter, OrderBy, quote_ident};
use graphmodel_core::{
    AssociationDescriptor, Direction, Error, Node, NodeId, QueryEngine, QueryError,
    QueryErrorKind, RealizedQuery, RelationshipId, Result, TargetClassSpec, TargetResolver, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where a traversal chain starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyRoot {
    /// A single saved node.
    Instance { node_type: String, id: NodeId },
    /// Every node of a type.
    Type { node_type: String },
}

impl ProxyRoot {
    pub fn instance(node_type: impl Into<String>, id: NodeId) -> Self {
        ProxyRoot::Instance {
            node_type: node_type.into(),
            id,
        }
    }

    pub fn of_type(node_type: impl Into<String>) -> Self {
        ProxyRoot::Type {
            node_type: node_type.into(),
        }
    }

    /// Root at `node`, or `None` if the node has not been saved.
    pub fn for_node(node: &Node) -> Option<Self> {
        node.id.map(|id| Self::instance(node.node_type.clone(), id))
    }

    pub fn node_type(&self) -> &str {
        match self {
            ProxyRoot::Instance { node_type, .. } | ProxyRoot::Type { node_type } => node_type,
        }
    }
}

/// What a realized query returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnShape {
    /// The matched nodes of the last hop.
    #[default]
    Nodes,
    /// Their ids.
    Ids,
    /// How many there are.
    Count,
}

/// Per-hop narrowing and paging options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HopOptions {
    node: Option<NodeId>,
    relationship: Option<RelationshipId>,
    labels: Option<Vec<String>>,
    filters: Vec<Filter>,
    order_by: Vec<OrderBy>,
    skip: Option<u64>,
    limit: Option<u64>,
    optional: bool,
    context: Option<String>,
}

impl HopOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only match this target node.
    #[must_use]
    pub fn node(mut self, id: NodeId) -> Self {
        self.node = Some(id);
        self
    }

    /// Only match through this relationship.
    #[must_use]
    pub fn relationship(mut self, id: RelationshipId) -> Self {
        self.relationship = Some(id);
        self
    }

    /// Narrow a polymorphic target to these types.
    #[must_use]
    pub fn only<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    #[must_use]
    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Let this hop match nothing without emptying the whole chain.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Diagnostic label carried into logs.
    #[must_use]
    pub fn context(mut self, label: impl Into<String>) -> Self {
        self.context = Some(label.into());
        self
    }

    fn has_paging(&self) -> bool {
        !self.order_by.is_empty() || self.skip.is_some() || self.limit.is_some()
    }

    fn paging_clauses(&self, ident: &str) -> Vec<String> {
        let mut parts = Vec::new();
        if !self.order_by.is_empty() {
            let keys: Vec<String> = self.order_by.iter().map(|o| o.build(ident)).collect();
            parts.push(format!("ORDER BY {}", keys.join(", ")));
        }
        if let Some(n) = self.skip {
            parts.push(format!("SKIP {n}"));
        }
        if let Some(n) = self.limit {
            parts.push(format!("LIMIT {n}"));
        }
        parts
    }
}

#[derive(Debug, Clone)]
enum Origin {
    Root(ProxyRoot),
    Hop {
        previous: Box<QueryProxy>,
        association: Arc<AssociationDescriptor>,
    },
}

/// One link of a lazily evaluated traversal chain.
#[derive(Debug, Clone)]
pub struct QueryProxy {
    origin: Origin,
    hop: HopOptions,
    /// Candidate target types carried for polymorphic hops.
    candidates: Vec<String>,
}

/// Outcome of reconciling an association's relationship set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceSummary {
    /// Targets that gained a relationship.
    pub added: Vec<NodeId>,
    /// Targets whose relationship was removed.
    pub removed: Vec<NodeId>,
}

impl QueryProxy {
    /// Start a chain.
    pub fn root(root: ProxyRoot) -> Self {
        Self {
            origin: Origin::Root(root),
            hop: HopOptions::default(),
            candidates: Vec::new(),
        }
    }

    /// Start at a saved node. `None` if `node` has no id yet.
    pub fn root_for_instance(node: &Node) -> Option<Self> {
        ProxyRoot::for_node(node).map(Self::root)
    }

    /// Start at every node of `node_type`.
    pub fn root_for_type(node_type: impl Into<String>) -> Self {
        Self::root(ProxyRoot::of_type(node_type))
    }

    /// Append a hop following `association`.
    pub fn extend(self, association: Arc<AssociationDescriptor>, mut options: HopOptions) -> Self {
        let candidates = narrow_candidates(&association.target, options.labels.take());
        Self {
            origin: Origin::Hop {
                previous: Box::new(self),
                association,
            },
            hop: options,
            candidates,
        }
    }

    /// Add a filter to the last hop.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.hop.filters.push(filter);
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.hop.order_by.push(order);
        self
    }

    #[must_use]
    pub fn skip(mut self, n: u64) -> Self {
        self.hop.skip = Some(n);
        self
    }

    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.hop.limit = Some(n);
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.hop.optional = true;
        self
    }

    #[must_use]
    pub fn context(mut self, label: impl Into<String>) -> Self {
        self.hop.context = Some(label.into());
        self
    }

    /// Only match this node at the last hop, or at the root of a chain
    /// without hops.
    #[must_use]
    pub fn match_node(mut self, id: NodeId) -> Self {
        self.hop.node = Some(id);
        self
    }

    /// Only match through this relationship at the last hop. A chain without
    /// hops has no relationship to narrow and ignores this.
    #[must_use]
    pub fn match_relationship(mut self, id: RelationshipId) -> Self {
        self.hop.relationship = Some(id);
        self
    }

    /// Narrow the last hop's polymorphic target.
    #[must_use]
    pub fn only<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Origin::Hop { association, .. } = &self.origin {
            let labels = labels.into_iter().map(Into::into).collect();
            self.candidates = narrow_candidates(&association.target, Some(labels));
        }
        self
    }

    /// The association driving this hop, `None` for a root.
    pub fn association(&self) -> Option<&Arc<AssociationDescriptor>> {
        match &self.origin {
            Origin::Hop { association, .. } => Some(association),
            Origin::Root(_) => None,
        }
    }

    /// The proxy this hop extends, `None` for a root.
    pub fn previous(&self) -> Option<&QueryProxy> {
        match &self.origin {
            Origin::Hop { previous, .. } => Some(previous),
            Origin::Root(_) => None,
        }
    }

    /// Where the chain starts.
    pub fn start(&self) -> &ProxyRoot {
        let mut current = self;
        loop {
            match &current.origin {
                Origin::Root(root) => return root,
                Origin::Hop { previous, .. } => current = previous,
            }
        }
    }

    /// Number of hops after the root.
    pub fn depth(&self) -> usize {
        self.previous().map_or(0, |p| p.depth() + 1)
    }

    pub fn is_optional(&self) -> bool {
        self.hop.optional
    }

    /// Diagnostic label of the last hop.
    pub fn context_label(&self) -> Option<&str> {
        self.hop.context.as_deref()
    }

    /// Candidate target types carried for this hop.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// What result rows of this chain should be resolved against.
    pub fn target_spec(&self) -> TargetClassSpec {
        match &self.origin {
            Origin::Root(root) => TargetClassSpec::Single(root.node_type().to_string()),
            Origin::Hop { association, .. } => {
                if self.candidates.is_empty() {
                    association.target.clone()
                } else {
                    TargetClassSpec::Multi(self.candidates.clone())
                }
            }
        }
    }

    fn chain(&self) -> Vec<&QueryProxy> {
        let mut chain = Vec::with_capacity(self.depth() + 1);
        let mut current = Some(self);
        while let Some(stage) = current {
            chain.push(stage);
            current = stage.previous();
        }
        chain.reverse();
        chain
    }

    /// Realize the chain as a node-returning query.
    pub fn realize(&self) -> RealizedQuery {
        self.realize_as(ReturnShape::Nodes)
    }

    /// Realize the chain. Pure: the same chain always yields the same output.
    pub fn realize_as(&self, shape: ReturnShape) -> RealizedQuery {
        let chain = self.chain();
        let last = chain.len() - 1;
        let mut params = BTreeMap::new();
        let mut parts: Vec<String> = Vec::new();

        for (i, stage) in chain.iter().enumerate() {
            let ident = format!("n{i}");
            let mut conditions = Vec::new();

            match &stage.origin {
                Origin::Root(root) => {
                    parts.push(format!(
                        "MATCH ({ident}:{})",
                        quote_ident(root.node_type())
                    ));
                    let pinned = match root {
                        ProxyRoot::Instance { id, .. } => Some(*id),
                        ProxyRoot::Type { .. } => None,
                    };
                    if let Some(id) = pinned.or(stage.hop.node) {
                        params.insert(format!("{ident}_id"), Value::BigInt(id));
                        conditions.push(format!("id({ident}) = ${ident}_id"));
                    }
                    // An instance root narrowed to another node matches nothing.
                    let conflicting = stage
                        .hop
                        .node
                        .filter(|id| pinned.is_some_and(|root_id| root_id != *id));
                    if let Some(id) = conflicting {
                        params.insert(format!("{ident}_node_id"), Value::BigInt(id));
                        conditions.push(format!("id({ident}) = ${ident}_node_id"));
                    }
                }
                Origin::Hop { association, .. } => {
                    let rel = format!("r{i}");
                    let keyword = if stage.hop.optional {
                        "OPTIONAL MATCH"
                    } else {
                        "MATCH"
                    };
                    let target = match &association.target {
                        TargetClassSpec::Single(name) => {
                            format!("{ident}:{}", quote_ident(name))
                        }
                        _ => ident.clone(),
                    };
                    parts.push(format!(
                        "{keyword} {}",
                        edge_pattern(
                            &format!("n{}", i - 1),
                            &rel,
                            &association.relationship_type,
                            association.direction,
                            &target,
                        )
                    ));
                    if let Some(id) = stage.hop.node {
                        params.insert(format!("{ident}_id"), Value::BigInt(id));
                        conditions.push(format!("id({ident}) = ${ident}_id"));
                    }
                    if let Some(id) = stage.hop.relationship {
                        params.insert(format!("{rel}_id"), Value::BigInt(id));
                        conditions.push(format!("id({rel}) = ${rel}_id"));
                    }
                    if !stage.candidates.is_empty() {
                        params.insert(
                            format!("{ident}_labels"),
                            Value::from(stage.candidates.clone()),
                        );
                        conditions.push(format!(
                            "any(label IN labels({ident}) WHERE label IN ${ident}_labels)"
                        ));
                    }
                }
            }

            for (k, filter) in stage.hop.filters.iter().enumerate() {
                conditions.push(filter.build(&ident, &format!("{ident}_p{k}"), &mut params));
            }
            if !conditions.is_empty() {
                parts.push(format!("WHERE {}", conditions.join(" AND ")));
            }
            if i < last && stage.hop.has_paging() {
                parts.push(format!("WITH DISTINCT {ident}"));
                parts.extend(stage.hop.paging_clauses(&ident));
            }
        }

        let ident = format!("n{last}");
        let tip = &chain[last].hop;
        match shape {
            ReturnShape::Nodes => {
                parts.push(format!("RETURN DISTINCT {ident}"));
                parts.extend(tip.paging_clauses(&ident));
            }
            ReturnShape::Ids | ReturnShape::Count if tip.has_paging() => {
                parts.push(format!("WITH DISTINCT {ident}"));
                parts.extend(tip.paging_clauses(&ident));
                parts.push(match shape {
                    ReturnShape::Ids => format!("RETURN id({ident})"),
                    _ => format!("RETURN count({ident})"),
                });
            }
            ReturnShape::Ids => parts.push(format!("RETURN DISTINCT id({ident})")),
            ReturnShape::Count => parts.push(format!("RETURN count(DISTINCT {ident})")),
        }

        RealizedQuery {
            text: parts.join(" "),
            params,
        }
    }

    /// Execute and resolve every matched node.
    #[tracing::instrument(
        level = "debug",
        skip(self, engine, resolver),
        fields(context = self.context_label())
    )]
    pub fn all<E, R>(&self, engine: &E, resolver: &R) -> Result<Vec<Node>>
    where
        E: QueryEngine + ?Sized,
        R: TargetResolver + ?Sized,
    {
        let query = self.realize();
        tracing::trace!(query = %query.text, "Executing traversal");
        let target = self.target_spec();
        let rows = engine.fetch_nodes(&query)?;
        tracing::debug!(row_count = rows.len(), "Resolving traversal rows");
        rows.into_iter()
            .map(|raw| resolver.resolve(&target, raw))
            .collect()
    }

    /// Execute with `LIMIT 1` and return the first node, if any. A smaller
    /// existing limit is kept.
    pub fn first<E, R>(&self, engine: &E, resolver: &R) -> Result<Option<Node>>
    where
        E: QueryEngine + ?Sized,
        R: TargetResolver + ?Sized,
    {
        let limit = self.hop.limit.map_or(1, |n| n.min(1));
        Ok(self
            .clone()
            .limit(limit)
            .all(engine, resolver)?
            .into_iter()
            .next())
    }

    /// Count matched nodes.
    pub fn count<E: QueryEngine + ?Sized>(&self, engine: &E) -> Result<u64> {
        let query = self.realize_as(ReturnShape::Count);
        let values = engine.fetch_values(&query)?;
        match values.first() {
            None => Ok(0),
            Some(value) => value
                .as_i64()
                .and_then(|n| u64::try_from(n).ok())
                .ok_or_else(|| unexpected_value(&query, value)),
        }
    }

    /// Ids of matched nodes.
    pub fn ids<E: QueryEngine + ?Sized>(&self, engine: &E) -> Result<Vec<NodeId>> {
        let query = self.realize_as(ReturnShape::Ids);
        engine
            .fetch_values(&query)?
            .iter()
            .map(|value| value.as_i64().ok_or_else(|| unexpected_value(&query, value)))
            .collect()
    }

    /// Make exactly `targets` related through this hop's association.
    ///
    /// Relationships to nodes outside `targets` are deleted and missing ones
    /// are created. Filters on this proxy do not limit what is reconciled.
    #[tracing::instrument(level = "debug", skip(self, engine, targets))]
    pub fn replace_with<E: QueryEngine + ?Sized>(
        &self,
        engine: &E,
        targets: &[Node],
    ) -> Result<ReplaceSummary> {
        let anchor = self.anchor()?;
        let wanted = anchor.target_ids(targets)?;
        let current = QueryProxy::root(ProxyRoot::instance(anchor.node_type, anchor.id))
            .extend(Arc::clone(anchor.association), HopOptions::default())
            .ids(engine)?;

        let removed: Vec<NodeId> = current
            .iter()
            .filter(|id| !wanted.contains(id))
            .copied()
            .collect();
        let added: Vec<NodeId> = wanted
            .iter()
            .filter(|id| !current.contains(id))
            .copied()
            .collect();

        if !removed.is_empty() {
            engine.execute(&anchor.disconnect_query(&removed))?;
        }
        if !added.is_empty() {
            engine.execute(&anchor.connect_query(&added))?;
        }

        tracing::info!(
            node_type = anchor.node_type,
            association = %anchor.association.name,
            added = added.len(),
            removed = removed.len(),
            "Reconciled association"
        );
        Ok(ReplaceSummary { added, removed })
    }

    /// Relate one more node. Returns `true` if a relationship was created.
    pub fn connect<E: QueryEngine + ?Sized>(&self, engine: &E, target: &Node) -> Result<bool> {
        let anchor = self.anchor()?;
        let ids = anchor.target_ids(std::slice::from_ref(target))?;
        Ok(engine.execute(&anchor.connect_query(&ids))? > 0)
    }

    /// Remove the relationship to one node. Returns the number removed.
    pub fn disconnect<E: QueryEngine + ?Sized>(&self, engine: &E, target: &Node) -> Result<u64> {
        let anchor = self.anchor()?;
        let ids = anchor.target_ids(std::slice::from_ref(target))?;
        engine.execute(&anchor.disconnect_query(&ids))
    }

    /// Whether `target` is matched by this traversal.
    pub fn is_connected<E: QueryEngine + ?Sized>(&self, engine: &E, target: &Node) -> Result<bool> {
        match target.id {
            Some(id) => Ok(self.clone().match_node(id).count(engine)? > 0),
            None => Ok(false),
        }
    }

    fn anchor(&self) -> Result<Anchor<'_>> {
        if let Origin::Hop {
            previous,
            association,
        } = &self.origin
        {
            if let Origin::Root(ProxyRoot::Instance { node_type, id }) = &previous.origin {
                return Ok(Anchor {
                    node_type,
                    id: *id,
                    association,
                });
            }
        }
        Err(Error::Custom(format!(
            "relationship writes need a single hop from a saved node, got a chain of depth {} from {}",
            self.depth(),
            self.start().node_type()
        )))
    }
}

/// A single hop from a saved node: the unit relationship writes act on.
struct Anchor<'a> {
    node_type: &'a str,
    id: NodeId,
    association: &'a Arc<AssociationDescriptor>,
}

impl Anchor<'_> {
    fn target_ids(&self, targets: &[Node]) -> Result<Vec<NodeId>> {
        let mut ids = Vec::with_capacity(targets.len());
        for target in targets {
            let Some(id) = target.id else {
                return Err(Error::non_persisted(
                    target.node_type.clone(),
                    self.association.name.clone(),
                    "relate",
                ));
            };
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn start(&self) -> String {
        format!("a:{}", quote_ident(self.node_type))
    }

    fn bind(&self, text: String, ids: &[NodeId]) -> RealizedQuery {
        RealizedQuery::new(text)
            .bind("start_id", self.id)
            .bind("target_ids", ids.to_vec())
    }

    fn connect_query(&self, ids: &[NodeId]) -> RealizedQuery {
        let direction = match self.association.direction {
            Direction::Both => Direction::Outgoing,
            other => other,
        };
        let text = format!(
            "MATCH ({}), (b) WHERE id(a) = $start_id AND id(b) IN $target_ids MERGE {}",
            self.start(),
            edge_pattern("a", "", &self.association.relationship_type, direction, "b")
        );
        self.bind(text, ids)
    }

    fn disconnect_query(&self, ids: &[NodeId]) -> RealizedQuery {
        let text = format!(
            "MATCH {} WHERE id(a) = $start_id AND id(b) IN $target_ids DELETE r",
            edge_pattern(
                &self.start(),
                "r",
                &self.association.relationship_type,
                self.association.direction,
                "b"
            )
        );
        self.bind(text, ids)
    }
}

fn edge_pattern(from: &str, rel: &str, rel_type: &str, direction: Direction, to: &str) -> String {
    let edge = format!("[{rel}:{}]", quote_ident(rel_type));
    match direction {
        Direction::Outgoing => format!("({from})-{edge}->({to})"),
        Direction::Incoming => format!("({from})<-{edge}-({to})"),
        Direction::Both => format!("({from})-{edge}-({to})"),
    }
}

fn narrow_candidates(target: &TargetClassSpec, labels: Option<Vec<String>>) -> Vec<String> {
    match (target, labels) {
        (TargetClassSpec::Multi(names), Some(labels)) => names
            .iter()
            .filter(|n| labels.contains(n))
            .cloned()
            .collect(),
        (TargetClassSpec::Multi(names), None) => names.clone(),
        (_, Some(labels)) => labels,
        (_, None) => Vec::new(),
    }
}

fn unexpected_value(query: &RealizedQuery, value: &Value) -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::UnexpectedResult,
        query: Some(query.text.clone()),
        message: format!("expected a non-negative integer, got {}", value.type_name()),
        source: None,
    })
}
