//! Association metadata for GraphModel Rust.
//!
//! An association is a named, directed relationship declared on a node type
//! (`Person` has many `vehicles` via outgoing `OWNS` edges). Declarations are
//! collected in an [`AssociationRegistry`] owned by the node type. Subtypes
//! receive a snapshot copy of their parent's registry when they are defined;
//! later declarations on the parent never reach an existing subtype.

use crate::error::{AssociationError, AssociationErrorKind, Error, Result};
use crate::validate::is_identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Cardinality of an association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssociationKind {
    /// Reads yield at most one related node.
    ToOne,
    /// Reads yield a collection of related nodes.
    ToMany,
}

/// Edge direction relative to the owning node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// `(owner)-[:TYPE]->(target)`
    #[default]
    Outgoing,
    /// `(owner)<-[:TYPE]-(target)`
    Incoming,
    /// Either direction when matching; created as outgoing.
    Both,
}

/// Which node types an association may point at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetClassSpec {
    /// Exactly one target type.
    Single(String),
    /// Several candidate target types; rows are resolved to one of them.
    Multi(Vec<String>),
    /// Any node; the concrete type comes from the row's labels.
    Unresolved,
}

impl TargetClassSpec {
    /// Candidate type names, empty for [`TargetClassSpec::Unresolved`].
    pub fn candidates(&self) -> &[String] {
        match self {
            TargetClassSpec::Single(name) => std::slice::from_ref(name),
            TargetClassSpec::Multi(names) => names,
            TargetClassSpec::Unresolved => &[],
        }
    }

    /// True when result rows must be resolved to a runtime type.
    pub fn is_polymorphic(&self) -> bool {
        !matches!(self, TargetClassSpec::Single(_))
    }
}

/// What happens to related nodes when the owner is deleted.
///
/// Stored here and consumed by whichever component performs deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CascadePolicy {
    /// Leave related nodes alone.
    #[default]
    None,
    /// Delete every related node without callbacks.
    DeleteTarget,
    /// Delete related nodes left with no other relationships.
    DeleteOrphans,
    /// Destroy every related node, running its callbacks.
    DestroyTarget,
    /// Destroy related nodes left with no other relationships.
    DestroyOrphans,
}

/// How strictly result rows are mapped to a node type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetResolution {
    /// Rows are resolved from their labels against the declared candidates.
    #[default]
    Polymorphic,
    /// The association must name exactly one target type.
    Exact,
}

/// Options accepted when declaring an association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationOptions {
    relationship_type: String,
    target: TargetClassSpec,
    cascade: CascadePolicy,
    resolution: TargetResolution,
}

impl AssociationOptions {
    /// Options for an association over edges labelled `relationship_type`.
    #[must_use]
    pub fn new(relationship_type: impl Into<String>) -> Self {
        Self {
            relationship_type: relationship_type.into(),
            target: TargetClassSpec::Unresolved,
            cascade: CascadePolicy::None,
            resolution: TargetResolution::Polymorphic,
        }
    }

    /// Restrict the target to a single node type.
    #[must_use]
    pub fn to(mut self, target: impl Into<String>) -> Self {
        self.target = TargetClassSpec::Single(target.into());
        self
    }

    /// Allow several candidate target types.
    #[must_use]
    pub fn to_any<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target = TargetClassSpec::Multi(targets.into_iter().map(Into::into).collect());
        self
    }

    /// Set the cascade policy.
    #[must_use]
    pub fn cascade(mut self, policy: CascadePolicy) -> Self {
        self.cascade = policy;
        self
    }

    /// Require the target to resolve to exactly one type.
    #[must_use]
    pub fn exact_target(mut self) -> Self {
        self.resolution = TargetResolution::Exact;
        self
    }
}

/// Immutable metadata for one declared association.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssociationDescriptor {
    /// Accessor name, unique within a registry.
    pub name: String,
    /// Cardinality.
    pub kind: AssociationKind,
    /// Edge direction relative to the owner.
    pub direction: Direction,
    /// Edge label.
    pub relationship_type: String,
    /// Target node type(s).
    pub target: TargetClassSpec,
    /// Cascade policy applied on owner deletion.
    pub cascade: CascadePolicy,
    /// Type the association was declared on.
    pub owner: String,
}

impl AssociationDescriptor {
    /// Build a descriptor from declaration options.
    ///
    /// Fails with `AmbiguousTargetType` when the options demand an exact
    /// target but zero or several target types were given.
    pub fn build(
        owner: impl Into<String>,
        kind: AssociationKind,
        direction: Direction,
        name: impl Into<String>,
        options: AssociationOptions,
    ) -> Result<Self> {
        let owner = owner.into();
        let name = name.into();

        let target = match (options.resolution, options.target) {
            (TargetResolution::Exact, TargetClassSpec::Multi(mut names)) if names.len() == 1 => {
                TargetClassSpec::Single(names.remove(0))
            }
            (TargetResolution::Exact, spec @ TargetClassSpec::Single(_))
            | (TargetResolution::Polymorphic, spec) => spec,
            (TargetResolution::Exact, spec) => {
                return Err(Error::Association(AssociationError {
                    kind: AssociationErrorKind::AmbiguousTargetType,
                    message: format!(
                        "{owner}.{name} requires exactly one target type, got {}",
                        describe_target(&spec)
                    ),
                    node_type: owner,
                    association: Some(name),
                }));
            }
        };

        Ok(Self {
            name,
            kind,
            direction,
            relationship_type: options.relationship_type,
            target,
            cascade: options.cascade,
            owner,
        })
    }

    /// The single target type, or `AmbiguousTargetType`.
    pub fn single_target(&self) -> Result<&str> {
        match &self.target {
            TargetClassSpec::Single(name) => Ok(name),
            other => Err(Error::Association(AssociationError {
                kind: AssociationErrorKind::AmbiguousTargetType,
                node_type: self.owner.clone(),
                association: Some(self.name.clone()),
                message: format!(
                    "{}.{} has {}; a single target type is required",
                    self.owner,
                    self.name,
                    describe_target(other)
                ),
            })),
        }
    }

    /// Is this a to-one association?
    pub const fn is_to_one(&self) -> bool {
        matches!(self.kind, AssociationKind::ToOne)
    }
}

fn describe_target(spec: &TargetClassSpec) -> String {
    match spec {
        TargetClassSpec::Single(name) => format!("target {name}"),
        TargetClassSpec::Multi(names) if names.is_empty() => "no target types".to_string(),
        TargetClassSpec::Multi(names) => format!("targets [{}]", names.join(", ")),
        TargetClassSpec::Unresolved => "an unresolved target".to_string(),
    }
}

/// Per-type mapping of association name to descriptor.
///
/// Descriptors are kept in declaration order. Cloning the registry (or
/// calling [`AssociationRegistry::inherit`]) produces an independent snapshot.
#[derive(Debug, Clone, Default)]
pub struct AssociationRegistry {
    owner: String,
    reserved: BTreeSet<String>,
    entries: Vec<Arc<AssociationDescriptor>>,
}

impl AssociationRegistry {
    /// Create an empty registry for `owner`.
    #[must_use]
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            reserved: BTreeSet::new(),
            entries: Vec::new(),
        }
    }

    /// Names that may not be used as association accessors.
    #[must_use]
    pub fn with_reserved<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(names.into_iter().map(Into::into));
        self
    }

    /// Snapshot `parent` for a newly defined subtype.
    ///
    /// The copy is taken once; later declarations on `parent` are not seen.
    #[must_use]
    pub fn inherit(parent: &AssociationRegistry, owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            reserved: parent.reserved.clone(),
            entries: parent.entries.clone(),
        }
    }

    /// Type that owns this registry.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Check whether `name` is reserved on this type.
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }

    /// Declare (or redeclare) an association.
    ///
    /// Redeclaring an existing name replaces its descriptor in place.
    pub fn declare(
        &mut self,
        kind: AssociationKind,
        direction: Direction,
        name: &str,
        options: AssociationOptions,
    ) -> Result<Arc<AssociationDescriptor>> {
        if !is_identifier(name) || !is_identifier(&options.relationship_type) {
            return Err(Error::Association(AssociationError {
                kind: AssociationErrorKind::InvalidName,
                node_type: self.owner.clone(),
                association: Some(name.to_string()),
                message: format!(
                    "invalid association '{}' with relationship type '{}' on {}",
                    name, options.relationship_type, self.owner
                ),
            }));
        }
        if self.is_reserved(name) {
            return Err(Error::Association(AssociationError {
                kind: AssociationErrorKind::ReservedName,
                node_type: self.owner.clone(),
                association: Some(name.to_string()),
                message: format!("'{}' is a reserved accessor on {}", name, self.owner),
            }));
        }

        let descriptor = Arc::new(AssociationDescriptor::build(
            self.owner.clone(),
            kind,
            direction,
            name,
            options,
        )?);

        if let Some(slot) = self.entries.iter_mut().find(|d| d.name == name) {
            tracing::warn!(
                node_type = %self.owner,
                association = name,
                "Redeclaring association; previous descriptor replaced"
            );
            *slot = Arc::clone(&descriptor);
        } else {
            self.entries.push(Arc::clone(&descriptor));
        }
        Ok(descriptor)
    }

    /// Find a descriptor by name.
    pub fn lookup(&self, name: &str) -> Option<&Arc<AssociationDescriptor>> {
        self.entries.iter().find(|d| d.name == name)
    }

    /// Find a descriptor by name, failing with `Undeclared`.
    pub fn require(&self, name: &str) -> Result<&Arc<AssociationDescriptor>> {
        self.lookup(name)
            .ok_or_else(|| Error::undeclared(self.owner.clone(), name))
    }

    /// Check whether `name` is declared.
    pub fn exists(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// All descriptors, in declaration order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<AssociationDescriptor>> {
        self.entries.iter()
    }

    /// Descriptors carrying a cascade policy other than `None`.
    pub fn cascading(&self) -> impl Iterator<Item = &Arc<AssociationDescriptor>> {
        self.entries
            .iter()
            .filter(|d| d.cascade != CascadePolicy::None)
    }

    /// Number of declared associations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no associations are declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> AssociationRegistry {
        AssociationRegistry::new("Person").with_reserved(["id", "save"])
    }

    #[test]
    fn declare_and_lookup() {
        let mut reg = person();
        let desc = reg
            .declare(
                AssociationKind::ToMany,
                Direction::Outgoing,
                "vehicles",
                AssociationOptions::new("OWNS").to("Vehicle"),
            )
            .unwrap();

        assert_eq!(desc.owner, "Person");
        assert_eq!(desc.relationship_type, "OWNS");
        assert_eq!(desc.target, TargetClassSpec::Single("Vehicle".into()));
        assert!(reg.exists("vehicles"));
        assert!(!reg.exists("pets"));
        assert!(reg.lookup("pets").is_none());
        assert!(reg.require("pets").unwrap_err().is_undeclared());
    }

    #[test]
    fn redeclaration_replaces_in_place() {
        let mut reg = person();
        reg.declare(
            AssociationKind::ToMany,
            Direction::Outgoing,
            "vehicles",
            AssociationOptions::new("OWNS"),
        )
        .unwrap();
        reg.declare(
            AssociationKind::ToOne,
            Direction::Incoming,
            "boss",
            AssociationOptions::new("MANAGES"),
        )
        .unwrap();
        reg.declare(
            AssociationKind::ToMany,
            Direction::Both,
            "vehicles",
            AssociationOptions::new("DRIVES"),
        )
        .unwrap();

        assert_eq!(reg.len(), 2);
        let names: Vec<&str> = reg.all().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["vehicles", "boss"]);
        let vehicles = reg.lookup("vehicles").unwrap();
        assert_eq!(vehicles.relationship_type, "DRIVES");
        assert_eq!(vehicles.direction, Direction::Both);
    }

    #[test]
    fn inherit_is_a_snapshot() {
        let mut parent = person();
        parent
            .declare(
                AssociationKind::ToMany,
                Direction::Outgoing,
                "vehicles",
                AssociationOptions::new("OWNS"),
            )
            .unwrap();

        let mut child = AssociationRegistry::inherit(&parent, "Employee");
        parent
            .declare(
                AssociationKind::ToOne,
                Direction::Outgoing,
                "home",
                AssociationOptions::new("LIVES_IN"),
            )
            .unwrap();
        child
            .declare(
                AssociationKind::ToOne,
                Direction::Incoming,
                "manager",
                AssociationOptions::new("MANAGES"),
            )
            .unwrap();

        assert_eq!(child.owner(), "Employee");
        assert!(child.exists("vehicles"));
        assert!(!child.exists("home"));
        assert!(!parent.exists("manager"));
        // Inherited descriptors keep their declaring type.
        assert_eq!(child.lookup("vehicles").unwrap().owner, "Person");
        assert_eq!(child.lookup("manager").unwrap().owner, "Employee");
    }

    #[test]
    fn parent_redeclaration_does_not_reach_inherited_copy() {
        let mut parent = person();
        parent
            .declare(
                AssociationKind::ToMany,
                Direction::Outgoing,
                "vehicles",
                AssociationOptions::new("OWNS"),
            )
            .unwrap();
        let child = AssociationRegistry::inherit(&parent, "Employee");

        parent
            .declare(
                AssociationKind::ToOne,
                Direction::Incoming,
                "vehicles",
                AssociationOptions::new("LEASED_TO"),
            )
            .unwrap();

        let redeclared = parent.lookup("vehicles").unwrap();
        assert_eq!(redeclared.kind, AssociationKind::ToOne);
        assert_eq!(redeclared.relationship_type, "LEASED_TO");

        let inherited = child.lookup("vehicles").unwrap();
        assert_eq!(inherited.kind, AssociationKind::ToMany);
        assert_eq!(inherited.relationship_type, "OWNS");
        assert_eq!(inherited.direction, Direction::Outgoing);
    }

    #[test]
    fn rejects_reserved_and_invalid_names() {
        let mut reg = person();
        let err = reg
            .declare(
                AssociationKind::ToOne,
                Direction::Outgoing,
                "save",
                AssociationOptions::new("OWNS"),
            )
            .unwrap_err();
        assert_eq!(err.association_kind(), Some(AssociationErrorKind::ReservedName));

        let err = reg
            .declare(
                AssociationKind::ToOne,
                Direction::Outgoing,
                "car",
                AssociationOptions::new("OWNS A"),
            )
            .unwrap_err();
        assert_eq!(err.association_kind(), Some(AssociationErrorKind::InvalidName));
        assert!(reg.is_empty());
    }

    #[test]
    fn exact_target_requires_one_class() {
        let mut reg = person();
        let err = reg
            .declare(
                AssociationKind::ToOne,
                Direction::Outgoing,
                "ride",
                AssociationOptions::new("RIDES")
                    .to_any(["Car", "Bike"])
                    .exact_target(),
            )
            .unwrap_err();
        assert!(err.is_ambiguous_target());

        let err = reg
            .declare(
                AssociationKind::ToOne,
                Direction::Outgoing,
                "ride",
                AssociationOptions::new("RIDES").exact_target(),
            )
            .unwrap_err();
        assert!(err.is_ambiguous_target());

        let desc = reg
            .declare(
                AssociationKind::ToOne,
                Direction::Outgoing,
                "ride",
                AssociationOptions::new("RIDES").to_any(["Car"]).exact_target(),
            )
            .unwrap();
        assert_eq!(desc.single_target().unwrap(), "Car");
    }

    #[test]
    fn single_target_on_polymorphic_descriptor() {
        let desc = AssociationDescriptor::build(
            "Person",
            AssociationKind::ToMany,
            Direction::Outgoing,
            "rides",
            AssociationOptions::new("RIDES").to_any(["Car", "Bike"]),
        )
        .unwrap();
        assert!(desc.target.is_polymorphic());
        assert_eq!(desc.target.candidates().len(), 2);
        assert!(desc.single_target().unwrap_err().is_ambiguous_target());
    }

    #[test]
    fn cascading_filter() {
        let mut reg = person();
        reg.declare(
            AssociationKind::ToMany,
            Direction::Outgoing,
            "vehicles",
            AssociationOptions::new("OWNS").cascade(CascadePolicy::DestroyOrphans),
        )
        .unwrap();
        reg.declare(
            AssociationKind::ToMany,
            Direction::Outgoing,
            "friends",
            AssociationOptions::new("KNOWS"),
        )
        .unwrap();
        let names: Vec<&str> = reg.cascading().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["vehicles"]);
    }
}
