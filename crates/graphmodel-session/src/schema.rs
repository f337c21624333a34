//! Node type hierarchy and association declarations.
//!
//! A [`Schema`] owns every [`NodeType`] together with its association
//! registry and accessor table. Subtypes receive a snapshot of their parent's
//! registry when they are defined; declarations made on the parent later do
//! not reach them.
//!
//! The schema is also the default [`TargetResolver`]: a result row is mapped
//! to the most specific registered type among its labels that the traversal
//! accepts.

use crate::SessionConfig;
use crate::accessor::Accessors;
use graphmodel_core::{
    AssociationDescriptor, AssociationError, AssociationErrorKind, AssociationKind,
    AssociationOptions, AssociationRegistry, Direction, Error, Node, RawNode, Result,
    TargetClassSpec, TargetResolver, unresolved_target, validate::is_identifier,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Accessor names every node type reserves.
pub const RESERVED_NAMES: &[&str] = &[
    "id",
    "node_type",
    "properties",
    "labels",
    "save",
    "delete",
    "refresh",
];

/// A registered node type.
#[derive(Debug, Clone)]
pub struct NodeType {
    name: String,
    parent: Option<String>,
    registry: AssociationRegistry,
    accessors: BTreeMap<String, Accessors>,
}

impl NodeType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn registry(&self) -> &AssociationRegistry {
        &self.registry
    }

    /// Descriptor and dispatch entry for `name`, or `Undeclared`.
    pub fn accessor(&self, name: &str) -> Result<(&Arc<AssociationDescriptor>, Accessors)> {
        let descriptor = self.registry.require(name)?;
        let accessors = self
            .accessors
            .get(name)
            .copied()
            .ok_or_else(|| Error::undeclared(self.name.clone(), name))?;
        Ok((descriptor, accessors))
    }

    /// Associations a cascade executor has to visit when this type is deleted.
    pub fn cascading_associations(&self) -> impl Iterator<Item = &Arc<AssociationDescriptor>> {
        self.registry.cascading()
    }
}

/// The set of node types known to a session.
#[derive(Debug, Clone)]
pub struct Schema {
    types: BTreeMap<String, NodeType>,
    reserved: Vec<String>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&SessionConfig::default())
    }

    /// Empty schema reserving the built-in names plus `config.reserved_names`.
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        let mut reserved: Vec<String> = RESERVED_NAMES.iter().map(ToString::to_string).collect();
        reserved.extend(config.reserved_names.iter().cloned());
        Self {
            types: BTreeMap::new(),
            reserved,
        }
    }

    /// Register a root node type.
    pub fn define_type(&mut self, name: &str) -> Result<&NodeType> {
        check_type_name(name)?;
        let registry = AssociationRegistry::new(name).with_reserved(self.reserved.iter().cloned());
        Ok(self.insert(NodeType {
            name: name.to_string(),
            parent: None,
            registry,
            accessors: BTreeMap::new(),
        }))
    }

    /// Register a subtype, snapshotting the parent's associations.
    ///
    /// Fails with `CyclicHierarchy` if `name` is `parent` or one of its
    /// ancestors.
    pub fn define_subtype(&mut self, name: &str, parent: &str) -> Result<&NodeType> {
        check_type_name(name)?;
        let parent_type = self.node_type(parent)?;
        if self.lineage(parent).contains(&name) {
            return Err(Error::Association(AssociationError {
                kind: AssociationErrorKind::CyclicHierarchy,
                node_type: name.to_string(),
                association: None,
                message: format!("'{name}' cannot be a subtype of its own descendant '{parent}'"),
            }));
        }
        let node_type = NodeType {
            name: name.to_string(),
            parent: Some(parent.to_string()),
            registry: AssociationRegistry::inherit(&parent_type.registry, name),
            accessors: parent_type.accessors.clone(),
        };
        tracing::debug!(
            node_type = name,
            parent,
            inherited = node_type.registry.len(),
            "Defined subtype"
        );
        Ok(self.insert(node_type))
    }

    fn insert(&mut self, node_type: NodeType) -> &NodeType {
        let name = node_type.name.clone();
        if self.types.contains_key(&name) {
            tracing::warn!(node_type = %name, "Redefining node type");
        }
        self.types.insert(name.clone(), node_type);
        &self.types[&name]
    }

    /// Declare an association on `node_type` and install its accessors.
    #[tracing::instrument(level = "debug", skip(self, options))]
    pub fn declare(
        &mut self,
        node_type: &str,
        kind: AssociationKind,
        direction: Direction,
        name: &str,
        options: AssociationOptions,
    ) -> Result<Arc<AssociationDescriptor>> {
        let entry = self
            .types
            .get_mut(node_type)
            .ok_or_else(|| Error::unknown_node_type(node_type))?;
        let descriptor = entry.registry.declare(kind, direction, name, options)?;
        entry
            .accessors
            .insert(name.to_string(), Accessors::for_kind(kind));
        Ok(descriptor)
    }

    pub fn get(&self, name: &str) -> Option<&NodeType> {
        self.types.get(name)
    }

    /// Look up a type, failing with `UnknownNodeType`.
    pub fn node_type(&self, name: &str) -> Result<&NodeType> {
        self.types
            .get(name)
            .ok_or_else(|| Error::unknown_node_type(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// `name` followed by its ancestors, nearest first.
    pub fn lineage(&self, name: &str) -> Vec<&str> {
        let mut lineage = Vec::new();
        let mut current = self.types.get(name);
        while let Some(node_type) = current {
            // Each type appears once; stop rather than walk a parent loop.
            if lineage.contains(&node_type.name.as_str()) {
                tracing::warn!(node_type = name, "Cycle in type hierarchy");
                break;
            }
            lineage.push(node_type.name.as_str());
            current = node_type.parent.as_deref().and_then(|p| self.types.get(p));
        }
        lineage
    }

    /// Labels a stored node of type `name` carries, root type first.
    pub fn labels(&self, name: &str) -> Vec<String> {
        self.lineage(name).into_iter().rev().map(ToString::to_string).collect()
    }

    /// Whether `name` is `ancestor` or one of its subtypes.
    ///
    /// An unregistered `name` only matches itself.
    pub fn is_a(&self, name: &str, ancestor: &str) -> bool {
        name == ancestor || self.lineage(name).contains(&ancestor)
    }

    fn accepts(&self, target: &TargetClassSpec, label: &str) -> bool {
        match target {
            TargetClassSpec::Single(name) => self.is_a(label, name),
            TargetClassSpec::Multi(names) => names.iter().any(|n| self.is_a(label, n)),
            TargetClassSpec::Unresolved => true,
        }
    }
}

impl TargetResolver for Schema {
    fn resolve(&self, target: &TargetClassSpec, raw: RawNode) -> Result<Node> {
        let best = raw
            .labels
            .iter()
            .filter(|label| self.contains(label) && self.accepts(target, label))
            .max_by_key(|label| self.lineage(label).len())
            .cloned();

        match (best, target) {
            (Some(node_type), _) => Ok(raw.into_node(node_type)),
            (None, TargetClassSpec::Single(name)) => {
                tracing::trace!(
                    node_type = %name,
                    id = raw.id,
                    "No registered label, using declared target"
                );
                Ok(raw.into_node(name.clone()))
            }
            (None, _) => Err(unresolved_target(target, &raw)),
        }
    }
}

fn check_type_name(name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(Error::Association(AssociationError {
            kind: AssociationErrorKind::InvalidName,
            node_type: name.to_string(),
            association: None,
            message: format!("invalid node type name '{name}'"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmodel_core::CascadePolicy;

    fn vehicles_schema() -> Schema {
        let mut schema = Schema::new();
        schema.define_type("Person").unwrap();
        schema.define_type("Vehicle").unwrap();
        schema.define_subtype("Car", "Vehicle").unwrap();
        schema.define_subtype("SportsCar", "Car").unwrap();
        schema.define_subtype("Bike", "Vehicle").unwrap();
        schema
    }

    #[test]
    fn subtype_gets_snapshot_of_parent() {
        let mut schema = Schema::new();
        schema.define_type("Person").unwrap();
        schema
            .declare(
                "Person",
                AssociationKind::ToMany,
                Direction::Outgoing,
                "vehicles",
                AssociationOptions::new("OWNS").to("Vehicle"),
            )
            .unwrap();
        schema.define_subtype("Employee", "Person").unwrap();
        schema
            .declare(
                "Person",
                AssociationKind::ToOne,
                Direction::Outgoing,
                "primary_vehicle",
                AssociationOptions::new("DRIVES").to("Vehicle"),
            )
            .unwrap();

        let employee = schema.node_type("Employee").unwrap();
        assert!(employee.registry().exists("vehicles"));
        assert!(!employee.registry().exists("primary_vehicle"));
        assert!(employee.accessor("vehicles").is_ok());
        assert!(employee.accessor("primary_vehicle").unwrap_err().is_undeclared());
        assert!(schema.node_type("Person").unwrap().accessor("primary_vehicle").is_ok());
    }

    #[test]
    fn parent_redeclaration_leaves_subtype_untouched() {
        let mut schema = Schema::new();
        schema.define_type("Person").unwrap();
        schema
            .declare(
                "Person",
                AssociationKind::ToMany,
                Direction::Outgoing,
                "vehicles",
                AssociationOptions::new("OWNS").to("Vehicle"),
            )
            .unwrap();
        schema.define_subtype("Employee", "Person").unwrap();
        schema
            .declare(
                "Person",
                AssociationKind::ToOne,
                Direction::Incoming,
                "vehicles",
                AssociationOptions::new("LEASED_TO").to("Vehicle"),
            )
            .unwrap();

        let (person, person_accessors) =
            schema.node_type("Person").unwrap().accessor("vehicles").unwrap();
        assert_eq!(person.kind, AssociationKind::ToOne);
        assert_eq!(person.relationship_type, "LEASED_TO");
        assert_eq!(person.direction, Direction::Incoming);

        let (employee, employee_accessors) =
            schema.node_type("Employee").unwrap().accessor("vehicles").unwrap();
        assert_eq!(employee.kind, AssociationKind::ToMany);
        assert_eq!(employee.relationship_type, "OWNS");
        assert_eq!(employee.direction, Direction::Outgoing);

        assert_eq!(employee_accessors.kind, AssociationKind::ToMany);
        assert_eq!(person_accessors.kind, AssociationKind::ToOne);
    }

    #[test]
    fn subtype_cycles_are_rejected() {
        let mut schema = vehicles_schema();

        let own_parent = schema.define_subtype("Vehicle", "Vehicle").unwrap_err();
        assert_eq!(
            own_parent.association_kind(),
            Some(AssociationErrorKind::CyclicHierarchy)
        );

        let under_descendant = schema.define_subtype("Vehicle", "SportsCar").unwrap_err();
        assert_eq!(
            under_descendant.association_kind(),
            Some(AssociationErrorKind::CyclicHierarchy)
        );

        // The hierarchy is unchanged and still terminates.
        assert_eq!(schema.lineage("SportsCar"), ["SportsCar", "Car", "Vehicle"]);
        assert_eq!(schema.get("Vehicle").unwrap().parent(), None);
        assert!(!schema.is_a("Vehicle", "SportsCar"));

        // Re-parenting onto an unrelated type is still allowed.
        schema.define_subtype("Bike", "Car").unwrap();
        assert_eq!(schema.lineage("Bike"), ["Bike", "Car", "Vehicle"]);
    }

    #[test]
    fn declare_errors() {
        let mut schema = Schema::from_config(&SessionConfig::default().reserve("owner_name"));
        schema.define_type("Person").unwrap();

        let unknown = schema
            .declare(
                "Ghost",
                AssociationKind::ToMany,
                Direction::Outgoing,
                "x",
                AssociationOptions::new("R"),
            )
            .unwrap_err();
        assert_eq!(unknown.association_kind(), Some(AssociationErrorKind::UnknownNodeType));

        let reserved = schema
            .declare(
                "Person",
                AssociationKind::ToOne,
                Direction::Outgoing,
                "owner_name",
                AssociationOptions::new("R"),
            )
            .unwrap_err();
        assert_eq!(reserved.association_kind(), Some(AssociationErrorKind::ReservedName));

        let builtin = schema
            .declare(
                "Person",
                AssociationKind::ToOne,
                Direction::Outgoing,
                "id",
                AssociationOptions::new("R"),
            )
            .unwrap_err();
        assert_eq!(builtin.association_kind(), Some(AssociationErrorKind::ReservedName));

        let ambiguous = schema
            .declare(
                "Person",
                AssociationKind::ToOne,
                Direction::Outgoing,
                "ride",
                AssociationOptions::new("RIDES").to_any(["Car", "Bike"]).exact_target(),
            )
            .unwrap_err();
        assert!(ambiguous.is_ambiguous_target());
        assert!(!schema.node_type("Person").unwrap().registry().exists("ride"));

        assert!(schema.define_type("not a name").is_err());
        assert!(schema.define_subtype("Child", "Missing").is_err());
    }

    #[test]
    fn lineage_and_labels() {
        let schema = vehicles_schema();
        assert_eq!(schema.lineage("SportsCar"), ["SportsCar", "Car", "Vehicle"]);
        assert_eq!(schema.labels("Car"), ["Vehicle", "Car"]);
        assert!(schema.is_a("SportsCar", "Vehicle"));
        assert!(!schema.is_a("Bike", "Car"));
        assert!(schema.is_a("Unregistered", "Unregistered"));
    }

    #[test]
    fn resolver_picks_most_specific_label() {
        let schema = vehicles_schema();
        let raw = RawNode::new(5, ["Vehicle", "Car", "SportsCar"]);

        let single = TargetClassSpec::Single("Vehicle".into());
        assert_eq!(schema.resolve(&single, raw.clone()).unwrap().node_type, "SportsCar");

        let unresolved = schema.resolve(&TargetClassSpec::Unresolved, raw.clone()).unwrap();
        assert_eq!(unresolved.node_type, "SportsCar");
        assert_eq!(unresolved.id, Some(5));

        let bikes = TargetClassSpec::Multi(vec!["Bike".into()]);
        let err = schema.resolve(&bikes, raw).unwrap_err();
        assert_eq!(err.association_kind(), Some(AssociationErrorKind::UnresolvedTarget));

        // A row without registered labels falls back to the declared single type.
        let bare = schema
            .resolve(&single, RawNode::new(6, ["Legacy"]))
            .unwrap();
        assert_eq!(bare.node_type, "Vehicle");
    }

    #[test]
    fn cascading_associations() {
        let mut schema = vehicles_schema();
        schema
            .declare(
                "Person",
                AssociationKind::ToMany,
                Direction::Outgoing,
                "vehicles",
                AssociationOptions::new("OWNS").to("Vehicle").cascade(CascadePolicy::DeleteOrphans),
            )
            .unwrap();
        schema
            .declare(
                "Person",
                AssociationKind::ToMany,
                Direction::Both,
                "friends",
                AssociationOptions::new("KNOWS").to("Person"),
            )
            .unwrap();

        let names: Vec<&str> = schema
            .node_type("Person")
            .unwrap()
            .cascading_associations()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, ["vehicles"]);
    }
}
