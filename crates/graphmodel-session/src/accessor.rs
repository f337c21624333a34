//! Per-association accessor dispatch.
//!
//! Declaring an association installs an [`Accessors`] entry next to its
//! descriptor. The entry holds plain function values chosen by cardinality,
//! and the session invokes them through its name-keyed entry points.

use crate::collection::{Association, Assignment, Collection};
use crate::instance::Instance;
use crate::schema::Schema;
use crate::SessionConfig;
use graphmodel_core::{
    AssociationDescriptor, AssociationError, AssociationErrorKind, AssociationKind, Error, Node,
    QueryEngine, Result, TargetClassSpec, TransactionOracle,
};
use graphmodel_query::{CachedResult, HopOptions, QueryProxy, ReplaceSummary, fingerprint};
use std::sync::Arc;

/// Collaborators handed to every accessor call.
pub struct AccessContext<'a> {
    pub engine: &'a dyn QueryEngine,
    pub schema: &'a Schema,
    pub tx: &'a dyn TransactionOracle,
    pub config: &'a SessionConfig,
}

/// Instance read.
pub type ReadFn = fn(
    &AccessContext<'_>,
    &mut Instance,
    &Arc<AssociationDescriptor>,
    HopOptions,
) -> Result<Association>;

/// Instance write.
pub type WriteFn = fn(
    &AccessContext<'_>,
    &mut Instance,
    &Arc<AssociationDescriptor>,
    Assignment,
) -> Result<ReplaceSummary>;

/// Type-level read.
pub type ClassReadFn = fn(&str, &Arc<AssociationDescriptor>, HopOptions) -> QueryProxy;

/// Dispatch entry for one declared association.
#[derive(Debug, Clone, Copy)]
pub struct Accessors {
    /// Cardinality the functions were chosen for.
    pub kind: AssociationKind,
    pub read: ReadFn,
    pub write: WriteFn,
    pub class_read: ClassReadFn,
}

impl Accessors {
    pub fn for_kind(kind: AssociationKind) -> Self {
        match kind {
            AssociationKind::ToMany => Self {
                kind,
                read: read_many,
                write: write_many,
                class_read,
            },
            AssociationKind::ToOne => Self {
                kind,
                read: read_one,
                write: write_one,
                class_read,
            },
        }
    }
}

fn read_many(
    ctx: &AccessContext<'_>,
    instance: &mut Instance,
    descriptor: &Arc<AssociationDescriptor>,
    options: HopOptions,
) -> Result<Association> {
    let Some(root) = QueryProxy::root_for_instance(instance.node()) else {
        return Ok(Association::Many(Collection::Empty));
    };
    let proxy = root.extend(Arc::clone(descriptor), options);
    if !ctx.config.cache_to_many {
        return Ok(Association::Many(Collection::Pending(proxy)));
    }

    let fp = fingerprint(&proxy.realize());
    let nodes = instance
        .cache_mut()
        .fetch(ctx.tx, &descriptor.name, &fp, || {
            proxy.all(ctx.engine, ctx.schema).map(CachedResult::Many)
        })?
        .into_many();
    Ok(Association::Many(Collection::Loaded(nodes)))
}

fn read_one(
    ctx: &AccessContext<'_>,
    instance: &mut Instance,
    descriptor: &Arc<AssociationDescriptor>,
    options: HopOptions,
) -> Result<Association> {
    let Some(root) = QueryProxy::root_for_instance(instance.node()) else {
        return Ok(Association::One(None));
    };
    let proxy = root.extend(Arc::clone(descriptor), options).limit(1);
    let compute = || {
        proxy
            .all(ctx.engine, ctx.schema)
            .map(|nodes| CachedResult::One(nodes.into_iter().next()))
    };
    if !ctx.config.cache_to_one {
        return compute().map(|r| Association::One(r.into_one()));
    }

    let fp = fingerprint(&proxy.realize());
    let node = instance
        .cache_mut()
        .fetch(ctx.tx, &descriptor.name, &fp, compute)?
        .into_one();
    Ok(Association::One(node))
}

fn write_many(
    ctx: &AccessContext<'_>,
    instance: &mut Instance,
    descriptor: &Arc<AssociationDescriptor>,
    assignment: Assignment,
) -> Result<ReplaceSummary> {
    replace(ctx, instance, descriptor, assignment.into_targets())
}

fn write_one(
    ctx: &AccessContext<'_>,
    instance: &mut Instance,
    descriptor: &Arc<AssociationDescriptor>,
    assignment: Assignment,
) -> Result<ReplaceSummary> {
    let targets = assignment.into_targets();
    if targets.len() > 1 {
        return Err(invalid_target(
            descriptor,
            format!(
                "{}.{} is to-one but was given {} nodes",
                descriptor.owner,
                descriptor.name,
                targets.len()
            ),
        ));
    }
    replace(ctx, instance, descriptor, targets)
}

fn class_read(
    node_type: &str,
    descriptor: &Arc<AssociationDescriptor>,
    options: HopOptions,
) -> QueryProxy {
    QueryProxy::root_for_type(node_type).extend(Arc::clone(descriptor), options)
}

fn replace(
    ctx: &AccessContext<'_>,
    instance: &mut Instance,
    descriptor: &Arc<AssociationDescriptor>,
    targets: Vec<Node>,
) -> Result<ReplaceSummary> {
    let proxy = anchored(instance, descriptor, "assign")?;
    for target in &targets {
        check_target(ctx.schema, descriptor, target)?;
    }
    instance.cache_mut().clear();
    proxy.replace_with(ctx.engine, &targets)
}

/// Single-hop proxy from a saved instance, or `NonPersisted`.
pub(crate) fn anchored(
    instance: &Instance,
    descriptor: &Arc<AssociationDescriptor>,
    operation: &'static str,
) -> Result<QueryProxy> {
    QueryProxy::root_for_instance(instance.node())
        .map(|root| root.extend(Arc::clone(descriptor), HopOptions::default()))
        .ok_or_else(|| {
            Error::non_persisted(
                instance.node_type().to_string(),
                descriptor.name.clone(),
                operation,
            )
        })
}

/// Reject nodes whose type the association does not accept.
pub(crate) fn check_target(
    schema: &Schema,
    descriptor: &AssociationDescriptor,
    target: &Node,
) -> Result<()> {
    let accepted = match &descriptor.target {
        TargetClassSpec::Single(name) => schema.is_a(&target.node_type, name),
        TargetClassSpec::Multi(names) => names.iter().any(|n| schema.is_a(&target.node_type, n)),
        TargetClassSpec::Unresolved => true,
    };
    if accepted {
        Ok(())
    } else {
        Err(invalid_target(
            descriptor,
            format!(
                "{}.{} does not accept a {}",
                descriptor.owner, descriptor.name, target.node_type
            ),
        ))
    }
}

fn invalid_target(descriptor: &AssociationDescriptor, message: String) -> Error {
    Error::Association(AssociationError {
        kind: AssociationErrorKind::InvalidTarget,
        node_type: descriptor.owner.clone(),
        association: Some(descriptor.name.clone()),
        message,
    })
}
