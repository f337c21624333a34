//! GraphModel Rust - declared associations between graph node types.
//!
//! GraphModel Rust provides:
//!
//! - Association declarations with direction, cardinality and polymorphic targets
//! - Subtypes that inherit a snapshot of their parent's associations
//! - Lazy, composable traversals realized into parameterized queries
//! - Per-instance caching of association reads, bypassed inside transactions
//!
//! # Quick Start
//!
//! ```ignore
//! use graphmodel::prelude::*;
//!
//! let mut schema = Schema::new();
//! schema.define_type("Person")?;
//! schema.define_type("Vehicle")?;
//! schema.define_subtype("Car", "Vehicle")?;
//! schema.declare(
//!     "Person",
//!     AssociationKind::ToMany,
//!     Direction::Outgoing,
//!     "vehicles",
//!     AssociationOptions::new("OWNS").to("Vehicle"),
//! )?;
//!
//! let session = Session::new(engine, schema);
//! let mut alice = Instance::new(Node::persisted("Person", 1));
//!
//! session.write(&mut alice, "vehicles", vec![Node::persisted("Car", 2)])?;
//! let recent = session
//!     .read_with(&mut alice, "vehicles", HopOptions::new().filter(Filter::gte("year", 2020)))?;
//! ```
//!
//! The query engine is supplied by the host through the [`QueryEngine`] trait.

pub use graphmodel_core::{
    AssociationDescriptor, AssociationError, AssociationErrorKind, AssociationKind,
    AssociationOptions, AssociationRegistry, CascadePolicy, Direction, Error, LabelResolver,
    Node, NodeId, NonPersistedError, QueryEngine, QueryError, QueryErrorKind, RawNode,
    RealizedQuery, RelationshipId, Result, TargetClassSpec, TargetResolution, TargetResolver,
    TransactionError, TransactionErrorKind, TransactionOracle, TransactionState, Value,
};
pub use graphmodel_query::{
    AssociationCache, CacheStats, CachedResult, Comparison, Filter, Fingerprint, HopOptions,
    OrderBy, OrderDirection, ProxyRoot, QueryProxy, ReplaceSummary, ReturnShape, fingerprint,
};
pub use graphmodel_session::{
    Assignment, Association, Collection, Instance, NodeType, Schema, Session, SessionConfig,
};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        // Declarations
        AssociationKind,
        AssociationOptions,
        CascadePolicy,
        Direction,
        // Errors
        Error,
        // Traversal
        Filter,
        HopOptions,
        // Session
        Instance,
        Node,
        OrderBy,
        QueryEngine,
        QueryProxy,
        RawNode,
        RealizedQuery,
        Result,
        Schema,
        Session,
        SessionConfig,
        Value,
    };
}
