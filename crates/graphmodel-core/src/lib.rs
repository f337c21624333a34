//! Core types and traits for GraphModel Rust.
//!
//! This crate provides the foundational abstractions for graph associations:
//!
//! - `AssociationDescriptor` / `AssociationRegistry` for declared relationships
//! - `Node` / `RawNode` for typed and untyped graph entities
//! - `QueryEngine` and `TargetResolver` collaborator traits
//! - `TransactionOracle` for transaction-aware caching
//! - `Error` / `Result` shared by every GraphModel crate

pub mod association;
pub mod engine;
pub mod error;
pub mod node;
pub mod transaction;
pub mod validate;
pub mod value;

pub use association::{
    AssociationDescriptor, AssociationKind, AssociationOptions, AssociationRegistry,
    CascadePolicy, Direction, TargetClassSpec, TargetResolution,
};
pub use engine::{LabelResolver, QueryEngine, RealizedQuery, TargetResolver, unresolved_target};
pub use error::{
    AssociationError, AssociationErrorKind, Error, NonPersistedError, QueryError,
    QueryErrorKind, Result, TransactionError, TransactionErrorKind,
};
pub use node::{Node, NodeId, RawNode, RelationshipId};
pub use transaction::{TransactionOracle, TransactionState};
pub use value::Value;
