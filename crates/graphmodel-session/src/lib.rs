//! Schema and session layer for GraphModel Rust.
//!
//! `graphmodel-session` is where declared associations become callable. A
//! [`Schema`] holds node types, their association registries and accessor
//! tables; a [`Session`] binds a schema to a [`QueryEngine`] and dispatches
//! reads and writes by association name.
//!
//! # Role In The Architecture
//!
//! - **Schema**: type hierarchy, snapshot inheritance, row-to-type resolution.
//! - **Accessor dispatch**: one read/write/class-read entry per declared name.
//! - **Instances**: a node plus its per-instance association cache.
//! - **Transactions**: the session tracks whether a transaction is open and
//!   is the oracle every cache access consults.
//!
//! # Example
//!
//! ```ignore
//! let mut schema = Schema::new();
//! schema.define_type("Person")?;
//! schema.define_type("Vehicle")?;
//! schema.declare(
//!     "Person",
//!     AssociationKind::ToOne,
//!     Direction::Outgoing,
//!     "primary_vehicle",
//!     AssociationOptions::new("DRIVES").to("Vehicle"),
//! )?;
//!
//! let session = Session::new(engine, schema);
//! let mut alice = Instance::new(Node::persisted("Person", 1));
//!
//! // Second read is served from alice's cache.
//! let car = session.read_one(&mut alice, "primary_vehicle")?;
//! let again = session.read_one(&mut alice, "primary_vehicle")?;
//! ```

pub mod accessor;
pub mod collection;
pub mod instance;
pub mod schema;

pub use accessor::{AccessContext, Accessors, ClassReadFn, ReadFn, WriteFn};
pub use collection::{Assignment, Association, Collection};
pub use instance::Instance;
pub use schema::{NodeType, RESERVED_NAMES, Schema};

use graphmodel_core::{
    AssociationDescriptor, Node, QueryEngine, Result, TransactionError, TransactionErrorKind,
    TransactionOracle, TransactionState,
};
use graphmodel_query::{HopOptions, QueryProxy, ReplaceSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Session Configuration
// ============================================================================

/// Configuration for Session behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cache to-one reads on the instance (outside transactions).
    pub cache_to_one: bool,
    /// Materialize and cache to-many reads instead of returning a lazy traversal.
    pub cache_to_many: bool,
    /// Extra names no association may use, on top of [`RESERVED_NAMES`].
    pub reserved_names: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_to_one: true,
            cache_to_many: false,
            reserved_names: Vec::new(),
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration document. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the `cache_to_one` option (builder pattern).
    #[must_use]
    pub fn cache_to_one(mut self, value: bool) -> Self {
        self.cache_to_one = value;
        self
    }

    /// Set the `cache_to_many` option (builder pattern).
    #[must_use]
    pub fn cache_to_many(mut self, value: bool) -> Self {
        self.cache_to_many = value;
        self
    }

    /// Reserve an additional accessor name.
    #[must_use]
    pub fn reserve(mut self, name: impl Into<String>) -> Self {
        self.reserved_names.push(name.into());
        self
    }
}

// ============================================================================
// Session
// ============================================================================

/// Binds a schema to a query engine and dispatches association access.
///
/// A session serves one unit of work; it is not meant to be shared across
/// threads.
#[derive(Debug)]
pub struct Session<E: QueryEngine> {
    engine: E,
    schema: Schema,
    transaction: TransactionState,
    config: SessionConfig,
}

impl<E: QueryEngine> Session<E> {
    pub fn new(engine: E, schema: Schema) -> Self {
        Self::with_config(engine, schema, SessionConfig::default())
    }

    pub fn with_config(engine: E, schema: Schema, config: SessionConfig) -> Self {
        Self {
            engine,
            schema,
            transaction: TransactionState::new(),
            config,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn context(&self) -> AccessContext<'_> {
        AccessContext {
            engine: &self.engine,
            schema: &self.schema,
            tx: &self.transaction,
            config: &self.config,
        }
    }

    // ========================================================================
    // Accessor entry points
    // ========================================================================

    /// Read association `name` of `instance`.
    pub fn read(&self, instance: &mut Instance, name: &str) -> Result<Association> {
        self.read_with(instance, name, HopOptions::default())
    }

    /// Read association `name` with extra filtering or paging on the hop.
    ///
    /// To-one reads with different options are cached separately.
    #[tracing::instrument(
        level = "debug",
        skip(self, instance, options),
        fields(node_type = instance.node_type())
    )]
    pub fn read_with(
        &self,
        instance: &mut Instance,
        name: &str,
        options: HopOptions,
    ) -> Result<Association> {
        let (descriptor, accessors) = self.schema.node_type(instance.node_type())?.accessor(name)?;
        (accessors.read)(&self.context(), instance, descriptor, options)
    }

    /// Write association `name` of `instance`, replacing its related nodes.
    #[tracing::instrument(
        level = "debug",
        skip(self, instance, assignment),
        fields(node_type = instance.node_type())
    )]
    pub fn write(
        &self,
        instance: &mut Instance,
        name: &str,
        assignment: impl Into<Assignment>,
    ) -> Result<ReplaceSummary> {
        let (descriptor, accessors) = self.schema.node_type(instance.node_type())?.accessor(name)?;
        (accessors.write)(&self.context(), instance, descriptor, assignment.into())
    }

    /// Traverse association `name` from every node of `node_type`.
    pub fn class_read(&self, node_type: &str, name: &str) -> Result<QueryProxy> {
        self.class_read_with(node_type, name, HopOptions::default())
    }

    pub fn class_read_with(
        &self,
        node_type: &str,
        name: &str,
        options: HopOptions,
    ) -> Result<QueryProxy> {
        let (descriptor, accessors) = self.schema.node_type(node_type)?.accessor(name)?;
        Ok((accessors.class_read)(node_type, descriptor, options))
    }

    // ========================================================================
    // Convenience reads
    // ========================================================================

    /// Read a single related node. For to-many associations, the first one.
    pub fn read_one(&self, instance: &mut Instance, name: &str) -> Result<Option<Node>> {
        match self.read(instance, name)? {
            Association::One(node) => Ok(node),
            Association::Many(collection) => collection.first(&self.engine, &self.schema),
        }
    }

    /// Read every related node.
    pub fn read_many(&self, instance: &mut Instance, name: &str) -> Result<Vec<Node>> {
        match self.read(instance, name)? {
            Association::One(node) => Ok(node.into_iter().collect()),
            Association::Many(collection) => collection.all(&self.engine, &self.schema),
        }
    }

    // ========================================================================
    // Single relationship changes
    // ========================================================================

    /// Relate `target` through `name` without touching other relationships.
    pub fn connect(&self, instance: &mut Instance, name: &str, target: &Node) -> Result<bool> {
        let descriptor = self.descriptor(instance, name)?;
        let proxy = accessor::anchored(instance, &descriptor, "connect")?;
        accessor::check_target(&self.schema, &descriptor, target)?;
        instance.cache_mut().clear();
        let created = proxy.connect(&self.engine, target)?;
        tracing::debug!(association = name, created, "Connected node");
        Ok(created)
    }

    /// Remove the relationship to `target` through `name`.
    pub fn disconnect(&self, instance: &mut Instance, name: &str, target: &Node) -> Result<u64> {
        let descriptor = self.descriptor(instance, name)?;
        let proxy = accessor::anchored(instance, &descriptor, "disconnect")?;
        instance.cache_mut().clear();
        let removed = proxy.disconnect(&self.engine, target)?;
        tracing::debug!(association = name, removed, "Disconnected node");
        Ok(removed)
    }

    /// Whether `target` is related through `name`. Never cached.
    pub fn is_connected(&self, instance: &Instance, name: &str, target: &Node) -> Result<bool> {
        let descriptor = self.descriptor(instance, name)?;
        match QueryProxy::root_for_instance(instance.node()) {
            Some(root) => root
                .extend(descriptor, HopOptions::default())
                .is_connected(&self.engine, target),
            None => Ok(false),
        }
    }

    fn descriptor(&self, instance: &Instance, name: &str) -> Result<Arc<AssociationDescriptor>> {
        let (descriptor, _) = self.schema.node_type(instance.node_type())?.accessor(name)?;
        Ok(Arc::clone(descriptor))
    }

    // ========================================================================
    // Transaction Management
    // ========================================================================

    /// Begin a transaction. Association caches are bypassed until it ends.
    pub fn begin(&self) -> Result<()> {
        self.transaction.begin()?;
        if let Err(e) = self.engine.begin() {
            self.transaction.finish()?;
            return Err(e);
        }
        tracing::debug!("Transaction started");
        Ok(())
    }

    /// Commit the open transaction.
    pub fn commit(&self) -> Result<()> {
        self.require_transaction()?;
        self.engine.commit()?;
        self.transaction.finish()?;
        tracing::debug!("Transaction committed");
        Ok(())
    }

    /// Roll back the open transaction.
    pub fn rollback(&self) -> Result<()> {
        self.require_transaction()?;
        let result = self.engine.rollback();
        self.transaction.finish()?;
        tracing::debug!(ok = result.is_ok(), "Transaction rolled back");
        result
    }

    fn require_transaction(&self) -> Result<()> {
        if self.transaction.is_transaction_active() {
            Ok(())
        } else {
            Err(TransactionError {
                kind: TransactionErrorKind::NotActive,
                message: "no transaction is open".to_string(),
            }
            .into())
        }
    }
}

impl<E: QueryEngine> TransactionOracle for Session<E> {
    fn is_transaction_active(&self) -> bool {
        self.transaction.is_transaction_active()
    }
}
