//! Association traversals and result caching for GraphModel Rust.
//!
//! `graphmodel-query` is the **traversal layer**. It turns declared
//! associations into lazily evaluated [`QueryProxy`] chains, realizes them as
//! query text plus parameters and caches read results per node instance.
//!
//! # Role In The Architecture
//!
//! - **Proxies**: `QueryProxy` chains hops over `AssociationDescriptor`s.
//! - **Clauses**: `Filter` and `OrderBy` narrow and sort a hop.
//! - **Caching**: `AssociationCache` keys results by a `Fingerprint` of the
//!   realized query and steps aside while a transaction is open.
//!
//! Realized queries execute through the `QueryEngine` trait from
//! `graphmodel-core`. Most users reach these types through the `graphmodel`
//! facade crate.

pub mod cache;
pub mod clause;
pub mod proxy;

pub use cache::{AssociationCache, CacheStats, CachedResult, Fingerprint, fingerprint};
pub use clause::{Comparison, Filter, OrderBy, OrderDirection, quote_ident};
pub use proxy::{HopOptions, ProxyRoot, QueryProxy, ReplaceSummary, ReturnShape};
