//! Per-instance caching of association reads.
//!
//! Results are keyed by association name and a [`Fingerprint`] of the
//! realized query, so a filtered read never answers for an unfiltered one.
//! While a transaction is open the cache is neither read nor written.
//!
//! # Example
//!
//! ```
//! use graphmodel_core::RealizedQuery;
//! use graphmodel_query::cache::{AssociationCache, CachedResult, fingerprint};
//!
//! let mut cache = AssociationCache::new();
//! let fp = fingerprint(&RealizedQuery::new("MATCH (n) RETURN n"));
//!
//! let first = cache.fetch(&false, "owner", &fp, || Ok(CachedResult::One(None))).unwrap();
//! assert_eq!(first, CachedResult::One(None));
//!
//! // Served from the cache: the closure is not called.
//! let called = std::cell::Cell::new(false);
//! cache
//!     .fetch(&false, "owner", &fp, || {
//!         called.set(true);
//!         Ok(CachedResult::One(None))
//!     })
//!     .unwrap();
//! assert!(!called.get());
//! ```

use graphmodel_core::{Node, RealizedQuery, Result, TransactionOracle, Value};
use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Cache key for one realized query.
///
/// Hashing uses a precomputed 64-bit digest of the text and parameters.
/// Equality compares the full query, so two queries whose digests collide
/// still occupy separate entries. Floats compare by bit pattern on both
/// sides, which keeps a NaN parameter equal to itself.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    hash: u64,
    query: RealizedQuery,
}

impl Fingerprint {
    /// The 64-bit digest.
    pub fn digest(&self) -> u64 {
        self.hash
    }

    pub fn query(&self) -> &RealizedQuery {
        &self.query
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.query.text == other.query.text
            && self.query.params.len() == other.query.params.len()
            && self
                .query
                .params
                .iter()
                .zip(&other.query.params)
                .all(|((a_name, a), (b_name, b))| a_name == b_name && same_value(a, b))
    }
}

impl Eq for Fingerprint {}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// Fingerprint a realized query.
pub fn fingerprint(query: &RealizedQuery) -> Fingerprint {
    let mut hasher = DefaultHasher::new();
    query.text.hash(&mut hasher);
    for (name, value) in &query.params {
        name.hash(&mut hasher);
        hash_value(value, &mut hasher);
    }
    Fingerprint {
        hash: hasher.finish(),
        query: query.clone(),
    }
}

fn hash_value(value: &Value, hasher: &mut impl Hasher) {
    match value {
        Value::Null => 0u8.hash(hasher),
        Value::Bool(b) => {
            1u8.hash(hasher);
            b.hash(hasher);
        }
        Value::BigInt(i) => {
            2u8.hash(hasher);
            i.hash(hasher);
        }
        Value::Double(f) => {
            3u8.hash(hasher);
            f.to_bits().hash(hasher);
        }
        Value::Text(s) => {
            4u8.hash(hasher);
            s.hash(hasher);
        }
        Value::Bytes(b) => {
            5u8.hash(hasher);
            b.hash(hasher);
        }
        Value::Json(j) => {
            6u8.hash(hasher);
            j.to_string().hash(hasher);
        }
        Value::Array(items) => {
            7u8.hash(hasher);
            items.len().hash(hasher);
            for item in items {
                hash_value(item, hasher);
            }
        }
    }
}

/// Structural equality matching `hash_value`: floats by bits, JSON by its
/// rendered text.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Double(x), Value::Double(y)) => x.to_bits() == y.to_bits(),
        (Value::Json(x), Value::Json(y)) => x.to_string() == y.to_string(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| same_value(x, y))
        }
        (Value::Double(_) | Value::Json(_) | Value::Array(_), _) => false,
        _ => a == b,
    }
}

/// A cached association read.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedResult {
    /// Result of a to-many read.
    Many(Vec<Node>),
    /// Result of a to-one read, including a cached absence.
    One(Option<Node>),
}

impl CachedResult {
    pub fn into_many(self) -> Vec<Node> {
        match self {
            CachedResult::Many(nodes) => nodes,
            CachedResult::One(node) => node.into_iter().collect(),
        }
    }

    pub fn into_one(self) -> Option<Node> {
        match self {
            CachedResult::Many(nodes) => nodes.into_iter().next(),
            CachedResult::One(node) => node,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: CachedResult,
    hit_count: u64,
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Reads that skipped the cache because a transaction was open.
    pub bypassed: u64,
}

/// Association read cache owned by a single node instance.
#[derive(Debug, Default)]
pub struct AssociationCache {
    entries: HashMap<String, HashMap<Fingerprint, CacheEntry>>,
    stats: CacheStats,
}

impl AssociationCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached result. Always `None` inside a transaction.
    pub fn get(
        &self,
        tx: &dyn TransactionOracle,
        association: &str,
        fingerprint: &Fingerprint,
    ) -> Option<&CachedResult> {
        if tx.is_transaction_active() {
            return None;
        }
        self.entries
            .get(association)?
            .get(fingerprint)
            .map(|entry| &entry.result)
    }

    /// Store a result and hand it back. Nothing is stored inside a transaction.
    pub fn set(
        &mut self,
        tx: &dyn TransactionOracle,
        association: &str,
        fingerprint: Fingerprint,
        result: CachedResult,
    ) -> CachedResult {
        if tx.is_transaction_active() {
            tracing::trace!(association, "Transaction open, not caching");
            return result;
        }
        self.entries.entry(association.to_string()).or_default().insert(
            fingerprint,
            CacheEntry {
                result: result.clone(),
                hit_count: 0,
            },
        );
        result
    }

    /// Return the cached result, or run `compute` and cache what it returns.
    ///
    /// `compute` only runs on a miss. Errors are returned without caching.
    pub fn fetch(
        &mut self,
        tx: &dyn TransactionOracle,
        association: &str,
        fingerprint: &Fingerprint,
        compute: impl FnOnce() -> Result<CachedResult>,
    ) -> Result<CachedResult> {
        if tx.is_transaction_active() {
            self.stats.bypassed += 1;
            tracing::debug!(association, "Association cache bypassed in transaction");
            return compute();
        }

        if let Some(entry) = self
            .entries
            .get_mut(association)
            .and_then(|by_query| by_query.get_mut(fingerprint))
        {
            entry.hit_count += 1;
            self.stats.hits += 1;
            tracing::debug!(
                association,
                digest = fingerprint.digest(),
                hit_count = entry.hit_count,
                "Association cache hit"
            );
            return Ok(entry.result.clone());
        }

        self.stats.misses += 1;
        tracing::debug!(
            association,
            digest = fingerprint.digest(),
            "Association cache miss"
        );
        let result = compute()?;
        Ok(self.set(tx, association, fingerprint.clone(), result))
    }

    /// Drop every cached result.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            tracing::trace!(associations = self.entries.len(), "Clearing association cache");
        }
        self.entries.clear();
    }

    /// Drop cached results for one association.
    pub fn clear_association(&mut self, association: &str) {
        self.entries.remove(association);
    }

    /// Number of cached results across all associations.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cached results for one association.
    pub fn entries(&self, association: &str) -> usize {
        self.entries.get(association).map_or(0, HashMap::len)
    }

    /// Times a specific entry has been served.
    pub fn hit_count(&self, association: &str, fingerprint: &Fingerprint) -> Option<u64> {
        self.entries
            .get(association)?
            .get(fingerprint)
            .map(|entry| entry.hit_count)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
