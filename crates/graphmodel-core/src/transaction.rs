//! Transaction visibility for association caching.
//!
//! Relationship changes made inside an open transaction are not durable yet,
//! so every cache read and write asks a [`TransactionOracle`] first. The oracle
//! is passed explicitly to each cache operation rather than looked up from
//! global state.

use crate::error::{Result, TransactionError, TransactionErrorKind};
use std::cell::Cell;

/// Answers whether a transaction is open for the current unit of work.
pub trait TransactionOracle {
    fn is_transaction_active(&self) -> bool;
}

impl TransactionOracle for bool {
    fn is_transaction_active(&self) -> bool {
        *self
    }
}

/// Flag-backed transaction state for a single unit of work.
///
/// Not `Sync`: one state belongs to one request.
#[derive(Debug, Default)]
pub struct TransactionState {
    active: Cell<bool>,
}

impl TransactionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a transaction as open.
    pub fn begin(&self) -> Result<()> {
        if self.active.get() {
            return Err(TransactionError {
                kind: TransactionErrorKind::AlreadyActive,
                message: "a transaction is already open".to_string(),
            }
            .into());
        }
        self.active.set(true);
        Ok(())
    }

    /// Mark the open transaction as finished (commit or rollback).
    pub fn finish(&self) -> Result<()> {
        if !self.active.get() {
            return Err(TransactionError {
                kind: TransactionErrorKind::NotActive,
                message: "no transaction is open".to_string(),
            }
            .into());
        }
        self.active.set(false);
        Ok(())
    }
}

impl TransactionOracle for TransactionState {
    fn is_transaction_active(&self) -> bool {
        self.active.get()
    }
}
