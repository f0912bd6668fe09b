//! Per-connection transaction control.
//!
//! Pure delegation: the handle owns transaction state and enforces
//! `Idle -> begin -> InTransaction -> commit|rollback -> Idle`. Rejections come
//! back as `TransactionState` with the driver's message untouched.

use crate::core::{ConnectionRegistry, ConnkeeperError, Result};
use crate::driver::{Driver, Handle};
use std::fmt;
use tracing::debug;

/// The transaction primitive being delegated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOp {
    Begin,
    Commit,
    RollBack,
}

impl fmt::Display for TransactionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionOp::Begin => write!(f, "begin"),
            TransactionOp::Commit => write!(f, "commit"),
            TransactionOp::RollBack => write!(f, "rollback"),
        }
    }
}

impl<D: Driver> ConnectionRegistry<D> {
    pub fn begin_transaction(&self, identifier: &str) -> Result<()> {
        self.delegate(identifier, TransactionOp::Begin)
    }

    pub fn commit(&self, identifier: &str) -> Result<()> {
        self.delegate(identifier, TransactionOp::Commit)
    }

    pub fn roll_back(&self, identifier: &str) -> Result<()> {
        self.delegate(identifier, TransactionOp::RollBack)
    }

    /// Asks the handle whether a transaction is open. Opens the handle if needed.
    pub fn in_transaction(&self, identifier: &str) -> Result<bool> {
        Ok(self.connect(identifier)?.in_transaction())
    }

    fn delegate(&self, identifier: &str, op: TransactionOp) -> Result<()> {
        let handle = self.connect(identifier)?;
        debug!(connection = identifier, operation = %op, "transaction");

        let outcome = match op {
            TransactionOp::Begin => handle.begin_transaction(),
            TransactionOp::Commit => handle.commit(),
            TransactionOp::RollBack => handle.roll_back(),
        };
        outcome.map_err(|source| ConnkeeperError::transaction_state(identifier, op, source))
    }
}
