//! Explicit unit of work over one SQLite transaction.
//!
//! # Responsibility
//! - Give every association mutation a caller-owned atomic scope.
//! - Make commit an explicit step; everything else rolls back.
//!
//! # Invariants
//! - The transaction is opened with `BEGIN IMMEDIATE`, so the write lock is
//!   taken before validation reads run.
//! - Dropping a unit without `commit()` rolls back every write made in it.
//! - Writes inside one unit are visible to later reads in the same unit.

use super::DbResult;
use log::debug;
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// One atomic unit of work.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> UnitOfWork<'conn> {
    /// Begins an immediate transaction on `conn`.
    pub fn begin(conn: &'conn mut Connection) -> DbResult<Self> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        debug!("event=unit_begin module=db status=ok");
        Ok(Self { tx })
    }

    /// Connection handle scoped to this unit.
    pub fn conn(&self) -> &Connection {
        &self.tx
    }

    /// Commits every write performed in this unit.
    pub fn commit(self) -> DbResult<()> {
        self.tx.commit()?;
        debug!("event=unit_commit module=db status=ok");
        Ok(())
    }

    /// Discards every write performed in this unit.
    pub fn rollback(self) -> DbResult<()> {
        self.tx.rollback()?;
        debug!("event=unit_rollback module=db status=ok");
        Ok(())
    }
}
