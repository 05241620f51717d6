use super::WorldStateDb;
use crate::core::Result;
use crate::executor::{ExecutionContext, Statement};
use crate::result::QueryResult;
use crate::storage::DurabilityMode;
use crate::transaction::{Transaction, TransactionId, TransactionState};
use tracing::{info, warn};

/// Anything that executes statements inside one open transaction.
///
/// Statements run in order and see the writes of earlier statements on the
/// same scope. The scope is never committed or rolled back through this
/// trait; its owner decides.
pub trait TransactionScope {
    fn execute(&mut self, statement: &Statement) -> Result<QueryResult>;
    fn id(&self) -> TransactionId;
}

/// An open transaction on a [`WorldStateDb`].
///
/// Dropping it while still active rolls it back.
pub struct DbTransaction<'db> {
    db: &'db WorldStateDb,
    transaction: Transaction,
}

impl<'db> DbTransaction<'db> {
    pub(crate) fn new(db: &'db WorldStateDb, transaction: Transaction) -> Self {
        Self { db, transaction }
    }

    pub fn id(&self) -> TransactionId {
        self.transaction.id()
    }

    pub fn state(&self) -> TransactionState {
        self.transaction.state()
    }

    pub fn execute(&mut self, statement: &Statement) -> Result<QueryResult> {
        self.transaction.ensure_active()?;
        let current = self.db.transaction_manager.current(self.transaction.id())?;
        let mut ctx = ExecutionContext::new(
            &self.db.storage,
            &self.db.catalog,
            &mut self.transaction,
            current,
        );
        self.db.pipeline.execute(statement, &mut ctx)
    }

    /// Publish every write of this transaction.
    ///
    /// With `DurabilityMode::OnCommit` a checkpoint follows; if it fails the
    /// transaction stays committed in memory and the error is returned.
    pub fn commit(mut self) -> Result<()> {
        let id = self.transaction.id();
        let changes = self.transaction.change_count();
        self.transaction.commit()?;
        self.db.transaction_manager.commit(id)?;
        info!(
            txn = %id,
            changes,
            elapsed_us = self.transaction.duration().as_micros() as u64,
            "transaction committed"
        );

        if self.db.config.durability == DurabilityMode::OnCommit {
            self.db.checkpoint()?;
        }
        Ok(())
    }

    pub fn rollback(mut self) -> Result<()> {
        self.abort()
    }

    fn abort(&mut self) -> Result<()> {
        let id = self.transaction.id();
        let changes = self.transaction.rollback()?;

        for change in &changes {
            if let Err(err) = self.db.storage.revert(change, id.as_u64()) {
                // Left in the active set so its remaining versions stay invisible
                warn!(txn = %id, error = %err, "rollback could not revert a write");
                return Err(err);
            }
        }

        self.db.transaction_manager.finish_rollback(id)?;
        info!(txn = %id, reverted = changes.len(), "transaction rolled back");
        Ok(())
    }
}

impl TransactionScope for DbTransaction<'_> {
    fn execute(&mut self, statement: &Statement) -> Result<QueryResult> {
        DbTransaction::execute(self, statement)
    }

    fn id(&self) -> TransactionId {
        DbTransaction::id(self)
    }
}

impl Drop for DbTransaction<'_> {
    fn drop(&mut self) {
        if self.transaction.state().is_active()
            && let Err(err) = self.abort()
        {
            warn!(txn = %self.transaction.id(), error = %err, "rollback on drop failed");
        }
    }
}
