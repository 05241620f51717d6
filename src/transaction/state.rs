// ============================================================================
// Transaction State Management
// ============================================================================
//
// Each transaction moves through defined states: Active -> Committed/Aborted
//
// Uses MVCC with snapshot isolation:
// - Each transaction sees a consistent snapshot of the database
// - Its own writes are visible to itself immediately (read-your-writes)
// - Writes become visible to others only after commit
//
// ============================================================================

use super::Change;
use crate::core::{DbError, Result, Snapshot};

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Transaction state
///
/// State transitions:
/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can execute operations
    Active,

    /// Transaction has been successfully committed
    Committed,

    /// Transaction has been aborted/rolled back
    Aborted,
}

impl TransactionState {
    /// Check if transaction can execute operations
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }

    /// Check if transaction is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::Aborted
        )
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// A database transaction with MVCC snapshot isolation
///
/// # Thread Safety
/// Owned by exactly one `DbTransaction` handle; all access goes through
/// `&mut`, so it needs no locking of its own.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,

    /// All reads see data as of this snapshot
    snapshot: Snapshot,

    /// Row writes made during this transaction, oldest first
    changes: Vec<Change>,

    start_time: std::time::Instant,
}

impl Transaction {
    pub fn new(id: TransactionId, snapshot: Snapshot) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            snapshot,
            changes: Vec::new(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    pub fn duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Fails unless the transaction can still execute statements.
    pub fn ensure_active(&self) -> Result<()> {
        if !self.state.is_active() {
            return Err(DbError::TransactionInactive(format!(
                "{} ({})",
                self.id, self.state
            )));
        }
        Ok(())
    }

    /// Record a change in this transaction
    ///
    /// # Errors
    /// Returns error if transaction is not active
    pub fn record_change(&mut self, change: Change) -> Result<()> {
        self.ensure_active()?;
        self.changes.push(change);
        Ok(())
    }

    /// Mark transaction as committed
    ///
    /// # Errors
    /// Returns error if transaction is not active
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.state = TransactionState::Committed;
        Ok(())
    }

    /// Mark transaction as aborted and hand back its changes, newest first,
    /// for the caller to undo.
    ///
    /// # Errors
    /// Returns error if transaction is not active
    pub fn rollback(&mut self) -> Result<Vec<Change>> {
        self.ensure_active()?;
        self.state = TransactionState::Aborted;
        let mut changes = std::mem::take(&mut self.changes);
        changes.reverse();
        Ok(changes)
    }
}
