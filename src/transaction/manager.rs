// ============================================================================
// Transaction Manager
// ============================================================================

use super::{Transaction, TransactionId};
use crate::core::{Result, Snapshot};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Allocates transaction ids and tracks which transactions are in flight.
///
/// The active set is Copy-on-Write so snapshots share it without copying.
/// Id allocation happens under the active-set write lock: when a snapshot is
/// taken, every lower id is either in the set or already finished.
pub struct TransactionManager {
    next_id: AtomicU64,
    active_ids: RwLock<Arc<HashSet<u64>>>,
    committed: AtomicU64,
    aborted: AtomicU64,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            // 0 is the bootstrap transaction of restored rows
            next_id: AtomicU64::new(1),
            active_ids: RwLock::new(Arc::new(HashSet::new())),
            committed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
        }
    }

    pub fn begin(&self) -> Result<Transaction> {
        let mut active_lock = self.active_ids.write()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut new_set = (**active_lock).clone();
        new_set.insert(id);
        let active = Arc::new(new_set);
        *active_lock = Arc::clone(&active);

        let snapshot = Snapshot {
            tx_id: id,
            active,
            max_tx_id: id + 1,
        };
        Ok(Transaction::new(TransactionId(id), snapshot))
    }

    /// The transaction table as of now, seen from `txn_id`.
    ///
    /// Used for constraint checks, which must judge other transactions by
    /// their present state rather than by the reader's snapshot.
    pub fn current(&self, txn_id: TransactionId) -> Result<Snapshot> {
        let active = self.active_ids.read()?.clone();
        Ok(Snapshot {
            tx_id: txn_id.0,
            active,
            max_tx_id: self.next_id.load(Ordering::SeqCst),
        })
    }

    /// A read-only view of everything committed so far.
    pub fn committed_view(&self) -> Result<Snapshot> {
        let active = self.active_ids.read()?.clone();
        Ok(Snapshot {
            // never allocated, so it owns no versions
            tx_id: u64::MAX,
            active,
            max_tx_id: self.next_id.load(Ordering::SeqCst),
        })
    }

    /// Make `txn_id`'s writes visible to snapshots taken from now on.
    pub fn commit(&self, txn_id: TransactionId) -> Result<()> {
        self.deactivate(txn_id)?;
        self.committed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Forget `txn_id` after its writes have been undone.
    pub fn finish_rollback(&self, txn_id: TransactionId) -> Result<()> {
        self.deactivate(txn_id)?;
        self.aborted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn active_count(&self) -> Result<usize> {
        Ok(self.active_ids.read()?.len())
    }

    pub fn stats(&self) -> TransactionStats {
        TransactionStats {
            committed: self.committed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
        }
    }

    fn deactivate(&self, txn_id: TransactionId) -> Result<()> {
        let mut active_lock = self.active_ids.write()?;
        if active_lock.contains(&txn_id.0) {
            let mut new_set = (**active_lock).clone();
            new_set.remove(&txn_id.0);
            *active_lock = Arc::new(new_set);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionStats {
    pub committed: u64,
    pub aborted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_id_generation() {
        let manager = TransactionManager::new();
        let first = manager.begin().unwrap();
        let second = manager.begin().unwrap();
        assert!(second.id() > first.id());
    }

    #[test]
    fn test_snapshot_excludes_in_flight_transactions() {
        let manager = TransactionManager::new();
        let first = manager.begin().unwrap();
        let second = manager.begin().unwrap();

        assert!(!second.snapshot().sees(first.id().as_u64()));
        assert!(second.snapshot().sees(second.id().as_u64()));

        manager.commit(first.id()).unwrap();
        // snapshot isolation: still invisible to the old snapshot
        assert!(!second.snapshot().sees(first.id().as_u64()));
        // but visible to constraint checks and to new transactions
        assert!(manager.current(second.id()).unwrap().sees(first.id().as_u64()));
        let third = manager.begin().unwrap();
        assert!(third.snapshot().sees(first.id().as_u64()));
    }

    #[test]
    fn test_commit_and_rollback_leave_active_set() {
        let manager = TransactionManager::new();
        let first = manager.begin().unwrap();
        let second = manager.begin().unwrap();
        assert_eq!(manager.active_count().unwrap(), 2);

        manager.commit(first.id()).unwrap();
        manager.finish_rollback(second.id()).unwrap();

        assert_eq!(manager.active_count().unwrap(), 0);
        assert_eq!(
            manager.stats(),
            TransactionStats {
                committed: 1,
                aborted: 1
            }
        );
    }

    #[test]
    fn test_committed_view_sees_bootstrap_rows() {
        let manager = TransactionManager::new();
        let view = manager.committed_view().unwrap();
        assert!(view.sees(0));
        assert!(!view.sees(1));
    }
}
