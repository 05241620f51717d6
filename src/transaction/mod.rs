// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Implements ACID transactions with Snapshot Isolation using MVCC
// (Multi-Version Concurrency Control)
//
// Design Patterns Used:
// - State Pattern: Transaction state management (Active, Committed, Aborted)
// - Command Pattern: Recorded row writes undone on rollback
// - Copy-on-Write: Shared active-transaction set for snapshots
//
// ============================================================================

pub mod change;
pub mod manager;
pub mod state;

pub use change::Change;
pub use manager::{TransactionManager, TransactionStats};
pub use state::{Transaction, TransactionId, TransactionState};
