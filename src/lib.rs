// ============================================================================
// wsvdb Library
// ============================================================================
//
// World state view of a ledger node: the commands that mutate it, the
// proposals that carry them, and the transactional in-memory store they
// run against.
//
// ============================================================================

pub mod config;
pub mod core;
pub mod executor;
pub mod facade;
pub mod ledger;
pub mod result;
pub mod storage;
pub mod transaction;
pub mod wsv;

// Re-export main types for convenience
pub use config::StoreConfig;
pub use crate::core::{DataType, DbError, Result, Value};
pub use executor::{Assignment, Filter, Statement};
pub use facade::{DbTransaction, TransactionScope, WorldStateDb};
pub use ledger::{Proposal, StateMachine};
pub use result::QueryResult;
pub use wsv::{DeletePolicy, StoreWsvCommand, WsvCommand, WsvError};
