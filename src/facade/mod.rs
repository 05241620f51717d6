pub mod database;
pub mod transaction;

pub use database::WorldStateDb;
pub use transaction::{DbTransaction, TransactionScope};
