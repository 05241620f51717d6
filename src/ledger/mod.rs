pub mod command;
pub mod error;
pub mod proposal;
pub mod state_machine;
pub mod transaction;

pub use command::Command;
pub use error::ApplyError;
pub use proposal::Proposal;
pub use state_machine::{StateMachine, TransactionOutcome};
pub use transaction::Transaction;
