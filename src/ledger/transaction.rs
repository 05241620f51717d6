use super::Command;
use crate::wsv::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A signed-off batch of commands from one account, applied all or nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub creator_account_id: AccountId,
    /// Milliseconds since the Unix epoch
    pub created_time: u64,
    pub commands: Vec<Command>,
}

impl Transaction {
    pub fn new(creator_account_id: &str, created_time: u64, commands: Vec<Command>) -> Self {
        Self {
            creator_account_id: creator_account_id.to_string(),
            created_time,
            commands,
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let commands: Vec<String> = self.commands.iter().map(ToString::to_string).collect();
        write!(
            f,
            "Transaction: [creator_account_id={}, created_time={}, commands=[{}]]",
            self.creator_account_id,
            self.created_time,
            commands.join(", ")
        )
    }
}
