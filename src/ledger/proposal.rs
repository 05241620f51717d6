use super::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An ordered, height-tagged batch of pending transactions handed to
/// consensus. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    height: u64,
    created_time: u64,
    transactions: Vec<Transaction>,
}

impl Proposal {
    pub fn new(height: u64, created_time: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            height,
            created_time,
            transactions,
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Milliseconds since the Unix epoch
    pub fn created_time(&self) -> u64 {
        self.created_time
    }
}

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let transactions: Vec<String> =
            self.transactions.iter().map(ToString::to_string).collect();
        write!(
            f,
            "Proposal: [height={}, transactions=[{}]]",
            self.height,
            transactions.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Command;

    fn tx(creator: &str, role: &str) -> Transaction {
        Transaction::new(
            creator,
            1_000,
            vec![Command::CreateRole {
                role_name: role.to_string(),
                permissions: Default::default(),
            }],
        )
    }

    #[test]
    fn test_accessors() {
        let proposal = Proposal::new(7, 42, vec![tx("admin@test", "user")]);
        assert_eq!(proposal.height(), 7);
        assert_eq!(proposal.created_time(), 42);
        assert_eq!(proposal.transactions().len(), 1);
        assert_eq!(proposal.transactions()[0].creator_account_id, "admin@test");
    }

    #[test]
    fn test_equality_covers_every_field() {
        let base = Proposal::new(1, 10, vec![tx("a@test", "x"), tx("b@test", "y")]);
        assert_eq!(base, base.clone());
        assert_ne!(base, Proposal::new(2, 10, base.transactions().to_vec()));
        assert_ne!(base, Proposal::new(1, 11, base.transactions().to_vec()));
        assert_ne!(
            base,
            Proposal::new(1, 10, vec![tx("b@test", "y"), tx("a@test", "x")])
        );
    }

    #[test]
    fn test_display_lists_transactions_in_order() {
        let proposal = Proposal::new(3, 0, vec![tx("a@test", "x"), tx("b@test", "y")]);
        let expected = format!(
            "Proposal: [height=3, transactions=[{}, {}]]",
            tx("a@test", "x"),
            tx("b@test", "y")
        );
        assert_eq!(proposal.to_string(), expected);

        assert_eq!(
            Proposal::new(0, 0, vec![]).to_string(),
            "Proposal: [height=0, transactions=[]]"
        );
    }
}
