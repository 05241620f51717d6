use crate::core::DbError;
use crate::wsv::WsvError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Why a ledger transaction was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApplyError {
    #[error(transparent)]
    Wsv(#[from] WsvError),

    #[error(transparent)]
    Store(#[from] DbError),

    #[error("{0} does not exist")]
    NotFound(String),

    #[error("insufficient funds: {account_id} holds {balance} of {asset_id}, needs {amount}")]
    InsufficientFunds {
        account_id: String,
        asset_id: String,
        balance: Decimal,
        amount: Decimal,
    },

    #[error("amount {amount} is not valid for asset {asset_id}")]
    InvalidAmount { asset_id: String, amount: Decimal },

    #[error("balance of {asset_id} for {account_id} would overflow")]
    BalanceOverflow { account_id: String, asset_id: String },

    #[error("stored {0} is malformed")]
    CorruptRecord(String),

    #[error("quorum {quorum} is not valid for {account_id} with {signatories} signatories")]
    InvalidQuorum {
        account_id: String,
        quorum: u32,
        signatories: usize,
    },
}

impl ApplyError {
    /// Whether the transaction may succeed if re-run in a fresh scope.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApplyError::Wsv(err) => err.is_retryable(),
            ApplyError::Store(err) => matches!(
                err,
                DbError::WriteConflict(_) | DbError::LockError(_) | DbError::TransactionInactive(_)
            ),
            _ => false,
        }
    }
}
