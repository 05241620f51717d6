use crate::core::DbError;
use std::fmt;
use thiserror::Error;

/// The world state mutation an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    InsertRole,
    InsertAccountRole,
    DeleteAccountRole,
    InsertRolePermissions,
    InsertAccount,
    UpdateAccount,
    SetAccountKv,
    InsertAsset,
    UpsertAccountAsset,
    InsertSignatory,
    InsertAccountSignatory,
    DeleteAccountSignatory,
    DeleteSignatory,
    InsertPeer,
    DeletePeer,
    InsertDomain,
    InsertAccountGrantablePermission,
    DeleteAccountGrantablePermission,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::InsertRole => "insert role",
            Operation::InsertAccountRole => "insert account role",
            Operation::DeleteAccountRole => "delete account role",
            Operation::InsertRolePermissions => "insert role permissions",
            Operation::InsertAccount => "insert account",
            Operation::UpdateAccount => "update account",
            Operation::SetAccountKv => "set account detail",
            Operation::InsertAsset => "insert asset",
            Operation::UpsertAccountAsset => "upsert account asset",
            Operation::InsertSignatory => "insert signatory",
            Operation::InsertAccountSignatory => "insert account signatory",
            Operation::DeleteAccountSignatory => "delete account signatory",
            Operation::DeleteSignatory => "delete signatory",
            Operation::InsertPeer => "insert peer",
            Operation::DeletePeer => "delete peer",
            Operation::InsertDomain => "insert domain",
            Operation::InsertAccountGrantablePermission => "insert account grantable permission",
            Operation::DeleteAccountGrantablePermission => "delete account grantable permission",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one world state command.
///
/// Every variant names the operation, the identifiers it was applied to and
/// the store's own description of what went wrong.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WsvError {
    /// Duplicate key, or a delete blocked by rows that still reference it
    #[error("{operation} {target} failed\n{detail}")]
    ConstraintViolation {
        operation: Operation,
        target: String,
        detail: String,
    },

    /// A referenced entity or the row to change does not exist
    #[error("{operation} {target} failed\n{detail}")]
    NotFound {
        operation: Operation,
        target: String,
        detail: String,
    },

    /// The store could not run the statement right now; a fresh
    /// transaction may succeed
    #[error("{operation} {target} failed\n{detail}")]
    BackendUnavailable {
        operation: Operation,
        target: String,
        detail: String,
    },

    /// The statement itself is invalid for the schema
    #[error("{operation} {target} failed\n{detail}")]
    ValidationFailed {
        operation: Operation,
        target: String,
        detail: String,
    },
}

pub type WsvResult = Result<(), WsvError>;

impl WsvError {
    /// Classify a store error raised while running `operation`.
    pub fn from_db(operation: Operation, target: String, err: &DbError) -> Self {
        let detail = err.to_string();
        match err {
            DbError::UniqueViolation { .. }
            | DbError::RowReferenced { .. }
            | DbError::TableExists(_) => WsvError::ConstraintViolation {
                operation,
                target,
                detail,
            },
            DbError::ForeignKeyViolation { .. } => WsvError::NotFound {
                operation,
                target,
                detail,
            },
            DbError::WriteConflict(_)
            | DbError::LockError(_)
            | DbError::TransactionInactive(_)
            | DbError::IoError(_)
            | DbError::SerializationError(_) => WsvError::BackendUnavailable {
                operation,
                target,
                detail,
            },
            DbError::MalformedStatement(_)
            | DbError::TableNotFound(_)
            | DbError::ColumnNotFound(_, _)
            | DbError::TypeMismatch(_)
            | DbError::NullValue { .. }
            | DbError::ExecutionError(_)
            | DbError::UnsupportedOperation(_)
            | DbError::InvalidConfig(_) => WsvError::ValidationFailed {
                operation,
                target,
                detail,
            },
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            WsvError::ConstraintViolation { operation, .. }
            | WsvError::NotFound { operation, .. }
            | WsvError::BackendUnavailable { operation, .. }
            | WsvError::ValidationFailed { operation, .. } => *operation,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            WsvError::ConstraintViolation { target, .. }
            | WsvError::NotFound { target, .. }
            | WsvError::BackendUnavailable { target, .. }
            | WsvError::ValidationFailed { target, .. } => target,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            WsvError::ConstraintViolation { detail, .. }
            | WsvError::NotFound { detail, .. }
            | WsvError::BackendUnavailable { detail, .. }
            | WsvError::ValidationFailed { detail, .. } => detail,
        }
    }

    /// Whether re-running the enclosing ledger transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WsvError::BackendUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_composition() {
        let err = WsvError::ConstraintViolation {
            operation: Operation::InsertRole,
            target: "admin".to_string(),
            detail: "duplicate key".to_string(),
        };
        assert_eq!(err.to_string(), "insert role admin failed\nduplicate key");
    }

    #[test]
    fn test_classification() {
        let unique = DbError::UniqueViolation {
            table: "role".into(),
            columns: "role_id".into(),
            key: "admin".into(),
        };
        let missing = DbError::ForeignKeyViolation {
            table: "account".into(),
            referenced: "domain".into(),
            key: "nowhere".into(),
        };
        let conflict = DbError::WriteConflict("busy".into());
        let invalid = DbError::TypeMismatch("x".into());

        let classify = |err| WsvError::from_db(Operation::InsertRole, "t".into(), &err);
        assert!(matches!(classify(unique), WsvError::ConstraintViolation { .. }));
        assert!(matches!(classify(missing), WsvError::NotFound { .. }));
        let retry = classify(conflict);
        assert!(matches!(retry, WsvError::BackendUnavailable { .. }));
        assert!(retry.is_retryable());
        let bad = classify(invalid);
        assert!(matches!(bad, WsvError::ValidationFailed { .. }));
        assert!(!bad.is_retryable());
        assert_eq!(bad.operation(), Operation::InsertRole);
        assert_eq!(bad.target(), "t");
    }
}
