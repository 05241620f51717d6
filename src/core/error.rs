use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("Malformed statement: {0}")]
    MalformedStatement(String),

    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Column '{column}' of table '{table}' cannot be NULL")]
    NullValue { table: String, column: String },

    #[error("duplicate key value violates unique constraint on '{table}' ({columns}) = ({key})")]
    UniqueViolation {
        table: String,
        columns: String,
        key: String,
    },

    #[error(
        "Foreign key violation: ({key}) in '{table}' references non-existent key in '{referenced}'"
    )]
    ForeignKeyViolation {
        table: String,
        referenced: String,
        key: String,
    },

    #[error("delete on '{table}' violates foreign key constraint from '{referencing}'")]
    RowReferenced { table: String, referencing: String },

    #[error("Write-write conflict: {0}")]
    WriteConflict(String),

    #[error("Transaction {0} is not active")]
    TransactionInactive(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
