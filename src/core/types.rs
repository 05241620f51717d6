use super::{DataType, DbError, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

pub type Row = Vec<Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn validate(&self, table: &str, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(DbError::NullValue {
                    table: table.to_string(),
                    column: self.name.clone(),
                });
            }
            return Ok(());
        }

        if !self.data_type.is_compatible(value) {
            return Err(DbError::TypeMismatch(format!(
                "Column '{}' expects type {}, got {}",
                self.name,
                self.data_type,
                value.type_name()
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn find_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.find_column_index(name).map(|idx| &self.columns[idx])
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// `columns` of the owning table must match an existing row of
/// `table.referenced_columns`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub table: String,
    pub referenced_columns: Vec<String>,
}

impl ForeignKey {
    pub fn new(columns: &[&str], table: &str, referenced_columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            table: table.to_string(),
            referenced_columns: referenced_columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Visibility horizon of one transaction.
///
/// A version written by `xid` is visible when `xid` is the owner, or when it
/// committed before the snapshot was taken: `xid < max_tx_id` and `xid` was
/// not in flight at that moment. Transaction id 0 is reserved for rows
/// restored from a checkpoint and is always committed.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tx_id: u64,
    pub active: Arc<HashSet<u64>>,
    pub max_tx_id: u64,
}

impl Snapshot {
    pub fn sees(&self, xid: u64) -> bool {
        xid == self.tx_id || (xid < self.max_tx_id && !self.active.contains(&xid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_null_column_rejects_null() {
        let column = Column::new("role_id", DataType::Text).not_null();
        let err = column.validate("role", &Value::Null).unwrap_err();
        assert!(matches!(err, DbError::NullValue { .. }));
        assert!(err.to_string().contains("cannot be NULL"));
    }

    #[test]
    fn test_column_type_mismatch() {
        let column = Column::new("quorum", DataType::Integer);
        assert!(column.validate("account", &Value::Integer(1)).is_ok());
        assert!(matches!(
            column.validate("account", &Value::Text("1".into())),
            Err(DbError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_snapshot_visibility() {
        let snapshot = Snapshot {
            tx_id: 5,
            active: Arc::new([3u64, 5].into_iter().collect()),
            max_tx_id: 6,
        };
        assert!(snapshot.sees(0));
        assert!(snapshot.sees(2));
        assert!(!snapshot.sees(3));
        assert!(snapshot.sees(5));
        assert!(!snapshot.sees(7));
    }
}
