// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Every row write a transaction performs is recorded here so ROLLBACK can
// strip the transaction's versions back out of the tables, newest first.
//
// ============================================================================

/// A single reversible row write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// A new row chain was created
    InsertRow { table: String, row_id: usize },

    /// A new version was appended to an existing chain
    UpdateRow { table: String, row_id: usize },

    /// The visible version of a chain was marked deleted
    DeleteRow { table: String, row_id: usize },
}

impl Change {
    /// Get the table name affected by this change
    pub fn table_name(&self) -> &str {
        match self {
            Change::InsertRow { table, .. }
            | Change::UpdateRow { table, .. }
            | Change::DeleteRow { table, .. } => table,
        }
    }

    pub fn row_id(&self) -> usize {
        match self {
            Change::InsertRow { row_id, .. }
            | Change::UpdateRow { row_id, .. }
            | Change::DeleteRow { row_id, .. } => *row_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_accessors() {
        let change = Change::UpdateRow {
            table: "account".to_string(),
            row_id: 3,
        };
        assert_eq!(change.table_name(), "account");
        assert_eq!(change.row_id(), 3);
    }
}
