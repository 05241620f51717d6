use super::{Table, TableSchema};
use crate::core::{DbError, Result, Row, Snapshot, Value};
use crate::transaction::Change;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Tables behind individual locks.
///
/// A statement holds at most one table lock at a time; multi-table checks
/// (foreign keys) take and release read locks one table after another.
#[derive(Default)]
pub struct InMemoryStorage {
    tables: HashMap<String, Arc<RwLock<Table>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        let name = schema.name().to_string();

        if self.tables.contains_key(&name) {
            return Err(DbError::TableExists(name));
        }

        self.tables.insert(name, Arc::new(RwLock::new(Table::new(schema))));
        Ok(())
    }

    /// Handle to a table for concurrent access
    pub fn get_table(&self, name: &str) -> Result<Arc<RwLock<Table>>> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Run `f` under the table's write lock, making it one atomic step with
    /// respect to every other statement on that table.
    pub fn with_table_mut<R>(
        &self,
        table_name: &str,
        f: impl FnOnce(&mut Table) -> Result<R>,
    ) -> Result<R> {
        let handle = self.get_table(table_name)?;
        let mut table = handle.write()?;
        f(&mut *table)
    }

    /// Reverse one recorded write of `tx_id`.
    pub fn revert(&self, change: &Change, tx_id: u64) -> Result<()> {
        self.with_table_mut(change.table_name(), |table| {
            table.revert(change, tx_id);
            Ok(())
        })
    }

    pub fn scan_table(&self, table_name: &str, snapshot: &Snapshot) -> Result<Vec<Row>> {
        let handle = self.get_table(table_name)?;
        let table = handle.read()?;
        Ok(table.scan(snapshot))
    }

    pub fn scan_matching(
        &self,
        table_name: &str,
        filter: &[(usize, Value)],
        snapshot: &Snapshot,
    ) -> Result<Vec<(usize, Row)>> {
        let handle = self.get_table(table_name)?;
        let table = handle.read()?;
        Ok(table.scan_matching(filter, snapshot))
    }

    /// See [`Table::has_live_match`].
    pub fn has_live_match(
        &self,
        table_name: &str,
        filter: &[(usize, Value)],
        current: &Snapshot,
    ) -> Result<bool> {
        let handle = self.get_table(table_name)?;
        let table = handle.read()?;
        table.has_live_match(filter, current)
    }

    /// Replace a table's contents with checkpointed rows.
    pub fn restore_table(&self, table_name: &str, rows: Vec<Row>) -> Result<()> {
        self.with_table_mut(table_name, |table| {
            *table = Table::new(table.schema().clone());
            table.restore(rows)
        })
    }
}
