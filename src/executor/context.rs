use super::Filter;
use crate::core::{DbError, Result, Row, Snapshot, Value};
use crate::storage::table::render_key;
use crate::storage::{Catalog, InMemoryStorage, Table, TableSchema};
use crate::transaction::{Change, Transaction};

/// Everything a statement executor needs: the data, the table definitions
/// and the transaction it runs in.
pub struct ExecutionContext<'a> {
    pub storage: &'a InMemoryStorage,
    pub catalog: &'a Catalog,
    pub transaction: &'a mut Transaction,
    /// Transaction table as of statement start, for constraint checks
    pub current: Snapshot,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        storage: &'a InMemoryStorage,
        catalog: &'a Catalog,
        transaction: &'a mut Transaction,
        current: Snapshot,
    ) -> Self {
        Self {
            storage,
            catalog,
            transaction,
            current,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        self.transaction.snapshot()
    }

    pub fn table_schema(&self, table: &str) -> Result<&'a TableSchema> {
        self.catalog.get_table(table)
    }

    /// Apply a batch of writes to one table under its write lock, then run
    /// `check` once the lock is released.
    ///
    /// `f` pushes a `Change` for every write it makes. The statement is
    /// all-or-nothing: if `f` fails, the writes it already made are reverted
    /// before the lock is released, and a failed `check` reverts them too.
    /// Otherwise they join the transaction's undo log.
    ///
    /// Cross-table constraints belong in `check`: with the write already in
    /// place, two transactions racing on both sides of a foreign key always
    /// find each other's pending versions.
    pub fn write_then_check<R>(
        &mut self,
        table_name: &str,
        f: impl FnOnce(&mut Table, &Snapshot, &Snapshot, &mut Vec<Change>) -> Result<R>,
        check: impl FnOnce(&Self) -> Result<()>,
    ) -> Result<R> {
        let snapshot = self.transaction.snapshot().clone();
        let current = &self.current;
        let mut changes = Vec::new();

        let outcome = self.storage.with_table_mut(table_name, |table| {
            let result = f(table, &snapshot, current, &mut changes);
            if result.is_err() {
                for change in changes.drain(..).rev() {
                    table.revert(&change, snapshot.tx_id);
                }
            }
            result
        })?;

        if let Err(error) = check(&*self) {
            while let Some(change) = changes.pop() {
                if let Err(revert_error) = self.storage.revert(&change, snapshot.tx_id) {
                    // leave the rest to the transaction's rollback
                    changes.push(change);
                    for change in changes {
                        self.transaction.record_change(change)?;
                    }
                    return Err(revert_error);
                }
            }
            return Err(error);
        }

        for change in changes {
            self.transaction.record_change(change)?;
        }
        Ok(outcome)
    }

    /// Every non-null foreign key of `row` must match a live row.
    ///
    /// A target that a concurrent transaction is deleting or inserting is a
    /// write conflict rather than a verdict either way.
    pub fn check_foreign_keys(&self, schema: &TableSchema, row: &Row) -> Result<()> {
        for foreign_key in schema.foreign_keys() {
            let key: Vec<Value> = schema
                .column_indexes(&foreign_key.columns)?
                .into_iter()
                .map(|idx| row[idx].clone())
                .collect();
            if key.iter().any(Value::is_null) {
                continue;
            }

            let target = self.catalog.get_table(&foreign_key.table)?;
            let filter: Vec<(usize, Value)> = target
                .column_indexes(&foreign_key.referenced_columns)?
                .into_iter()
                .zip(key.iter().cloned())
                .collect();

            if !self
                .storage
                .has_live_match(&foreign_key.table, &filter, &self.current)?
            {
                return Err(DbError::ForeignKeyViolation {
                    table: schema.name().to_string(),
                    referenced: foreign_key.table.clone(),
                    key: render_key(&key),
                });
            }
        }
        Ok(())
    }

    /// Name of a table holding a live row that references `row`, if any.
    /// A referencing row still pending in another transaction is a write
    /// conflict.
    pub fn find_referencing(&self, schema: &TableSchema, row: &Row) -> Result<Option<String>> {
        for (referencing, foreign_key) in self.catalog.referencing(schema.name()) {
            let key: Vec<Value> = schema
                .column_indexes(&foreign_key.referenced_columns)?
                .into_iter()
                .map(|idx| row[idx].clone())
                .collect();
            let filter: Vec<(usize, Value)> = referencing
                .column_indexes(&foreign_key.columns)?
                .into_iter()
                .zip(key)
                .collect();

            if self
                .storage
                .has_live_match(referencing.name(), &filter, &self.current)?
            {
                return Ok(Some(referencing.name().to_string()));
            }
        }
        Ok(None)
    }
}

/// Resolve a filter's column names against `schema`.
pub fn resolve_filter(schema: &TableSchema, filter: &Filter) -> Result<Vec<(usize, Value)>> {
    filter
        .conditions()
        .iter()
        .map(|(column, value)| {
            schema
                .schema()
                .find_column_index(column)
                .map(|idx| (idx, value.clone()))
                .ok_or_else(|| DbError::ColumnNotFound(column.clone(), schema.name().to_string()))
        })
        .collect()
}

/// Lay `values` for `columns` out as a full table row; absent columns are NULL.
pub fn build_row(schema: &TableSchema, columns: &[String], values: &Row) -> Result<Row> {
    if columns.len() != values.len() {
        return Err(DbError::MalformedStatement(format!(
            "{} columns but {} values for '{}'",
            columns.len(),
            values.len(),
            schema.name()
        )));
    }

    let mut row = vec![Value::Null; schema.schema().column_count()];
    for (idx, value) in schema.column_indexes(columns)?.into_iter().zip(values.iter()) {
        row[idx] = value.clone();
    }
    Ok(row)
}
