use super::context::{build_row, resolve_filter};
use super::{ExecutionContext, Executor, Statement};
use crate::core::{DbError, Result, Row, Value};
use crate::result::QueryResult;
use crate::transaction::Change;

pub struct InsertExecutor;

impl Executor for InsertExecutor {
    fn name(&self) -> &'static str {
        "INSERT"
    }

    fn can_handle(&self, stmt: &Statement) -> bool {
        matches!(stmt, Statement::Insert { .. })
    }

    fn execute(&self, stmt: &Statement, ctx: &mut ExecutionContext<'_>) -> Result<QueryResult> {
        let Statement::Insert {
            table,
            columns,
            rows,
        } = stmt
        else {
            return Err(DbError::ExecutionError("Expected INSERT statement".into()));
        };

        let schema = ctx.table_schema(table)?;
        let rows = rows
            .iter()
            .map(|values| build_row(schema, columns, values))
            .collect::<Result<Vec<Row>>>()?;

        let inserted = ctx.write_then_check(
            table,
            |storage, snapshot, current, changes| {
                for row in &rows {
                    let row_id = storage.insert(row.clone(), snapshot, current)?;
                    changes.push(Change::InsertRow {
                        table: table.clone(),
                        row_id,
                    });
                }
                Ok(changes.len())
            },
            |ctx| {
                rows.iter()
                    .try_for_each(|row| ctx.check_foreign_keys(schema, row))
            },
        )?;

        Ok(QueryResult::affected(inserted))
    }
}

/// Insert, or update the row already holding the conflict key, as one step
/// under the table's write lock.
pub struct UpsertExecutor;

impl Executor for UpsertExecutor {
    fn name(&self) -> &'static str {
        "UPSERT"
    }

    fn can_handle(&self, stmt: &Statement) -> bool {
        matches!(stmt, Statement::Upsert { .. })
    }

    fn execute(&self, stmt: &Statement, ctx: &mut ExecutionContext<'_>) -> Result<QueryResult> {
        let Statement::Upsert {
            table,
            columns,
            row,
            conflict_columns,
            update_columns,
        } = stmt
        else {
            return Err(DbError::ExecutionError("Expected UPSERT statement".into()));
        };

        let schema = ctx.table_schema(table)?;
        let new_row = build_row(schema, columns, row)?;
        let conflict_indexes = schema.column_indexes(conflict_columns)?;
        let update_indexes = schema.column_indexes(update_columns)?;
        if conflict_indexes.is_empty() {
            return Err(DbError::MalformedStatement(format!(
                "upsert into '{}' names no conflict columns",
                table
            )));
        }

        let key: Vec<(usize, Value)> = conflict_indexes
            .iter()
            .map(|idx| (*idx, new_row[*idx].clone()))
            .collect();

        ctx.write_then_check(
            table,
            |storage, snapshot, current, changes| {
                let visible = storage.scan_matching(&key, snapshot);
                match visible.into_iter().next() {
                    Some((row_id, mut existing)) => {
                        for idx in &update_indexes {
                            existing[*idx] = new_row[*idx].clone();
                        }
                        if storage.update(row_id, existing, snapshot, current)? {
                            changes.push(Change::UpdateRow {
                                table: table.clone(),
                                row_id,
                            });
                        }
                    }
                    None => {
                        if !storage.scan_matching(&key, current).is_empty() {
                            return Err(DbError::WriteConflict(format!(
                                "key in '{}' was inserted by a concurrent transaction",
                                table
                            )));
                        }
                        let row_id = storage.insert(new_row.clone(), snapshot, current)?;
                        changes.push(Change::InsertRow {
                            table: table.clone(),
                            row_id,
                        });
                    }
                }
                Ok(())
            },
            |ctx| ctx.check_foreign_keys(schema, &new_row),
        )?;

        Ok(QueryResult::affected(1))
    }
}

/// Resolve and validate a filter for executors that read before they write.
pub(crate) fn matching_rows(
    ctx: &ExecutionContext<'_>,
    table: &str,
    filter: &super::Filter,
) -> Result<Vec<(usize, Row)>> {
    let schema = ctx.table_schema(table)?;
    let filter = resolve_filter(schema, filter)?;
    ctx.storage.scan_matching(table, &filter, ctx.snapshot())
}
