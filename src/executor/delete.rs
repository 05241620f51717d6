use super::dml::matching_rows;
use super::{ExecutionContext, Executor, Statement};
use crate::core::{DbError, Result};
use crate::result::QueryResult;
use crate::transaction::Change;

/// Deletes matching rows. Foreign keys restrict: a row still referenced
/// elsewhere fails the statement, or is left in place when the statement
/// asks to skip referenced rows.
pub struct DeleteExecutor;

impl Executor for DeleteExecutor {
    fn name(&self) -> &'static str {
        "DELETE"
    }

    fn can_handle(&self, stmt: &Statement) -> bool {
        matches!(stmt, Statement::Delete { .. })
    }

    fn execute(&self, stmt: &Statement, ctx: &mut ExecutionContext<'_>) -> Result<QueryResult> {
        let Statement::Delete {
            table,
            filter,
            skip_referenced,
        } = stmt
        else {
            return Err(DbError::ExecutionError("Expected DELETE statement".into()));
        };

        let schema = ctx.table_schema(table)?;

        let mut doomed = Vec::new();
        for (row_id, row) in matching_rows(ctx, table, filter)? {
            match ctx.find_referencing(schema, &row)? {
                None => doomed.push((row_id, row)),
                Some(_) if *skip_referenced => {
                    tracing::debug!(table = %table, row_id, "keeping referenced row");
                }
                Some(referencing) => {
                    return Err(DbError::RowReferenced {
                        table: table.clone(),
                        referencing,
                    });
                }
            }
        }

        // A reference inserted after the check above shows up as pending once
        // the rows are marked deleted.
        let deleted = ctx.write_then_check(
            table,
            |storage, snapshot, _current, changes| {
                for (row_id, _) in &doomed {
                    if storage.delete(*row_id, snapshot)? {
                        changes.push(Change::DeleteRow {
                            table: table.clone(),
                            row_id: *row_id,
                        });
                    }
                }
                Ok(changes.len())
            },
            |ctx| {
                for (_, row) in &doomed {
                    if let Some(referencing) = ctx.find_referencing(schema, row)? {
                        return Err(DbError::WriteConflict(format!(
                            "row in '{}' gained a reference from '{}' while being deleted",
                            table, referencing
                        )));
                    }
                }
                Ok(())
            },
        )?;

        Ok(QueryResult::affected(deleted))
    }
}
