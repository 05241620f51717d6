use super::dml::matching_rows;
use super::{ExecutionContext, Executor, Statement};
use crate::core::{DbError, Result, Row};
use crate::result::QueryResult;

pub struct QueryExecutor;

impl Executor for QueryExecutor {
    fn name(&self) -> &'static str {
        "SELECT"
    }

    fn can_handle(&self, stmt: &Statement) -> bool {
        matches!(stmt, Statement::Select { .. })
    }

    fn execute(&self, stmt: &Statement, ctx: &mut ExecutionContext<'_>) -> Result<QueryResult> {
        let Statement::Select {
            table,
            columns,
            filter,
        } = stmt
        else {
            return Err(DbError::ExecutionError("Expected SELECT statement".into()));
        };

        let schema = ctx.table_schema(table)?;
        let (names, indexes) = if columns.is_empty() {
            let names = schema.schema().column_names();
            let indexes = (0..names.len()).collect();
            (names, indexes)
        } else {
            (columns.clone(), schema.column_indexes(columns)?)
        };

        let rows: Vec<Row> = matching_rows(ctx, table, filter)?
            .into_iter()
            .map(|(_, row)| indexes.iter().map(|idx| row[*idx].clone()).collect())
            .collect();

        Ok(QueryResult::new(names, rows))
    }
}
