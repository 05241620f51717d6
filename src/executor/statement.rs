// ============================================================================
// Parameterized Statements
// ============================================================================
//
// Statements are typed values: table and column names plus `Value`
// parameters. Nothing is parsed; `Display` renders a SQL-like form with `$n`
// placeholders so logs never carry parameter data.
//
// ============================================================================

use crate::core::{Row, Value};
use std::fmt;

/// A conjunction of `column = value` conditions. Empty matches every row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `column = value`
    Set(String, Value),

    /// Write `value` at `path` inside a JSON column, creating intermediate
    /// objects as needed.
    JsonSet {
        column: String,
        path: Vec<String>,
        value: Value,
    },
}

impl Assignment {
    pub fn set(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Assignment::Set(column.into(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Assignment::Set(column, _) => column,
            Assignment::JsonSet { column, .. } => column,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Insert {
        table: String,
        columns: Vec<String>,
        rows: Vec<Row>,
    },
    Upsert {
        table: String,
        columns: Vec<String>,
        row: Row,
        conflict_columns: Vec<String>,
        update_columns: Vec<String>,
    },
    Update {
        table: String,
        assignments: Vec<Assignment>,
        filter: Filter,
    },
    Delete {
        table: String,
        filter: Filter,
        /// Keep rows still referenced by a foreign key instead of failing
        skip_referenced: bool,
    },
    Select {
        table: String,
        /// Empty selects every column
        columns: Vec<String>,
        filter: Filter,
    },
}

fn names(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|column| column.to_string()).collect()
}

impl Statement {
    pub fn insert(table: &str, columns: &[&str], row: Row) -> Self {
        Self::insert_many(table, columns, vec![row])
    }

    pub fn insert_many(table: &str, columns: &[&str], rows: Vec<Row>) -> Self {
        Statement::Insert {
            table: table.to_string(),
            columns: names(columns),
            rows,
        }
    }

    pub fn upsert(
        table: &str,
        columns: &[&str],
        row: Row,
        conflict_columns: &[&str],
        update_columns: &[&str],
    ) -> Self {
        Statement::Upsert {
            table: table.to_string(),
            columns: names(columns),
            row,
            conflict_columns: names(conflict_columns),
            update_columns: names(update_columns),
        }
    }

    pub fn update(table: &str, assignments: Vec<Assignment>, filter: Filter) -> Self {
        Statement::Update {
            table: table.to_string(),
            assignments,
            filter,
        }
    }

    pub fn delete(table: &str, filter: Filter) -> Self {
        Statement::Delete {
            table: table.to_string(),
            filter,
            skip_referenced: false,
        }
    }

    pub fn delete_unreferenced(table: &str, filter: Filter) -> Self {
        Statement::Delete {
            table: table.to_string(),
            filter,
            skip_referenced: true,
        }
    }

    pub fn select(table: &str, columns: &[&str], filter: Filter) -> Self {
        Statement::Select {
            table: table.to_string(),
            columns: names(columns),
            filter,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Statement::Insert { table, .. }
            | Statement::Upsert { table, .. }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. }
            | Statement::Select { table, .. } => table,
        }
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Statement::Select { .. })
    }

    /// Parameter values in placeholder order.
    pub fn params(&self) -> Vec<&Value> {
        match self {
            Statement::Insert { rows, .. } => rows.iter().flatten().collect(),
            Statement::Upsert { row, .. } => row.iter().collect(),
            Statement::Update {
                assignments,
                filter,
                ..
            } => assignments
                .iter()
                .map(|assignment| match assignment {
                    Assignment::Set(_, value) => value,
                    Assignment::JsonSet { value, .. } => value,
                })
                .chain(filter.conditions.iter().map(|(_, value)| value))
                .collect(),
            Statement::Delete { filter, .. } | Statement::Select { filter, .. } => {
                filter.conditions.iter().map(|(_, value)| value).collect()
            }
        }
    }
}

fn write_where(f: &mut fmt::Formatter<'_>, filter: &Filter, first: usize) -> fmt::Result {
    if filter.is_empty() {
        return Ok(());
    }
    let conditions: Vec<String> = filter
        .conditions
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{} = ${}", column, first + i))
        .collect();
    write!(f, " WHERE {}", conditions.join(" AND "))
}

fn placeholders(count: usize, first: usize) -> String {
    (first..first + count)
        .map(|n| format!("${}", n))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Insert {
                table,
                columns,
                rows,
            } => {
                let values: Vec<String> = rows
                    .iter()
                    .enumerate()
                    .map(|(i, row)| format!("({})", placeholders(row.len(), 1 + i * columns.len())))
                    .collect();
                write!(
                    f,
                    "INSERT INTO {} ({}) VALUES {}",
                    table,
                    columns.join(", "),
                    values.join(", ")
                )
            }
            Statement::Upsert {
                table,
                columns,
                row,
                conflict_columns,
                update_columns,
            } => {
                let updates: Vec<String> = update_columns
                    .iter()
                    .map(|column| format!("{0} = EXCLUDED.{0}", column))
                    .collect();
                write!(
                    f,
                    "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
                    table,
                    columns.join(", "),
                    placeholders(row.len(), 1),
                    conflict_columns.join(", "),
                    updates.join(", ")
                )
            }
            Statement::Update {
                table,
                assignments,
                filter,
            } => {
                let sets: Vec<String> = assignments
                    .iter()
                    .enumerate()
                    .map(|(i, assignment)| match assignment {
                        Assignment::Set(column, _) => format!("{} = ${}", column, i + 1),
                        Assignment::JsonSet { column, path, .. } => format!(
                            "{0} = json_set({0}, '{{{1}}}', ${2})",
                            column,
                            path.join(","),
                            i + 1
                        ),
                    })
                    .collect();
                write!(f, "UPDATE {} SET {}", table, sets.join(", "))?;
                write_where(f, filter, assignments.len() + 1)
            }
            Statement::Delete {
                table,
                filter,
                skip_referenced,
            } => {
                write!(f, "DELETE FROM {}", table)?;
                write_where(f, filter, 1)?;
                if *skip_referenced {
                    write!(f, " SKIP REFERENCED")?;
                }
                Ok(())
            }
            Statement::Select {
                table,
                columns,
                filter,
            } => {
                let projection = if columns.is_empty() {
                    "*".to_string()
                } else {
                    columns.join(", ")
                };
                write!(f, "SELECT {} FROM {}", projection, table)?;
                write_where(f, filter, 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_renders_placeholders_per_row() {
        let stmt = Statement::insert_many(
            "role_has_permissions",
            &["role_id", "permission"],
            vec![
                vec![Value::from("admin"), Value::from("can_add_peer")],
                vec![Value::from("admin"), Value::from("can_create_role")],
            ],
        );
        assert_eq!(
            stmt.to_string(),
            "INSERT INTO role_has_permissions (role_id, permission) VALUES ($1, $2), ($3, $4)"
        );
        assert_eq!(stmt.params().len(), 4);
    }

    #[test]
    fn test_update_numbers_filter_after_assignments() {
        let stmt = Statement::update(
            "account",
            vec![Assignment::JsonSet {
                column: "data".to_string(),
                path: vec!["admin@test".to_string(), "email".to_string()],
                value: Value::from("a@b.c"),
            }],
            Filter::new().eq("account_id", "alice@test"),
        );
        assert_eq!(
            stmt.to_string(),
            "UPDATE account SET data = json_set(data, '{admin@test,email}', $1) WHERE account_id = $2"
        );
    }

    #[test]
    fn test_upsert_and_delete_rendering() {
        let upsert = Statement::upsert(
            "account_has_asset",
            &["account_id", "asset_id", "amount"],
            vec![Value::from("a"), Value::from("b"), Value::from("c")],
            &["account_id", "asset_id"],
            &["amount"],
        );
        assert_eq!(
            upsert.to_string(),
            "INSERT INTO account_has_asset (account_id, asset_id, amount) VALUES ($1, $2, $3) \
             ON CONFLICT (account_id, asset_id) DO UPDATE SET amount = EXCLUDED.amount"
        );

        let delete =
            Statement::delete_unreferenced("signatory", Filter::new().eq("public_key", vec![1u8]));
        assert_eq!(
            delete.to_string(),
            "DELETE FROM signatory WHERE public_key = $1 SKIP REFERENCED"
        );
        assert!(!delete.is_read_only());
        assert_eq!(delete.table(), "signatory");
    }

    #[test]
    fn test_select_star() {
        let stmt = Statement::select("peer", &[], Filter::new());
        assert_eq!(stmt.to_string(), "SELECT * FROM peer");
        assert!(stmt.is_read_only());
    }
}
