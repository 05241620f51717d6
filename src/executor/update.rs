use super::dml::matching_rows;
use super::{Assignment, ExecutionContext, Executor, Statement};
use crate::core::{DbError, Result, Value};
use crate::result::QueryResult;
use crate::transaction::Change;
use serde_json::{Map, Value as JsonValue};

pub struct UpdateExecutor;

impl Executor for UpdateExecutor {
    fn name(&self) -> &'static str {
        "UPDATE"
    }

    fn can_handle(&self, stmt: &Statement) -> bool {
        matches!(stmt, Statement::Update { .. })
    }

    fn execute(&self, stmt: &Statement, ctx: &mut ExecutionContext<'_>) -> Result<QueryResult> {
        let Statement::Update {
            table,
            assignments,
            filter,
        } = stmt
        else {
            return Err(DbError::ExecutionError("Expected UPDATE statement".into()));
        };

        let schema = ctx.table_schema(table)?;
        let targets = assignments
            .iter()
            .map(|assignment| {
                schema
                    .schema()
                    .find_column_index(assignment.column())
                    .map(|idx| (idx, assignment))
                    .ok_or_else(|| {
                        DbError::ColumnNotFound(assignment.column().to_string(), table.clone())
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut updates = Vec::new();
        for (row_id, mut row) in matching_rows(ctx, table, filter)? {
            for (idx, assignment) in &targets {
                row[*idx] = match assignment {
                    Assignment::Set(_, value) => value.clone(),
                    Assignment::JsonSet { path, value, .. } => json_set(&row[*idx], path, value)?,
                };
            }
            updates.push((row_id, row));
        }

        let touches_reference = schema.foreign_keys().iter().any(|foreign_key| {
            targets
                .iter()
                .any(|(_, assignment)| foreign_key.columns.iter().any(|c| c == assignment.column()))
        });

        let updated = ctx.write_then_check(
            table,
            |storage, snapshot, current, changes| {
                for (row_id, row) in &updates {
                    if storage.update(*row_id, row.clone(), snapshot, current)? {
                        changes.push(Change::UpdateRow {
                            table: table.clone(),
                            row_id: *row_id,
                        });
                    }
                }
                Ok(changes.len())
            },
            |ctx| {
                if !touches_reference {
                    return Ok(());
                }
                updates
                    .iter()
                    .try_for_each(|(_, row)| ctx.check_foreign_keys(schema, row))
            },
        )?;

        Ok(QueryResult::affected(updated))
    }
}

/// Write `value` at `path` inside a JSON document. Missing or non-object
/// steps along the path are replaced by objects; the last write wins.
pub fn json_set(document: &Value, path: &[String], value: &Value) -> Result<Value> {
    let mut root = match document {
        Value::Json(json) => json.clone(),
        Value::Null => JsonValue::Object(Map::new()),
        other => {
            return Err(DbError::TypeMismatch(format!(
                "json_set needs a JSON column, found {}",
                other.type_name()
            )));
        }
    };

    let Some((last, parents)) = path.split_last() else {
        return Ok(Value::Json(to_json(value)));
    };

    let mut node = &mut root;
    for step in parents {
        node = object_entry(node, step);
    }
    *object_entry(node, last) = to_json(value);

    Ok(Value::Json(root))
}

fn object_entry<'j>(node: &'j mut JsonValue, key: &str) -> &'j mut JsonValue {
    if !node.is_object() {
        *node = JsonValue::Object(Map::new());
    }
    &mut node[key]
}

fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Integer(i) => JsonValue::from(*i),
        Value::Text(s) => JsonValue::String(s.clone()),
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Bytes(bytes) => JsonValue::String(hex::encode(bytes)),
        Value::Decimal(d) => JsonValue::String(d.to_string()),
        Value::Json(json) => json.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(steps: &[&str]) -> Vec<String> {
        steps.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_json_set_creates_intermediate_objects() {
        let doc = Value::Json(json!({}));
        let out = json_set(&doc, &path(&["admin@test", "email"]), &Value::from("a@b.c")).unwrap();
        assert_eq!(out, Value::Json(json!({"admin@test": {"email": "a@b.c"}})));
    }

    #[test]
    fn test_json_set_last_write_wins_and_keeps_siblings() {
        let doc = Value::Json(json!({"admin@test": {"email": "old", "age": "30"}}));
        let out = json_set(&doc, &path(&["admin@test", "email"]), &Value::from("new")).unwrap();
        assert_eq!(
            out,
            Value::Json(json!({"admin@test": {"email": "new", "age": "30"}}))
        );
    }

    #[test]
    fn test_json_set_on_null_and_on_text() {
        let out = json_set(&Value::Null, &path(&["k"]), &Value::from(1i64)).unwrap();
        assert_eq!(out, Value::Json(json!({"k": 1})));

        let err = json_set(&Value::from("text"), &path(&["k"]), &Value::Null).unwrap_err();
        assert!(matches!(err, DbError::TypeMismatch(_)));
    }
}
