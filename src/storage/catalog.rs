use super::TableSchema;
use crate::core::{DbError, ForeignKey, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Table metadata, immutable once built.
///
/// Adding a table returns a new `Catalog` (Copy-on-Write), so a clone can be
/// handed to readers without locks.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    tables: Arc<HashMap<String, TableSchema>>,
    // declaration order, used for deterministic checkpoints and dumps
    order: Arc<Vec<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table. Every foreign key must point at a table already present
    /// (or at the table itself) and at columns that exist there.
    pub fn with_table(self, schema: TableSchema) -> Result<Self> {
        let name = schema.name().to_string();

        if self.tables.contains_key(&name) {
            return Err(DbError::TableExists(name));
        }

        schema.validate()?;
        for foreign_key in schema.foreign_keys() {
            let target = if foreign_key.table == name {
                &schema
            } else {
                self.get_table(&foreign_key.table)?
            };
            target.column_indexes(&foreign_key.referenced_columns)?;
        }

        let mut new_tables = (*self.tables).clone();
        new_tables.insert(name.clone(), schema);
        let mut new_order = (*self.order).clone();
        new_order.push(name);

        Ok(Self {
            tables: Arc::new(new_tables),
            order: Arc::new(new_order),
        })
    }

    pub fn get_table(&self, name: &str) -> Result<&TableSchema> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Table names in declaration order.
    pub fn list_tables(&self) -> &[String] {
        &self.order
    }

    /// Every foreign key, across all tables, that points at `table`.
    pub fn referencing(&self, table: &str) -> Vec<(&TableSchema, &ForeignKey)> {
        self.order
            .iter()
            .filter_map(|name| self.tables.get(name))
            .flat_map(|schema| {
                schema
                    .foreign_keys()
                    .iter()
                    .filter(move |fk| fk.table == table)
                    .map(move |fk| (schema, fk))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};

    fn domain() -> TableSchema {
        TableSchema::new("domain", vec![Column::new("domain_id", DataType::Text).not_null()])
            .with_primary_key(&["domain_id"])
    }

    fn account() -> TableSchema {
        TableSchema::new(
            "account",
            vec![
                Column::new("account_id", DataType::Text).not_null(),
                Column::new("domain_id", DataType::Text).not_null(),
            ],
        )
        .with_primary_key(&["account_id"])
        .with_foreign_key(ForeignKey::new(&["domain_id"], "domain", &["domain_id"]))
    }

    #[test]
    fn test_catalog_copy_on_write() {
        let empty = Catalog::new();
        let with_domain = empty.clone().with_table(domain()).unwrap();
        assert!(!empty.table_exists("domain"));
        assert!(with_domain.table_exists("domain"));
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let catalog = Catalog::new().with_table(domain()).unwrap();
        assert!(matches!(catalog.with_table(domain()), Err(DbError::TableExists(_))));
    }

    #[test]
    fn test_foreign_key_target_must_exist() {
        let err = Catalog::new().with_table(account()).unwrap_err();
        assert!(matches!(err, DbError::TableNotFound(name) if name == "domain"));
    }

    #[test]
    fn test_referencing_lists_children() {
        let catalog = Catalog::new()
            .with_table(domain())
            .unwrap()
            .with_table(account())
            .unwrap();
        let refs = catalog.referencing("domain");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].0.name(), "account");
        assert_eq!(
            catalog.list_tables().to_vec(),
            vec!["domain".to_string(), "account".to_string()]
        );
    }
}
