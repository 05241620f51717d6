//! Relational layout of the world state, parents before children.

use crate::core::{Column, DataType, ForeignKey};
use crate::storage::TableSchema;

pub const ROLE: &str = "role";
pub const DOMAIN: &str = "domain";
pub const SIGNATORY: &str = "signatory";
pub const ACCOUNT: &str = "account";
pub const ACCOUNT_HAS_SIGNATORY: &str = "account_has_signatory";
pub const PEER: &str = "peer";
pub const ASSET: &str = "asset";
pub const ACCOUNT_HAS_ASSET: &str = "account_has_asset";
pub const ROLE_HAS_PERMISSIONS: &str = "role_has_permissions";
pub const ACCOUNT_HAS_ROLES: &str = "account_has_roles";
pub const ACCOUNT_HAS_GRANTABLE_PERMISSIONS: &str = "account_has_grantable_permissions";

fn text(name: &str) -> Column {
    Column::new(name, DataType::Text).not_null()
}

pub fn tables() -> Vec<TableSchema> {
    vec![
        TableSchema::new(ROLE, vec![text("role_id")]).with_primary_key(&["role_id"]),
        TableSchema::new(DOMAIN, vec![text("domain_id"), text("default_role")])
            .with_primary_key(&["domain_id"])
            .with_foreign_key(ForeignKey::new(&["default_role"], ROLE, &["role_id"])),
        TableSchema::new(
            SIGNATORY,
            vec![Column::new("public_key", DataType::Bytes).not_null()],
        )
        .with_primary_key(&["public_key"]),
        TableSchema::new(
            ACCOUNT,
            vec![
                text("account_id"),
                text("domain_id"),
                Column::new("quorum", DataType::Integer).not_null(),
                Column::new("data", DataType::Json).not_null(),
            ],
        )
        .with_primary_key(&["account_id"])
        .with_foreign_key(ForeignKey::new(&["domain_id"], DOMAIN, &["domain_id"])),
        TableSchema::new(
            ACCOUNT_HAS_SIGNATORY,
            vec![
                text("account_id"),
                Column::new("public_key", DataType::Bytes).not_null(),
            ],
        )
        .with_primary_key(&["account_id", "public_key"])
        .with_foreign_key(ForeignKey::new(&["account_id"], ACCOUNT, &["account_id"]))
        .with_foreign_key(ForeignKey::new(&["public_key"], SIGNATORY, &["public_key"])),
        TableSchema::new(
            PEER,
            vec![
                Column::new("public_key", DataType::Bytes).not_null(),
                text("address"),
            ],
        )
        .with_primary_key(&["public_key"])
        .with_unique(&["address"]),
        TableSchema::new(
            ASSET,
            vec![
                text("asset_id"),
                text("domain_id"),
                Column::new("precision", DataType::Integer).not_null(),
            ],
        )
        .with_primary_key(&["asset_id"])
        .with_foreign_key(ForeignKey::new(&["domain_id"], DOMAIN, &["domain_id"])),
        TableSchema::new(
            ACCOUNT_HAS_ASSET,
            vec![
                text("account_id"),
                text("asset_id"),
                Column::new("amount", DataType::Decimal).not_null(),
            ],
        )
        .with_primary_key(&["account_id", "asset_id"])
        .with_foreign_key(ForeignKey::new(&["account_id"], ACCOUNT, &["account_id"]))
        .with_foreign_key(ForeignKey::new(&["asset_id"], ASSET, &["asset_id"])),
        TableSchema::new(ROLE_HAS_PERMISSIONS, vec![text("role_id"), text("permission")])
            .with_primary_key(&["role_id", "permission"])
            .with_foreign_key(ForeignKey::new(&["role_id"], ROLE, &["role_id"])),
        TableSchema::new(ACCOUNT_HAS_ROLES, vec![text("account_id"), text("role_id")])
            .with_primary_key(&["account_id", "role_id"])
            .with_foreign_key(ForeignKey::new(&["account_id"], ACCOUNT, &["account_id"]))
            .with_foreign_key(ForeignKey::new(&["role_id"], ROLE, &["role_id"])),
        TableSchema::new(
            ACCOUNT_HAS_GRANTABLE_PERMISSIONS,
            vec![
                text("permittee_account_id"),
                text("account_id"),
                text("permission"),
            ],
        )
        .with_primary_key(&["permittee_account_id", "account_id", "permission"])
        .with_foreign_key(ForeignKey::new(
            &["permittee_account_id"],
            ACCOUNT,
            &["account_id"],
        ))
        .with_foreign_key(ForeignKey::new(&["account_id"], ACCOUNT, &["account_id"])),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Catalog;

    #[test]
    fn test_schema_builds_a_valid_catalog() {
        let mut catalog = Catalog::new();
        for table in tables() {
            catalog = catalog.with_table(table).unwrap();
        }
        assert_eq!(catalog.list_tables().len(), 11);

        let referencing: Vec<&str> = catalog
            .referencing(SIGNATORY)
            .into_iter()
            .map(|(schema, _)| schema.name())
            .collect();
        assert_eq!(referencing, vec![ACCOUNT_HAS_SIGNATORY]);
    }
}
