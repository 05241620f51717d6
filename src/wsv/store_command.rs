use super::command::WsvCommand;
use super::error::{Operation, WsvError, WsvResult};
use super::model::{
    Account, AccountAsset, AccountId, Asset, Domain, Peer, PermissionName, PublicKey, RoleId,
};
use super::schema;
use crate::config::StoreConfig;
use crate::core::Value;
use crate::executor::{Assignment, Filter, Statement};
use crate::facade::TransactionScope;
use std::collections::BTreeSet;
use tracing::warn;

/// How delete and revoke operations treat a row that is not there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Zero matching rows is success
    #[default]
    Idempotent,
    /// Zero matching rows is `WsvError::NotFound`
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Any,
    AtLeastOne,
}

/// [`WsvCommand`] over the relational world state schema.
#[derive(Debug, Clone, Default)]
pub struct StoreWsvCommand {
    delete_policy: DeletePolicy,
}

impl StoreWsvCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delete_policy(delete_policy: DeletePolicy) -> Self {
        Self { delete_policy }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::with_delete_policy(config.delete_policy)
    }

    pub fn delete_policy(&self) -> DeletePolicy {
        self.delete_policy
    }

    fn delete_expectation(&self) -> Expect {
        match self.delete_policy {
            DeletePolicy::Idempotent => Expect::Any,
            DeletePolicy::Strict => Expect::AtLeastOne,
        }
    }

    /// Run one statement and classify the outcome. `target` names the
    /// identifiers involved and is only evaluated when the call fails.
    fn execute(
        &self,
        scope: &mut dyn TransactionScope,
        statement: Statement,
        expect: Expect,
        operation: Operation,
        target: impl FnOnce() -> String,
    ) -> WsvResult {
        let error = match scope.execute(&statement) {
            Ok(result) if expect == Expect::AtLeastOne && result.affected_rows == 0 => {
                WsvError::NotFound {
                    operation,
                    target: target(),
                    detail: format!("no matching row in '{}'", statement.table()),
                }
            }
            Ok(_) => return Ok(()),
            Err(err) => WsvError::from_db(operation, target(), &err),
        };

        warn!(
            txn = %scope.id(),
            operation = %operation,
            target = error.target(),
            retryable = error.is_retryable(),
            "{}",
            error.detail()
        );
        Err(error)
    }
}

fn pair(first: &str, second: &str) -> String {
    format!("({}, {})", first, second)
}

fn key(public_key: &PublicKey) -> Value {
    Value::Bytes(public_key.as_bytes().to_vec())
}

impl WsvCommand for StoreWsvCommand {
    fn insert_role(&self, scope: &mut dyn TransactionScope, role_name: &str) -> WsvResult {
        self.execute(
            scope,
            Statement::insert(schema::ROLE, &["role_id"], vec![Value::from(role_name)]),
            Expect::Any,
            Operation::InsertRole,
            || role_name.to_string(),
        )
    }

    fn insert_account_role(
        &self,
        scope: &mut dyn TransactionScope,
        account_id: &str,
        role_name: &str,
    ) -> WsvResult {
        self.execute(
            scope,
            Statement::insert(
                schema::ACCOUNT_HAS_ROLES,
                &["account_id", "role_id"],
                vec![Value::from(account_id), Value::from(role_name)],
            ),
            Expect::Any,
            Operation::InsertAccountRole,
            || pair(account_id, role_name),
        )
    }

    fn delete_account_role(
        &self,
        scope: &mut dyn TransactionScope,
        account_id: &str,
        role_name: &str,
    ) -> WsvResult {
        self.execute(
            scope,
            Statement::delete(
                schema::ACCOUNT_HAS_ROLES,
                Filter::new()
                    .eq("account_id", account_id)
                    .eq("role_id", role_name),
            ),
            self.delete_expectation(),
            Operation::DeleteAccountRole,
            || pair(account_id, role_name),
        )
    }

    fn insert_role_permissions(
        &self,
        scope: &mut dyn TransactionScope,
        role_id: &RoleId,
        permissions: &BTreeSet<PermissionName>,
    ) -> WsvResult {
        if permissions.is_empty() {
            return Ok(());
        }

        let rows = permissions
            .iter()
            .map(|permission| vec![Value::from(role_id.as_str()), Value::from(permission.as_str())])
            .collect();
        self.execute(
            scope,
            Statement::insert_many(schema::ROLE_HAS_PERMISSIONS, &["role_id", "permission"], rows),
            Expect::Any,
            Operation::InsertRolePermissions,
            || {
                let names: Vec<&str> = permissions.iter().map(String::as_str).collect();
                format!("{} [{}]", role_id, names.join(", "))
            },
        )
    }

    fn insert_account(&self, scope: &mut dyn TransactionScope, account: &Account) -> WsvResult {
        self.execute(
            scope,
            Statement::insert(
                schema::ACCOUNT,
                &["account_id", "domain_id", "quorum", "data"],
                vec![
                    Value::from(account.account_id.as_str()),
                    Value::from(account.domain_id.as_str()),
                    Value::Integer(i64::from(account.quorum)),
                    Value::Json(account.json_data.clone()),
                ],
            ),
            Expect::Any,
            Operation::InsertAccount,
            || account.account_id.clone(),
        )
    }

    fn update_account(&self, scope: &mut dyn TransactionScope, account: &Account) -> WsvResult {
        self.execute(
            scope,
            Statement::update(
                schema::ACCOUNT,
                vec![
                    Assignment::set("quorum", i64::from(account.quorum)),
                    Assignment::set("data", account.json_data.clone()),
                ],
                Filter::new().eq("account_id", account.account_id.as_str()),
            ),
            Expect::AtLeastOne,
            Operation::UpdateAccount,
            || account.account_id.clone(),
        )
    }

    fn set_account_kv(
        &self,
        scope: &mut dyn TransactionScope,
        account_id: &AccountId,
        creator_account_id: &AccountId,
        key: &str,
        value: &str,
    ) -> WsvResult {
        self.execute(
            scope,
            Statement::update(
                schema::ACCOUNT,
                vec![Assignment::JsonSet {
                    column: "data".to_string(),
                    path: vec![creator_account_id.clone(), key.to_string()],
                    value: Value::from(value),
                }],
                Filter::new().eq("account_id", account_id.as_str()),
            ),
            Expect::AtLeastOne,
            Operation::SetAccountKv,
            || format!("{} {}/{}", account_id, creator_account_id, key),
        )
    }

    fn insert_asset(&self, scope: &mut dyn TransactionScope, asset: &Asset) -> WsvResult {
        self.execute(
            scope,
            Statement::insert(
                schema::ASSET,
                &["asset_id", "domain_id", "precision"],
                vec![
                    Value::from(asset.asset_id.as_str()),
                    Value::from(asset.domain_id.as_str()),
                    Value::Integer(i64::from(asset.precision)),
                ],
            ),
            Expect::Any,
            Operation::InsertAsset,
            || asset.asset_id.clone(),
        )
    }

    fn upsert_account_asset(
        &self,
        scope: &mut dyn TransactionScope,
        asset: &AccountAsset,
    ) -> WsvResult {
        self.execute(
            scope,
            Statement::upsert(
                schema::ACCOUNT_HAS_ASSET,
                &["account_id", "asset_id", "amount"],
                vec![
                    Value::from(asset.account_id.as_str()),
                    Value::from(asset.asset_id.as_str()),
                    Value::Decimal(asset.balance),
                ],
                &["account_id", "asset_id"],
                &["amount"],
            ),
            Expect::Any,
            Operation::UpsertAccountAsset,
            || pair(&asset.account_id, &asset.asset_id),
        )
    }

    fn insert_signatory(
        &self,
        scope: &mut dyn TransactionScope,
        signatory: &PublicKey,
    ) -> WsvResult {
        self.execute(
            scope,
            Statement::insert(schema::SIGNATORY, &["public_key"], vec![key(signatory)]),
            Expect::Any,
            Operation::InsertSignatory,
            || signatory.to_string(),
        )
    }

    fn insert_account_signatory(
        &self,
        scope: &mut dyn TransactionScope,
        account_id: &AccountId,
        signatory: &PublicKey,
    ) -> WsvResult {
        self.execute(
            scope,
            Statement::insert(
                schema::ACCOUNT_HAS_SIGNATORY,
                &["account_id", "public_key"],
                vec![Value::from(account_id.as_str()), key(signatory)],
            ),
            Expect::Any,
            Operation::InsertAccountSignatory,
            || pair(account_id, &signatory.to_string()),
        )
    }

    fn delete_account_signatory(
        &self,
        scope: &mut dyn TransactionScope,
        account_id: &AccountId,
        signatory: &PublicKey,
    ) -> WsvResult {
        self.execute(
            scope,
            Statement::delete(
                schema::ACCOUNT_HAS_SIGNATORY,
                Filter::new()
                    .eq("account_id", account_id.as_str())
                    .eq("public_key", key(signatory)),
            ),
            self.delete_expectation(),
            Operation::DeleteAccountSignatory,
            || pair(account_id, &signatory.to_string()),
        )
    }

    fn delete_signatory(
        &self,
        scope: &mut dyn TransactionScope,
        signatory: &PublicKey,
    ) -> WsvResult {
        self.execute(
            scope,
            Statement::delete_unreferenced(
                schema::SIGNATORY,
                Filter::new().eq("public_key", key(signatory)),
            ),
            self.delete_expectation(),
            Operation::DeleteSignatory,
            || signatory.to_string(),
        )
    }

    fn insert_peer(&self, scope: &mut dyn TransactionScope, peer: &Peer) -> WsvResult {
        self.execute(
            scope,
            Statement::insert(
                schema::PEER,
                &["public_key", "address"],
                vec![key(&peer.public_key), Value::from(peer.address.as_str())],
            ),
            Expect::Any,
            Operation::InsertPeer,
            || pair(&peer.address, &peer.public_key.to_string()),
        )
    }

    fn delete_peer(&self, scope: &mut dyn TransactionScope, peer: &Peer) -> WsvResult {
        self.execute(
            scope,
            Statement::delete(
                schema::PEER,
                Filter::new()
                    .eq("public_key", key(&peer.public_key))
                    .eq("address", peer.address.as_str()),
            ),
            self.delete_expectation(),
            Operation::DeletePeer,
            || pair(&peer.address, &peer.public_key.to_string()),
        )
    }

    fn insert_domain(&self, scope: &mut dyn TransactionScope, domain: &Domain) -> WsvResult {
        self.execute(
            scope,
            Statement::insert(
                schema::DOMAIN,
                &["domain_id", "default_role"],
                vec![
                    Value::from(domain.domain_id.as_str()),
                    Value::from(domain.default_role.as_str()),
                ],
            ),
            Expect::Any,
            Operation::InsertDomain,
            || domain.domain_id.clone(),
        )
    }

    fn insert_account_grantable_permission(
        &self,
        scope: &mut dyn TransactionScope,
        permittee_account_id: &AccountId,
        account_id: &AccountId,
        permission_id: &PermissionName,
    ) -> WsvResult {
        self.execute(
            scope,
            Statement::insert(
                schema::ACCOUNT_HAS_GRANTABLE_PERMISSIONS,
                &["permittee_account_id", "account_id", "permission"],
                vec![
                    Value::from(permittee_account_id.as_str()),
                    Value::from(account_id.as_str()),
                    Value::from(permission_id.as_str()),
                ],
            ),
            Expect::Any,
            Operation::InsertAccountGrantablePermission,
            || format!("{} to {} over {}", permission_id, permittee_account_id, account_id),
        )
    }

    fn delete_account_grantable_permission(
        &self,
        scope: &mut dyn TransactionScope,
        permittee_account_id: &AccountId,
        account_id: &AccountId,
        permission_id: &PermissionName,
    ) -> WsvResult {
        self.execute(
            scope,
            Statement::delete(
                schema::ACCOUNT_HAS_GRANTABLE_PERMISSIONS,
                Filter::new()
                    .eq("permittee_account_id", permittee_account_id.as_str())
                    .eq("account_id", account_id.as_str())
                    .eq("permission", permission_id.as_str()),
            ),
            self.delete_expectation(),
            Operation::DeleteAccountGrantablePermission,
            || format!("{} from {} over {}", permission_id, permittee_account_id, account_id),
        )
    }
}
