use super::error::WsvResult;
use super::model::{
    Account, AccountAsset, AccountId, Asset, Domain, Peer, PermissionName, PublicKey, RoleId,
};
use crate::facade::TransactionScope;
use std::collections::BTreeSet;

/// Mutations of the world state view.
///
/// Each call runs its statements in `scope` and reports the outcome; it
/// never commits, rolls back or retries. A failed call leaves the scope as
/// it was before the call.
pub trait WsvCommand {
    fn insert_role(&self, scope: &mut dyn TransactionScope, role_name: &str) -> WsvResult;

    fn insert_account_role(
        &self,
        scope: &mut dyn TransactionScope,
        account_id: &str,
        role_name: &str,
    ) -> WsvResult;

    fn delete_account_role(
        &self,
        scope: &mut dyn TransactionScope,
        account_id: &str,
        role_name: &str,
    ) -> WsvResult;

    /// All permissions are added in one statement; an empty set is a no-op.
    fn insert_role_permissions(
        &self,
        scope: &mut dyn TransactionScope,
        role_id: &RoleId,
        permissions: &BTreeSet<PermissionName>,
    ) -> WsvResult;

    fn insert_account(&self, scope: &mut dyn TransactionScope, account: &Account) -> WsvResult;

    /// Replace quorum and metadata of an existing account.
    fn update_account(&self, scope: &mut dyn TransactionScope, account: &Account) -> WsvResult;

    /// Store `value` under `key` in the metadata `creator_account_id` keeps
    /// on `account_id`. Last write wins.
    fn set_account_kv(
        &self,
        scope: &mut dyn TransactionScope,
        account_id: &AccountId,
        creator_account_id: &AccountId,
        key: &str,
        value: &str,
    ) -> WsvResult;

    fn insert_asset(&self, scope: &mut dyn TransactionScope, asset: &Asset) -> WsvResult;

    /// Create the balance row or overwrite its amount, atomically.
    fn upsert_account_asset(
        &self,
        scope: &mut dyn TransactionScope,
        asset: &AccountAsset,
    ) -> WsvResult;

    fn insert_signatory(&self, scope: &mut dyn TransactionScope, signatory: &PublicKey)
    -> WsvResult;

    fn insert_account_signatory(
        &self,
        scope: &mut dyn TransactionScope,
        account_id: &AccountId,
        signatory: &PublicKey,
    ) -> WsvResult;

    fn delete_account_signatory(
        &self,
        scope: &mut dyn TransactionScope,
        account_id: &AccountId,
        signatory: &PublicKey,
    ) -> WsvResult;

    /// Remove the key unless an account still uses it.
    fn delete_signatory(&self, scope: &mut dyn TransactionScope, signatory: &PublicKey)
    -> WsvResult;

    fn insert_peer(&self, scope: &mut dyn TransactionScope, peer: &Peer) -> WsvResult;

    /// Matches on both key and address.
    fn delete_peer(&self, scope: &mut dyn TransactionScope, peer: &Peer) -> WsvResult;

    fn insert_domain(&self, scope: &mut dyn TransactionScope, domain: &Domain) -> WsvResult;

    fn insert_account_grantable_permission(
        &self,
        scope: &mut dyn TransactionScope,
        permittee_account_id: &AccountId,
        account_id: &AccountId,
        permission_id: &PermissionName,
    ) -> WsvResult;

    fn delete_account_grantable_permission(
        &self,
        scope: &mut dyn TransactionScope,
        permittee_account_id: &AccountId,
        account_id: &AccountId,
        permission_id: &PermissionName,
    ) -> WsvResult;
}
