use crate::wsv::{AccountId, AssetId, DomainId, PermissionName, PublicKey, RoleId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One state change requested by a ledger transaction.
///
/// In JSON each command is an object tagged by `"type"`, e.g.
/// `{"type": "create_role", "role_name": "admin", "permissions": []}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    CreateRole {
        role_name: RoleId,
        #[serde(default)]
        permissions: BTreeSet<PermissionName>,
    },
    AppendRole {
        account_id: AccountId,
        role_name: RoleId,
    },
    DetachRole {
        account_id: AccountId,
        role_name: RoleId,
    },
    CreateDomain {
        domain_id: DomainId,
        default_role: RoleId,
    },
    /// Creates `<account_name>@<domain_id>` with quorum 1, `public_key` as
    /// its only signatory and the domain's default role.
    CreateAccount {
        account_name: String,
        domain_id: DomainId,
        public_key: PublicKey,
    },
    SetQuorum {
        account_id: AccountId,
        quorum: u32,
    },
    /// Stored under the transaction creator's name in the account metadata
    SetAccountDetail {
        account_id: AccountId,
        key: String,
        value: String,
    },
    /// Creates `<asset_name>#<domain_id>`
    CreateAsset {
        asset_name: String,
        domain_id: DomainId,
        precision: u8,
    },
    AddAssetQuantity {
        account_id: AccountId,
        asset_id: AssetId,
        amount: Decimal,
    },
    TransferAsset {
        src_account_id: AccountId,
        dest_account_id: AccountId,
        asset_id: AssetId,
        amount: Decimal,
    },
    AddSignatory {
        account_id: AccountId,
        public_key: PublicKey,
    },
    RemoveSignatory {
        account_id: AccountId,
        public_key: PublicKey,
    },
    AddPeer {
        address: String,
        public_key: PublicKey,
    },
    RemovePeer {
        address: String,
        public_key: PublicKey,
    },
    /// The creator grants `permission` over itself to `account_id`
    GrantPermission {
        account_id: AccountId,
        permission: PermissionName,
    },
    RevokePermission {
        account_id: AccountId,
        permission: PermissionName,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::CreateRole { .. } => "CreateRole",
            Command::AppendRole { .. } => "AppendRole",
            Command::DetachRole { .. } => "DetachRole",
            Command::CreateDomain { .. } => "CreateDomain",
            Command::CreateAccount { .. } => "CreateAccount",
            Command::SetQuorum { .. } => "SetQuorum",
            Command::SetAccountDetail { .. } => "SetAccountDetail",
            Command::CreateAsset { .. } => "CreateAsset",
            Command::AddAssetQuantity { .. } => "AddAssetQuantity",
            Command::TransferAsset { .. } => "TransferAsset",
            Command::AddSignatory { .. } => "AddSignatory",
            Command::RemoveSignatory { .. } => "RemoveSignatory",
            Command::AddPeer { .. } => "AddPeer",
            Command::RemovePeer { .. } => "RemovePeer",
            Command::GrantPermission { .. } => "GrantPermission",
            Command::RevokePermission { .. } => "RevokePermission",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [", self.name())?;
        match self {
            Command::CreateRole {
                role_name,
                permissions,
            } => {
                let permissions: Vec<&str> = permissions.iter().map(String::as_str).collect();
                write!(
                    f,
                    "role_name={}, permissions=[{}]",
                    role_name,
                    permissions.join(", ")
                )?
            }
            Command::AppendRole {
                account_id,
                role_name,
            }
            | Command::DetachRole {
                account_id,
                role_name,
            } => write!(f, "account_id={}, role_name={}", account_id, role_name)?,
            Command::CreateDomain {
                domain_id,
                default_role,
            } => write!(f, "domain_id={}, default_role={}", domain_id, default_role)?,
            Command::CreateAccount {
                account_name,
                domain_id,
                public_key,
            } => write!(
                f,
                "account_name={}, domain_id={}, public_key={}",
                account_name, domain_id, public_key
            )?,
            Command::SetQuorum { account_id, quorum } => {
                write!(f, "account_id={}, quorum={}", account_id, quorum)?
            }
            Command::SetAccountDetail {
                account_id,
                key,
                value,
            } => write!(f, "account_id={}, key={}, value={}", account_id, key, value)?,
            Command::CreateAsset {
                asset_name,
                domain_id,
                precision,
            } => write!(
                f,
                "asset_name={}, domain_id={}, precision={}",
                asset_name, domain_id, precision
            )?,
            Command::AddAssetQuantity {
                account_id,
                asset_id,
                amount,
            } => write!(
                f,
                "account_id={}, asset_id={}, amount={}",
                account_id, asset_id, amount
            )?,
            Command::TransferAsset {
                src_account_id,
                dest_account_id,
                asset_id,
                amount,
            } => write!(
                f,
                "src_account_id={}, dest_account_id={}, asset_id={}, amount={}",
                src_account_id, dest_account_id, asset_id, amount
            )?,
            Command::AddSignatory {
                account_id,
                public_key,
            }
            | Command::RemoveSignatory {
                account_id,
                public_key,
            } => write!(f, "account_id={}, public_key={}", account_id, public_key)?,
            Command::AddPeer {
                address,
                public_key,
            }
            | Command::RemovePeer {
                address,
                public_key,
            } => write!(f, "address={}, public_key={}", address, public_key)?,
            Command::GrantPermission {
                account_id,
                permission,
            }
            | Command::RevokePermission {
                account_id,
                permission,
            } => write!(f, "account_id={}, permission={}", account_id, permission)?,
        }
        write!(f, "]")
    }
}
