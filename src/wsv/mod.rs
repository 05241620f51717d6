// ============================================================================
// World State View Commands
// ============================================================================
//
// Ledger mutations (roles, accounts, assets, signatories, peers, domains,
// grantable permissions) mapped onto statements over the world state
// schema, with failures classified into `WsvError`.
//
// ============================================================================

pub mod command;
pub mod error;
pub mod model;
pub mod schema;
pub mod store_command;

pub use crate::facade::TransactionScope;
pub use command::WsvCommand;
pub use error::{Operation, WsvError, WsvResult};
pub use model::{
    Account, AccountAsset, AccountId, Asset, AssetId, Domain, DomainId, Peer, PermissionName,
    PublicKey, RoleId,
};
pub use store_command::{DeletePolicy, StoreWsvCommand};
