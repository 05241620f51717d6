// ============================================================================
// Ledger State Machine
// ============================================================================
//
// Applies proposals to the world state: one scope per ledger transaction,
// commit when every command succeeds, roll back on the first failure.
// Failures the store reports as transient are re-run in a fresh scope.
//
// ============================================================================

use super::{ApplyError, Command, Proposal, Transaction};
use crate::config::StoreConfig;
use crate::core::{DbError, Row, Value};
use crate::executor::{Filter, Statement};
use crate::facade::{TransactionScope, WorldStateDb};
use crate::wsv::{
    Account, AccountAsset, Asset, Domain, Peer, StoreWsvCommand, WsvCommand, WsvError, schema,
};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionOutcome {
    Committed { attempts: u32 },
    Rejected { error: ApplyError, attempts: u32 },
}

impl TransactionOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TransactionOutcome::Committed { .. })
    }

    pub fn error(&self) -> Option<&ApplyError> {
        match self {
            TransactionOutcome::Committed { .. } => None,
            TransactionOutcome::Rejected { error, .. } => Some(error),
        }
    }
}

pub struct StateMachine<C = StoreWsvCommand> {
    command: C,
    max_retries: u32,
}

impl StateMachine<StoreWsvCommand> {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(StoreWsvCommand::from_config(config), config.max_retries)
    }
}

impl<C: WsvCommand> StateMachine<C> {
    pub fn new(command: C, max_retries: u32) -> Self {
        Self {
            command,
            max_retries,
        }
    }

    /// Apply every transaction of `proposal` in order, one outcome each.
    pub fn apply_proposal(&self, db: &WorldStateDb, proposal: &Proposal) -> Vec<TransactionOutcome> {
        info!(
            height = proposal.height(),
            transactions = proposal.transactions().len(),
            "applying proposal"
        );
        proposal
            .transactions()
            .iter()
            .map(|transaction| self.apply_transaction(db, transaction))
            .collect()
    }

    /// Apply one transaction atomically, re-running it while it fails with a
    /// retryable error and attempts remain.
    pub fn apply_transaction(&self, db: &WorldStateDb, transaction: &Transaction) -> TransactionOutcome {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let error = match self.attempt(db, transaction) {
                Ok(()) => return TransactionOutcome::Committed { attempts },
                Err(error) => error,
            };

            if error.is_retryable() && attempts <= self.max_retries {
                debug!(attempts, error = %error, "retrying transaction");
                continue;
            }

            warn!(
                creator = %transaction.creator_account_id,
                attempts,
                error = %error,
                "transaction rejected"
            );
            return TransactionOutcome::Rejected { error, attempts };
        }
    }

    fn attempt(&self, db: &WorldStateDb, transaction: &Transaction) -> Result<(), ApplyError> {
        let mut scope = db.begin()?;
        match self.apply_commands(&mut scope, transaction) {
            Ok(()) => Ok(scope.commit()?),
            Err(error) => Err(abandon(error, scope.rollback())),
        }
    }

    /// Run the commands of `transaction` in `scope`, stopping at the first
    /// failure. Neither commits nor rolls back.
    pub fn apply_commands(
        &self,
        scope: &mut dyn TransactionScope,
        transaction: &Transaction,
    ) -> Result<(), ApplyError> {
        for command in &transaction.commands {
            self.apply_command(scope, &transaction.creator_account_id, command)?;
        }
        Ok(())
    }

    fn apply_command(
        &self,
        scope: &mut dyn TransactionScope,
        creator: &str,
        command: &Command,
    ) -> Result<(), ApplyError> {
        let wsv = &self.command;
        match command {
            Command::CreateRole {
                role_name,
                permissions,
            } => {
                wsv.insert_role(scope, role_name)?;
                wsv.insert_role_permissions(scope, role_name, permissions)?;
            }
            Command::AppendRole {
                account_id,
                role_name,
            } => wsv.insert_account_role(scope, account_id, role_name)?,
            Command::DetachRole {
                account_id,
                role_name,
            } => wsv.delete_account_role(scope, account_id, role_name)?,
            Command::CreateDomain {
                domain_id,
                default_role,
            } => wsv.insert_domain(
                scope,
                &Domain {
                    domain_id: domain_id.clone(),
                    default_role: default_role.clone(),
                },
            )?,
            Command::CreateAccount {
                account_name,
                domain_id,
                public_key,
            } => {
                let account_id = format!("{}@{}", account_name, domain_id);
                let default_role = select_one(
                    scope,
                    schema::DOMAIN,
                    &["default_role"],
                    Filter::new().eq("domain_id", domain_id.as_str()),
                )?
                .and_then(|row| row.into_iter().next())
                .and_then(|value| value.as_str().map(str::to_string))
                .ok_or_else(|| ApplyError::NotFound(format!("domain {}", domain_id)))?;

                tolerate_existing(wsv.insert_signatory(scope, public_key))?;
                wsv.insert_account(scope, &Account::new(&account_id, domain_id, 1))?;
                wsv.insert_account_signatory(scope, &account_id, public_key)?;
                wsv.insert_account_role(scope, &account_id, &default_role)?;
            }
            Command::SetQuorum { account_id, quorum } => {
                let mut account = load_account(scope, account_id)?;
                let signatories = count_signatories(scope, account_id)?;
                if *quorum == 0 || *quorum as usize > signatories {
                    return Err(ApplyError::InvalidQuorum {
                        account_id: account_id.clone(),
                        quorum: *quorum,
                        signatories,
                    });
                }
                account.quorum = *quorum;
                wsv.update_account(scope, &account)?;
            }
            Command::SetAccountDetail {
                account_id,
                key,
                value,
            } => wsv.set_account_kv(scope, account_id, &creator.to_string(), key, value)?,
            Command::CreateAsset {
                asset_name,
                domain_id,
                precision,
            } => wsv.insert_asset(
                scope,
                &Asset {
                    asset_id: format!("{}#{}", asset_name, domain_id),
                    domain_id: domain_id.clone(),
                    precision: *precision,
                },
            )?,
            Command::AddAssetQuantity {
                account_id,
                asset_id,
                amount,
            } => {
                check_amount(scope, asset_id, *amount)?;
                let balance = load_balance(scope, account_id, asset_id)?
                    .checked_add(*amount)
                    .ok_or_else(|| overflow(account_id, asset_id))?;
                wsv.upsert_account_asset(
                    scope,
                    &AccountAsset {
                        account_id: account_id.clone(),
                        asset_id: asset_id.clone(),
                        balance,
                    },
                )?;
            }
            Command::TransferAsset {
                src_account_id,
                dest_account_id,
                asset_id,
                amount,
            } => {
                check_amount(scope, asset_id, *amount)?;
                let source = load_balance(scope, src_account_id, asset_id)?;
                if source < *amount {
                    return Err(ApplyError::InsufficientFunds {
                        account_id: src_account_id.clone(),
                        asset_id: asset_id.clone(),
                        balance: source,
                        amount: *amount,
                    });
                }
                wsv.upsert_account_asset(
                    scope,
                    &AccountAsset {
                        account_id: src_account_id.clone(),
                        asset_id: asset_id.clone(),
                        balance: source
                            .checked_sub(*amount)
                            .ok_or_else(|| overflow(src_account_id, asset_id))?,
                    },
                )?;
                // read after the debit so a self-transfer nets to zero
                let destination = load_balance(scope, dest_account_id, asset_id)?
                    .checked_add(*amount)
                    .ok_or_else(|| overflow(dest_account_id, asset_id))?;
                wsv.upsert_account_asset(
                    scope,
                    &AccountAsset {
                        account_id: dest_account_id.clone(),
                        asset_id: asset_id.clone(),
                        balance: destination,
                    },
                )?;
            }
            Command::AddSignatory {
                account_id,
                public_key,
            } => {
                tolerate_existing(wsv.insert_signatory(scope, public_key))?;
                wsv.insert_account_signatory(scope, account_id, public_key)?;
            }
            Command::RemoveSignatory {
                account_id,
                public_key,
            } => {
                let account = load_account(scope, account_id)?;
                let remaining = count_signatories(scope, account_id)?.saturating_sub(1);
                if remaining < account.quorum as usize {
                    return Err(ApplyError::InvalidQuorum {
                        account_id: account_id.clone(),
                        quorum: account.quorum,
                        signatories: remaining,
                    });
                }
                wsv.delete_account_signatory(scope, account_id, public_key)?;
                wsv.delete_signatory(scope, public_key)?;
            }
            Command::AddPeer {
                address,
                public_key,
            } => wsv.insert_peer(
                scope,
                &Peer {
                    address: address.clone(),
                    public_key: public_key.clone(),
                },
            )?,
            Command::RemovePeer {
                address,
                public_key,
            } => wsv.delete_peer(
                scope,
                &Peer {
                    address: address.clone(),
                    public_key: public_key.clone(),
                },
            )?,
            Command::GrantPermission {
                account_id,
                permission,
            } => wsv.insert_account_grantable_permission(
                scope,
                account_id,
                &creator.to_string(),
                permission,
            )?,
            Command::RevokePermission {
                account_id,
                permission,
            } => wsv.delete_account_grantable_permission(
                scope,
                account_id,
                &creator.to_string(),
                permission,
            )?,
        }
        Ok(())
    }
}

/// The error that failed an attempt wins over a failed rollback, which is
/// only logged.
fn abandon(error: ApplyError, rollback: Result<(), DbError>) -> ApplyError {
    if let Err(rollback_error) = rollback {
        warn!(error = %rollback_error, cause = %error, "rollback failed");
    }
    error
}

fn overflow(account_id: &str, asset_id: &str) -> ApplyError {
    ApplyError::BalanceOverflow {
        account_id: account_id.to_string(),
        asset_id: asset_id.to_string(),
    }
}

/// A signatory key may already be registered by another account.
fn tolerate_existing(result: Result<(), WsvError>) -> Result<(), WsvError> {
    match result {
        Err(WsvError::ConstraintViolation { .. }) => Ok(()),
        other => other,
    }
}

fn select_one(
    scope: &mut dyn TransactionScope,
    table: &str,
    columns: &[&str],
    filter: Filter,
) -> Result<Option<Row>, ApplyError> {
    let result = scope.execute(&Statement::select(table, columns, filter))?;
    Ok(result.rows.into_iter().next())
}

fn load_account(scope: &mut dyn TransactionScope, account_id: &str) -> Result<Account, ApplyError> {
    let row = select_one(
        scope,
        schema::ACCOUNT,
        &["domain_id", "quorum", "data"],
        Filter::new().eq("account_id", account_id),
    )?
    .ok_or_else(|| ApplyError::NotFound(format!("account {}", account_id)))?;

    match row.as_slice() {
        [Value::Text(domain_id), Value::Integer(quorum), Value::Json(data)] => Ok(Account {
            account_id: account_id.to_string(),
            domain_id: domain_id.clone(),
            quorum: u32::try_from(*quorum)
                .map_err(|_| ApplyError::CorruptRecord(format!("quorum of {}", account_id)))?,
            json_data: data.clone(),
        }),
        _ => Err(ApplyError::CorruptRecord(format!("account {}", account_id))),
    }
}

fn count_signatories(
    scope: &mut dyn TransactionScope,
    account_id: &str,
) -> Result<usize, ApplyError> {
    let result = scope.execute(&Statement::select(
        schema::ACCOUNT_HAS_SIGNATORY,
        &["public_key"],
        Filter::new().eq("account_id", account_id),
    ))?;
    Ok(result.row_count())
}

/// Zero when the account holds none of the asset yet.
fn load_balance(
    scope: &mut dyn TransactionScope,
    account_id: &str,
    asset_id: &str,
) -> Result<Decimal, ApplyError> {
    let row = select_one(
        scope,
        schema::ACCOUNT_HAS_ASSET,
        &["amount"],
        Filter::new()
            .eq("account_id", account_id)
            .eq("asset_id", asset_id),
    )?;
    Ok(row
        .and_then(|row| row.first().and_then(Value::as_decimal))
        .unwrap_or(Decimal::ZERO))
}

/// Amounts must be positive and fit the asset's precision.
fn check_amount(
    scope: &mut dyn TransactionScope,
    asset_id: &str,
    amount: Decimal,
) -> Result<(), ApplyError> {
    let precision = select_one(
        scope,
        schema::ASSET,
        &["precision"],
        Filter::new().eq("asset_id", asset_id),
    )?
    .and_then(|row| row.first().and_then(Value::as_i64))
    .ok_or_else(|| ApplyError::NotFound(format!("asset {}", asset_id)))?;

    if amount <= Decimal::ZERO || i64::from(amount.scale()) > precision {
        return Err(ApplyError::InvalidAmount {
            asset_id: asset_id.to_string(),
            amount,
        });
    }
    Ok(())
}
