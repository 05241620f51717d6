use super::DbTransaction;
use crate::config::StoreConfig;
use crate::core::{DbError, Result};
use crate::executor::{ExecutorPipeline, Statement};
use crate::result::QueryResult;
use crate::storage::{Catalog, DatabaseSnapshot, InMemoryStorage, SnapshotManager, TableSchema};
use crate::transaction::{TransactionManager, TransactionStats};
use crate::wsv;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// The world state store: tables, transactions and checkpoints.
///
/// `Send + Sync`; any number of transactions may be open at once, each
/// borrowing the store through its [`DbTransaction`].
pub struct WorldStateDb {
    pub(crate) config: StoreConfig,
    pub(crate) storage: InMemoryStorage,
    pub(crate) catalog: Catalog,
    pub(crate) pipeline: ExecutorPipeline,
    pub(crate) transaction_manager: TransactionManager,
    snapshots: Option<SnapshotManager>,
}

impl WorldStateDb {
    /// Open a store with the world state schema, restoring the last
    /// checkpoint when the configured snapshot file exists.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::with_tables(config, wsv::schema::tables())
    }

    /// Volatile store with the world state schema and default settings.
    pub fn in_memory() -> Result<Self> {
        Self::open(StoreConfig::default())
    }

    /// Open a store over an arbitrary set of tables, declared parents first.
    pub fn with_tables(config: StoreConfig, tables: Vec<TableSchema>) -> Result<Self> {
        config.validate()?;

        let mut catalog = Catalog::new();
        let mut storage = InMemoryStorage::new();
        for table in tables {
            catalog = catalog.with_table(table.clone())?;
            storage.create_table(table)?;
        }

        let snapshots = config.snapshot_path.as_ref().map(SnapshotManager::new);
        let db = Self {
            config,
            storage,
            catalog,
            pipeline: ExecutorPipeline::with_default_executors(),
            transaction_manager: TransactionManager::new(),
            snapshots,
        };
        db.restore()?;

        info!(store = %db.config.name, tables = db.catalog.list_tables().len(), "store opened");
        Ok(db)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn begin(&self) -> Result<DbTransaction<'_>> {
        let transaction = self.transaction_manager.begin()?;
        Ok(DbTransaction::new(self, transaction))
    }

    /// Run one statement in its own transaction.
    pub fn query(&self, statement: &Statement) -> Result<QueryResult> {
        let mut txn = self.begin()?;
        match txn.execute(statement) {
            Ok(result) => {
                txn.commit()?;
                Ok(result)
            }
            Err(err) => {
                txn.rollback()?;
                Err(err)
            }
        }
    }

    /// Every committed row of `table`, all columns.
    pub fn dump_table(&self, table: &str) -> Result<QueryResult> {
        let schema = self.catalog.get_table(table)?;
        let view = self.transaction_manager.committed_view()?;
        let rows = self.storage.scan_table(table, &view)?;
        Ok(QueryResult::new(schema.schema().column_names(), rows))
    }

    pub fn transaction_stats(&self) -> TransactionStats {
        self.transaction_manager.stats()
    }

    /// Write all committed rows to the snapshot file.
    pub fn checkpoint(&self) -> Result<()> {
        let snapshots = self.snapshots.as_ref().ok_or_else(|| {
            DbError::UnsupportedOperation("checkpoint needs a snapshot path".into())
        })?;

        let view = self.transaction_manager.committed_view()?;
        let mut tables = BTreeMap::new();
        for table in self.catalog.list_tables() {
            tables.insert(table.clone(), self.storage.scan_table(table, &view)?);
        }

        let snapshot = DatabaseSnapshot::new(tables);
        snapshots.save(&snapshot)?;
        info!(
            path = %snapshots.path().display(),
            rows = snapshot.metadata.row_count,
            "checkpoint written"
        );
        Ok(())
    }

    fn restore(&self) -> Result<()> {
        let Some(snapshots) = &self.snapshots else {
            return Ok(());
        };
        let Some(snapshot) = snapshots.load()? else {
            return Ok(());
        };

        for (table, rows) in snapshot.tables {
            if !self.catalog.table_exists(&table) {
                warn!(table = %table, "snapshot table not in schema, skipped");
                continue;
            }
            self.storage.restore_table(&table, rows)?;
        }
        info!(
            rows = snapshot.metadata.row_count,
            created_at = %snapshot.metadata.created_at,
            "checkpoint restored"
        );
        Ok(())
    }
}
