//! Checkpoint snapshots of committed state.
//!
//! A checkpoint is the set of rows visible to a fresh reader, per table,
//! written as MessagePack to a temp file next to the target and renamed
//! over it, so a crash leaves either the old or the new file.

use crate::core::{DbError, Result, Row};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// Database Snapshot
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: u32,
    pub tables: BTreeMap<String, Vec<Row>>,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub created_at: DateTime<Utc>,
    pub row_count: usize,
    pub table_count: usize,
}

impl DatabaseSnapshot {
    pub fn new(tables: BTreeMap<String, Vec<Row>>) -> Self {
        let row_count = tables.values().map(Vec::len).sum();
        let table_count = tables.len();

        Self {
            version: SNAPSHOT_VERSION,
            tables,
            metadata: SnapshotMetadata {
                created_at: Utc::now(),
                row_count,
                table_count,
            },
        }
    }
}

// ============================================================================
// Durability Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// Checkpoints only when asked for.
    #[default]
    None,
    /// Checkpoint after every successful commit.
    OnCommit,
}

// ============================================================================
// Snapshot Manager
// ============================================================================

pub struct SnapshotManager {
    path: PathBuf,
}

impl SnapshotManager {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, snapshot: &DatabaseSnapshot) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let bytes = rmp_serde::to_vec_named(snapshot)
            .map_err(|e| DbError::SerializationError(format!("Failed to encode snapshot: {}", e)))?;

        let mut file = tempfile::NamedTempFile::new_in(&dir)?;
        file.write_all(&bytes)?;
        file.as_file().sync_all()?;
        file.persist(&self.path)
            .map_err(|e| DbError::IoError(format!("Failed to replace snapshot: {}", e.error)))?;

        debug!(
            path = %self.path.display(),
            rows = snapshot.metadata.row_count,
            tables = snapshot.metadata.table_count,
            "snapshot written"
        );
        Ok(())
    }

    pub fn load(&self) -> Result<Option<DatabaseSnapshot>> {
        if !self.exists() {
            return Ok(None);
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let snapshot: DatabaseSnapshot = rmp_serde::from_read(reader)
            .map_err(|e| DbError::SerializationError(format!("Failed to decode snapshot: {}", e)))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(DbError::SerializationError(format!(
                "Unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(Some(snapshot))
    }
}
