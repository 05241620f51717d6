use crate::core::{Column, DbError, ForeignKey, Result, Row, Schema, Snapshot, Value};
use crate::transaction::Change;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct MvccRow {
    pub row: Row,
    pub xmin: u64,         // Transaction ID that created this version
    pub xmax: Option<u64>, // Transaction ID that deleted/superseded this version
}

impl MvccRow {
    fn is_visible(&self, snapshot: &Snapshot) -> bool {
        snapshot.sees(self.xmin) && !self.xmax.is_some_and(|xmax| snapshot.sees(xmax))
    }
}

/// A relation stored as MVCC version chains.
///
/// Each logical row (chain) keeps every version written to it; a snapshot
/// sees at most one version per chain. Key indexes map a key tuple to the
/// chains that ever carried it, and are always re-verified against the
/// versions themselves.
#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<usize, Vec<MvccRow>>,
    next_row_id: usize,
    key_indexes: Vec<HashMap<Row, Vec<usize>>>,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        let key_indexes = vec![HashMap::new(); schema.key_constraints().len()];
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 0,
            key_indexes,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Insert a new row chain written by `snapshot.tx_id`.
    ///
    /// `current` must reflect the transaction table at the time of the call;
    /// it decides whether a conflicting key belongs to a finished transaction
    /// (unique violation) or to one still in flight (write conflict).
    pub fn insert(&mut self, row: Row, snapshot: &Snapshot, current: &Snapshot) -> Result<usize> {
        self.validate_row(&row)?;
        self.check_uniqueness(&row, None, current)?;

        let id = self.next_row_id;
        self.next_row_id += 1;

        self.index_row(id, &row);
        self.rows.insert(
            id,
            vec![MvccRow {
                row,
                xmin: snapshot.tx_id,
                xmax: None,
            }],
        );

        Ok(id)
    }

    /// Replace the visible version of chain `id` with `new_row`.
    ///
    /// Returns `false` if the chain is already gone for this snapshot.
    pub fn update(
        &mut self,
        id: usize,
        new_row: Row,
        snapshot: &Snapshot,
        current: &Snapshot,
    ) -> Result<bool> {
        self.validate_row(&new_row)?;
        if !self.check_writable(id, snapshot)? {
            return Ok(false);
        }
        self.check_uniqueness(&new_row, Some(id), current)?;

        self.index_row(id, &new_row);
        if let Some(versions) = self.rows.get_mut(&id)
            && let Some(latest) = versions.last_mut()
        {
            latest.xmax = Some(snapshot.tx_id);
            versions.push(MvccRow {
                row: new_row,
                xmin: snapshot.tx_id,
                xmax: None,
            });
            return Ok(true);
        }
        Ok(false)
    }

    /// Mark the visible version of chain `id` deleted by `snapshot.tx_id`.
    pub fn delete(&mut self, id: usize, snapshot: &Snapshot) -> Result<bool> {
        if !self.check_writable(id, snapshot)? {
            return Ok(false);
        }
        if let Some(latest) = self.rows.get_mut(&id).and_then(|versions| versions.last_mut()) {
            latest.xmax = Some(snapshot.tx_id);
            return Ok(true);
        }
        Ok(false)
    }

    /// Reverse one write `tx_id` recorded against this table.
    pub fn revert(&mut self, change: &Change, tx_id: u64) {
        match change {
            Change::InsertRow { row_id, .. } => self.undo_insert(*row_id, tx_id),
            Change::UpdateRow { row_id, .. } => self.undo_update(*row_id, tx_id),
            Change::DeleteRow { row_id, .. } => self.undo_delete(*row_id, tx_id),
        }
    }

    /// Drop a chain created by `tx_id`.
    pub fn undo_insert(&mut self, id: usize, tx_id: u64) {
        if self
            .rows
            .get(&id)
            .is_some_and(|versions| versions.iter().all(|version| version.xmin == tx_id))
        {
            self.rows.remove(&id);
        }
    }

    /// Pop the newest version written by `tx_id` and revive the one it replaced.
    pub fn undo_update(&mut self, id: usize, tx_id: u64) {
        let Some(versions) = self.rows.get_mut(&id) else {
            return;
        };
        if versions.last().is_some_and(|latest| latest.xmin == tx_id) {
            versions.pop();
            if let Some(previous) = versions.last_mut()
                && previous.xmax == Some(tx_id)
            {
                previous.xmax = None;
            }
        }
    }

    /// Clear a deletion mark left by `tx_id`.
    pub fn undo_delete(&mut self, id: usize, tx_id: u64) {
        if let Some(latest) = self.rows.get_mut(&id).and_then(|versions| versions.last_mut())
            && latest.xmax == Some(tx_id)
        {
            latest.xmax = None;
        }
    }

    pub fn scan(&self, snapshot: &Snapshot) -> Vec<Row> {
        self.scan_with_ids(snapshot)
            .into_iter()
            .map(|(_, row)| row)
            .collect()
    }

    pub fn scan_with_ids(&self, snapshot: &Snapshot) -> Vec<(usize, Row)> {
        self.rows
            .iter()
            .filter_map(|(id, versions)| {
                Self::visible_version(versions, snapshot).map(|version| (*id, version.row.clone()))
            })
            .collect()
    }

    /// Rows matching every `(column index, value)` pair.
    ///
    /// Goes through a key index when the filter pins down all columns of a
    /// key constraint, otherwise scans.
    pub fn scan_matching(&self, filter: &[(usize, Value)], snapshot: &Snapshot) -> Vec<(usize, Row)> {
        self.candidate_ids(filter)
            .into_iter()
            .filter_map(|id| {
                let version = Self::visible_version(self.rows.get(&id)?, snapshot)?;
                filter
                    .iter()
                    .all(|(idx, value)| &version.row[*idx] == value)
                    .then(|| (id, version.row.clone()))
            })
            .collect()
    }

    /// Whether a row matching `filter` is live for `current`, with in-flight
    /// writes of other transactions taken into account.
    ///
    /// A chain counts when it matches both as `current` sees it and as it
    /// would be if the pending writer committed. If the two disagree
    /// (pending insert, delete or key change) the answer depends on a
    /// transaction that has not finished yet, which is a write conflict.
    pub fn has_live_match(&self, filter: &[(usize, Value)], current: &Snapshot) -> Result<bool> {
        let matches = |version: &MvccRow| filter.iter().all(|(idx, value)| &version.row[*idx] == value);

        for id in self.candidate_ids(filter) {
            let Some(versions) = self.rows.get(&id) else {
                continue;
            };

            let base = versions.iter().rev().find(|version| current.sees(version.xmin));
            let pending_tail = versions.last().filter(|latest| !current.sees(latest.xmin));

            let now = base.is_some_and(|version| {
                !version.xmax.is_some_and(|xmax| current.sees(xmax)) && matches(version)
            });
            let after = match pending_tail {
                Some(latest) => latest.xmax.is_none() && matches(latest),
                None => now && base.is_some_and(|version| version.xmax.is_none()),
            };

            match (now, after) {
                (true, true) => return Ok(true),
                (false, false) => {}
                _ => {
                    return Err(DbError::WriteConflict(format!(
                        "row in '{}' is being changed by a concurrent transaction",
                        self.name()
                    )));
                }
            }
        }
        Ok(false)
    }

    /// Chains that may match `filter`: through a key index when the filter
    /// pins down every column of a key constraint, otherwise all of them.
    fn candidate_ids(&self, filter: &[(usize, Value)]) -> Vec<usize> {
        for (constraint, key_columns) in self.schema.key_column_indexes().iter().enumerate() {
            let key: Option<Row> = key_columns
                .iter()
                .map(|col| {
                    filter
                        .iter()
                        .find(|(idx, _)| idx == col)
                        .map(|(_, value)| value.clone())
                })
                .collect();
            if let Some(key) = key {
                return self.key_indexes[constraint]
                    .get(&key)
                    .cloned()
                    .unwrap_or_default();
            }
        }
        self.rows.keys().copied().collect()
    }

    /// Load rows written by the bootstrap transaction (id 0).
    pub fn restore(&mut self, rows: Vec<Row>) -> Result<()> {
        let bootstrap = Snapshot {
            tx_id: 0,
            active: Default::default(),
            max_tx_id: 1,
        };
        for row in rows {
            self.insert(row, &bootstrap, &bootstrap)?;
        }
        Ok(())
    }

    fn visible_version<'a>(versions: &'a [MvccRow], snapshot: &Snapshot) -> Option<&'a MvccRow> {
        versions.iter().rev().find(|version| version.is_visible(snapshot))
    }

    // The newest version must be the one this snapshot sees; anything newer
    // or a pending delete from another transaction is a lost-update hazard.
    fn check_writable(&self, id: usize, snapshot: &Snapshot) -> Result<bool> {
        let Some(latest) = self.rows.get(&id).and_then(|versions| versions.last()) else {
            return Ok(false);
        };

        if !snapshot.sees(latest.xmin) {
            return Err(DbError::WriteConflict(format!(
                "row in '{}' was changed by a concurrent transaction",
                self.name()
            )));
        }

        match latest.xmax {
            None => Ok(true),
            Some(xmax) if snapshot.sees(xmax) => Ok(false),
            Some(_) => Err(DbError::WriteConflict(format!(
                "row in '{}' is being deleted by a concurrent transaction",
                self.name()
            ))),
        }
    }

    fn check_uniqueness(&self, row: &Row, ignore_id: Option<usize>, current: &Snapshot) -> Result<()> {
        for (constraint, key_columns) in self.schema.key_column_indexes().iter().enumerate() {
            let key: Row = key_columns.iter().map(|idx| row[*idx].clone()).collect();
            if key.iter().any(Value::is_null) {
                continue;
            }

            for id in self.key_indexes[constraint].get(&key).into_iter().flatten() {
                if Some(*id) == ignore_id {
                    continue;
                }
                let Some(versions) = self.rows.get(id) else {
                    continue;
                };

                for version in versions {
                    if !key_columns
                        .iter()
                        .zip(key.iter())
                        .all(|(idx, value)| &version.row[*idx] == value)
                    {
                        continue;
                    }

                    let deleted = version.xmax.is_some_and(|xmax| current.sees(xmax));
                    if deleted {
                        continue;
                    }

                    let creator_pending = !current.sees(version.xmin);
                    let deleter_pending = version.xmax.is_some();
                    if creator_pending || deleter_pending {
                        return Err(DbError::WriteConflict(format!(
                            "key ({}) in '{}' is held by a concurrent transaction",
                            render_key(&key),
                            self.name()
                        )));
                    }

                    return Err(DbError::UniqueViolation {
                        table: self.name().to_string(),
                        columns: self.schema.key_constraints()[constraint].join(", "),
                        key: render_key(&key),
                    });
                }
            }
        }
        Ok(())
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        let columns = self.schema.schema().columns();
        if row.len() != columns.len() {
            return Err(DbError::MalformedStatement(format!(
                "Expected {} columns for '{}', got {}",
                columns.len(),
                self.name(),
                row.len()
            )));
        }
        for (column, value) in columns.iter().zip(row.iter()) {
            column.validate(self.name(), value)?;
        }
        for idx in self.schema.primary_key_indexes() {
            if row[idx].is_null() {
                return Err(DbError::NullValue {
                    table: self.name().to_string(),
                    column: columns[idx].name.clone(),
                });
            }
        }
        Ok(())
    }

    fn index_row(&mut self, id: usize, row: &Row) {
        let key_columns = self.schema.key_column_indexes();
        for (constraint, columns) in key_columns.iter().enumerate() {
            let key: Row = columns.iter().map(|idx| row[*idx].clone()).collect();
            let ids = self.key_indexes[constraint].entry(key).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
}

pub(crate) fn render_key(key: &[Value]) -> String {
    key.iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Table definition: columns plus key and reference constraints.
///
/// The primary key (if any) is the first key constraint; unique keys follow
/// in declaration order.
#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    schema: Schema,
    primary_key: Vec<String>,
    unique_keys: Vec<Vec<String>>,
    foreign_keys: Vec<ForeignKey>,
    key_indexes: Vec<Vec<usize>>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(columns),
            primary_key: Vec::new(),
            unique_keys: Vec::new(),
            foreign_keys: Vec::new(),
            key_indexes: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self.refresh_key_indexes();
        self
    }

    pub fn with_unique(mut self, columns: &[&str]) -> Self {
        self.unique_keys
            .push(columns.iter().map(|c| c.to_string()).collect());
        self.refresh_key_indexes();
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    pub fn key_constraints(&self) -> Vec<&[String]> {
        let mut keys: Vec<&[String]> = Vec::new();
        if !self.primary_key.is_empty() {
            keys.push(&self.primary_key);
        }
        keys.extend(self.unique_keys.iter().map(Vec::as_slice));
        keys
    }

    /// Resolve column names to positions, failing on unknown columns.
    pub fn column_indexes(&self, columns: &[String]) -> Result<Vec<usize>> {
        columns
            .iter()
            .map(|column| {
                self.schema
                    .find_column_index(column)
                    .ok_or_else(|| DbError::ColumnNotFound(column.clone(), self.name.clone()))
            })
            .collect()
    }

    /// Check every declared constraint names real columns.
    pub fn validate(&self) -> Result<()> {
        for key in self.key_constraints() {
            self.column_indexes(key)?;
        }
        for foreign_key in &self.foreign_keys {
            self.column_indexes(&foreign_key.columns)?;
            if foreign_key.columns.len() != foreign_key.referenced_columns.len() {
                return Err(DbError::MalformedStatement(format!(
                    "foreign key on '{}' maps {} columns onto {}",
                    self.name,
                    foreign_key.columns.len(),
                    foreign_key.referenced_columns.len()
                )));
            }
        }
        Ok(())
    }

    fn primary_key_indexes(&self) -> Vec<usize> {
        self.primary_key
            .iter()
            .filter_map(|column| self.schema.find_column_index(column))
            .collect()
    }

    fn key_column_indexes(&self) -> &[Vec<usize>] {
        &self.key_indexes
    }

    fn refresh_key_indexes(&mut self) {
        self.key_indexes = self
            .key_constraints()
            .iter()
            .map(|key| {
                key.iter()
                    .filter_map(|column| self.schema.find_column_index(column))
                    .collect()
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn role_table() -> Table {
        Table::new(
            TableSchema::new(
                "role",
                vec![
                    Column::new("role_id", DataType::Text).not_null(),
                    Column::new("label", DataType::Text),
                ],
            )
            .with_primary_key(&["role_id"])
            .with_unique(&["label"]),
        )
    }

    fn snapshot(tx_id: u64, active: &[u64]) -> Snapshot {
        Snapshot {
            tx_id,
            active: Arc::new(active.iter().copied().collect::<HashSet<_>>()),
            max_tx_id: 100,
        }
    }

    fn row(id: &str, label: Option<&str>) -> Row {
        vec![Value::from(id), label.map(Value::from).unwrap_or(Value::Null)]
    }

    #[test]
    fn test_insert_then_duplicate_key() {
        let mut table = role_table();
        let tx = snapshot(1, &[1]);
        table.insert(row("admin", None), &tx, &tx).unwrap();

        let err = table.insert(row("admin", None), &tx, &tx).unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[test]
    fn test_multiple_nulls_in_unique_column() {
        let mut table = role_table();
        let tx = snapshot(1, &[1]);
        table.insert(row("a", None), &tx, &tx).unwrap();
        table.insert(row("b", None), &tx, &tx).unwrap();
        assert!(table.insert(row("c", Some("x")), &tx, &tx).is_ok());
        assert!(table.insert(row("d", Some("x")), &tx, &tx).is_err());
    }

    #[test]
    fn test_uncommitted_rows_are_invisible_to_others() {
        let mut table = role_table();
        let writer = snapshot(1, &[1, 2]);
        table.insert(row("admin", None), &writer, &writer).unwrap();

        let reader = snapshot(2, &[1, 2]);
        assert!(table.scan(&reader).is_empty());
        assert_eq!(table.scan(&writer).len(), 1);

        // Same key from another transaction while the first is in flight
        let err = table.insert(row("admin", None), &reader, &reader).unwrap_err();
        assert!(matches!(err, DbError::WriteConflict(_)));
    }

    #[test]
    fn test_update_creates_new_version() {
        let mut table = role_table();
        let tx = snapshot(1, &[1]);
        let id = table.insert(row("admin", Some("a")), &tx, &tx).unwrap();
        assert!(table.update(id, row("admin", Some("b")), &tx, &tx).unwrap());

        let rows = table.scan(&tx);
        assert_eq!(rows, vec![row("admin", Some("b"))]);
    }

    #[test]
    fn test_update_of_row_changed_concurrently_conflicts() {
        let mut table = role_table();
        let setup = snapshot(1, &[]);
        let id = table.insert(row("admin", Some("a")), &setup, &setup).unwrap();

        let first = snapshot(2, &[2, 3]);
        let second = snapshot(3, &[2, 3]);
        table.update(id, row("admin", Some("b")), &first, &first).unwrap();

        let err = table
            .update(id, row("admin", Some("c")), &second, &second)
            .unwrap_err();
        assert!(matches!(err, DbError::WriteConflict(_)));
        assert!(matches!(table.delete(id, &second), Err(DbError::WriteConflict(_))));
    }

    #[test]
    fn test_undo_restores_previous_state() {
        let mut table = role_table();
        let setup = snapshot(1, &[]);
        let kept = table.insert(row("admin", Some("a")), &setup, &setup).unwrap();

        let tx = snapshot(2, &[2]);
        let inserted = table.insert(row("user", None), &tx, &tx).unwrap();
        table.update(kept, row("admin", Some("b")), &tx, &tx).unwrap();

        table.undo_update(kept, 2);
        table.undo_insert(inserted, 2);

        let after = snapshot(3, &[3]);
        assert_eq!(table.scan(&after), vec![row("admin", Some("a"))]);
        assert!(table.insert(row("user", None), &after, &after).is_ok());
    }

    #[test]
    fn test_undo_steps_back_one_version_at_a_time() {
        let mut table = role_table();
        let setup = snapshot(1, &[]);
        let id = table.insert(row("admin", Some("a")), &setup, &setup).unwrap();

        let tx = snapshot(2, &[2]);
        table.update(id, row("admin", Some("b")), &tx, &tx).unwrap();
        table.update(id, row("admin", Some("c")), &tx, &tx).unwrap();
        table.delete(id, &tx).unwrap();
        assert!(table.scan(&tx).is_empty());

        table.undo_delete(id, 2);
        assert_eq!(table.scan(&tx), vec![row("admin", Some("c"))]);
        table.undo_update(id, 2);
        assert_eq!(table.scan(&tx), vec![row("admin", Some("b"))]);
        table.undo_update(id, 2);
        assert_eq!(table.scan(&tx), vec![row("admin", Some("a"))]);
    }

    #[test]
    fn test_scan_matching_uses_key_and_filter() {
        let mut table = role_table();
        let tx = snapshot(1, &[1]);
        table.insert(row("admin", Some("a")), &tx, &tx).unwrap();
        table.insert(row("user", Some("u")), &tx, &tx).unwrap();

        let by_key = table.scan_matching(&[(0, Value::from("user"))], &tx);
        assert_eq!(by_key.len(), 1);
        assert_eq!(by_key[0].1, row("user", Some("u")));

        let by_key_mismatch =
            table.scan_matching(&[(0, Value::from("user")), (1, Value::from("a"))], &tx);
        assert!(by_key_mismatch.is_empty());
    }

    #[test]
    fn test_live_match_sees_pending_writes_of_others() {
        let mut table = role_table();
        let setup = snapshot(1, &[]);
        let admin = table.insert(row("admin", Some("a")), &setup, &setup).unwrap();
        let user = table.insert(row("user", Some("u")), &setup, &setup).unwrap();

        let writer = snapshot(2, &[2, 3]);
        let checker = snapshot(3, &[2, 3]);
        let by_id = |id: &str| vec![(0, Value::from(id))];

        // non-key change keeps the row live either way
        table.update(admin, row("admin", Some("b")), &writer, &writer).unwrap();
        assert!(table.has_live_match(&by_id("admin"), &checker).unwrap());

        table.delete(user, &writer).unwrap();
        assert!(matches!(
            table.has_live_match(&by_id("user"), &checker),
            Err(DbError::WriteConflict(_))
        ));
        // the deleting transaction sees its own delete
        assert!(!table.has_live_match(&by_id("user"), &writer).unwrap());

        table.insert(row("guest", None), &writer, &writer).unwrap();
        assert!(matches!(
            table.has_live_match(&by_id("guest"), &checker),
            Err(DbError::WriteConflict(_))
        ));
        assert!(!table.has_live_match(&by_id("nobody"), &checker).unwrap());
    }

    #[test]
    fn test_wrong_arity_is_malformed() {
        let mut table = role_table();
        let tx = snapshot(1, &[1]);
        let err = table.insert(vec![Value::from("x")], &tx, &tx).unwrap_err();
        assert!(matches!(err, DbError::MalformedStatement(_)));
    }
}
