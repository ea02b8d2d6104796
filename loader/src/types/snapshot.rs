use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDateTime;

use crate::types::Value;

/// The durable counterpart of a record in the target table.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRow {
    /// Storage-assigned identity.
    pub row_id: i64,
    /// Fingerprint written by the run that last touched this row.
    pub fingerprint: String,
    /// Canonical column name to persisted value.
    pub values: BTreeMap<String, Value>,
    /// Timestamp of the first load of this row.
    pub loaded_at: NaiveDateTime,
    /// Timestamp of the last update, if the row was ever updated.
    pub updated_at: Option<NaiveDateTime>,
}

impl PersistedRow {
    /// Returns the persisted value of a column, treating missing columns as null.
    pub fn value(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&Value::Null)
    }
}

/// Scope of a snapshot read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SnapshotScope {
    /// Read the entire target table. Appropriate for small tables.
    FullTable,
    /// Read only rows sharing the batch's processing partition, to bound the
    /// read size for large tables and isolate same-day reloads.
    Partition(chrono::NaiveDate),
}

/// Point-in-time view of the persisted rows relevant to an incoming batch.
///
/// Indexed twice: by fingerprint for the cheap NEW/not-NEW classification and
/// by natural key for update targeting, since the fingerprint governs identity
/// of key values while the natural key resolves the concrete row.
#[derive(Debug, Default)]
pub struct Snapshot {
    rows: Vec<PersistedRow>,
    by_fingerprint: HashSet<String>,
    by_natural_key: HashMap<String, usize>,
}

impl Snapshot {
    /// Builds a snapshot from persisted rows and their precomputed natural keys.
    ///
    /// When two persisted rows carry the same natural key (which the schema's
    /// uniqueness guarantees should prevent), the later row wins, mirroring
    /// the batch-side last-write-wins policy.
    pub fn new(rows: Vec<(String, PersistedRow)>) -> Self {
        let mut snapshot = Snapshot::default();
        for (natural_key, row) in rows {
            snapshot.by_fingerprint.insert(row.fingerprint.clone());
            snapshot.rows.push(row);
            snapshot
                .by_natural_key
                .insert(natural_key, snapshot.rows.len() - 1);
        }

        snapshot
    }

    /// Returns whether any persisted row carries this fingerprint.
    pub fn contains_fingerprint(&self, fingerprint: &str) -> bool {
        self.by_fingerprint.contains(fingerprint)
    }

    /// Returns the persisted row matching a natural key, if any.
    pub fn row_by_natural_key(&self, natural_key: &str) -> Option<&PersistedRow> {
        self.by_natural_key
            .get(natural_key)
            .map(|index| &self.rows[*index])
    }

    /// Returns the number of rows in the snapshot.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether the snapshot holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
