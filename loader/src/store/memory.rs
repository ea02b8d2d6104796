use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use tokio::sync::Mutex;

use crate::error::{ErrorKind, LoaderResult};
use crate::loader_error;
use crate::schema::TableDefinition;
use crate::store::{InsertOutcome, RecordStore, TableSummary};
use crate::types::{AuditEntry, PersistedRow, Record, RecordStatus, Snapshot, SnapshotScope};

/// One row held by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRow {
    pub row_id: i64,
    pub natural_key: String,
    pub fingerprint: String,
    pub load_status: String,
    pub loaded_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
    pub values: BTreeMap<String, crate::types::Value>,
    pub partition: Option<NaiveDate>,
}

/// One audit row held by a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryAuditRow {
    pub row_id: i64,
    pub entry: AuditEntry,
    pub actor: String,
}

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<MemoryRow>,
    audit: Vec<MemoryAuditRow>,
    next_row_id: i64,
    failing_update_keys: HashSet<String>,
}

/// In-memory record store for testing and development purposes.
///
/// Enforces the same natural key uniqueness a real backend enforces through
/// its unique index, and supports injecting update failures per natural key
/// to exercise partial-failure paths. All data is lost when the process
/// terminates.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every update targeting this natural key fail.
    pub async fn fail_updates_for(&self, natural_key: &str) {
        let mut inner = self.inner.lock().await;
        inner.failing_update_keys.insert(natural_key.to_string());
    }

    /// Returns a copy of all persisted rows.
    pub async fn rows(&self) -> Vec<MemoryRow> {
        self.inner.lock().await.rows.clone()
    }

    /// Returns a copy of all audit rows.
    pub async fn audit_rows(&self) -> Vec<MemoryAuditRow> {
        self.inner.lock().await.audit.clone()
    }

    /// Returns the persisted row with this natural key, if any.
    pub async fn row_by_natural_key(&self, natural_key: &str) -> Option<MemoryRow> {
        self.inner
            .lock()
            .await
            .rows
            .iter()
            .find(|row| row.natural_key == natural_key)
            .cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn ping(&self) -> LoaderResult<()> {
        Ok(())
    }

    async fn ensure_schema(&self, _definition: &TableDefinition) -> LoaderResult<()> {
        Ok(())
    }

    async fn load_snapshot(
        &self,
        _definition: &TableDefinition,
        scope: SnapshotScope,
    ) -> LoaderResult<Snapshot> {
        let inner = self.inner.lock().await;
        let rows = inner
            .rows
            .iter()
            .filter(|row| match scope {
                SnapshotScope::FullTable => true,
                SnapshotScope::Partition(date) => row.partition == Some(date),
            })
            .map(|row| {
                (
                    row.natural_key.clone(),
                    PersistedRow {
                        row_id: row.row_id,
                        fingerprint: row.fingerprint.clone(),
                        values: row.values.clone(),
                        loaded_at: row.loaded_at,
                        updated_at: row.updated_at,
                    },
                )
            })
            .collect();

        Ok(Snapshot::new(rows))
    }

    async fn insert_records(
        &self,
        _definition: &TableDefinition,
        records: &[Record],
        _chunk_size: usize,
    ) -> LoaderResult<InsertOutcome> {
        let mut inner = self.inner.lock().await;
        let mut outcome = InsertOutcome::default();

        for record in records {
            let duplicate = inner
                .rows
                .iter()
                .any(|row| row.natural_key == record.natural_key());
            if duplicate {
                outcome.failed += 1;
                continue;
            }

            inner.next_row_id += 1;
            let row_id = inner.next_row_id;
            inner.rows.push(MemoryRow {
                row_id,
                natural_key: record.natural_key().to_string(),
                fingerprint: record.fingerprint().to_string(),
                load_status: RecordStatus::New.as_load_status().to_string(),
                loaded_at: Utc::now().naive_utc(),
                updated_at: None,
                values: record.fields().clone(),
                partition: record.partition(),
            });
            outcome.inserted += 1;
        }

        Ok(outcome)
    }

    async fn update_record(
        &self,
        _definition: &TableDefinition,
        row_id: i64,
        record: &Record,
        audit: &[AuditEntry],
        actor: &str,
    ) -> LoaderResult<()> {
        let mut inner = self.inner.lock().await;

        if inner.failing_update_keys.contains(record.natural_key()) {
            return Err(loader_error!(
                ErrorKind::QueryFailed,
                "injected update failure",
                record.natural_key()
            ));
        }

        let row = inner
            .rows
            .iter_mut()
            .find(|row| row.row_id == row_id)
            .ok_or_else(|| loader_error!(ErrorKind::QueryFailed, "no row with this id", row_id))?;

        row.values = record.fields().clone();
        row.fingerprint = record.fingerprint().to_string();
        row.load_status = RecordStatus::Updated.as_load_status().to_string();
        row.updated_at = Some(Utc::now().naive_utc());
        row.partition = record.partition();

        // The value update and its audit rows are one atomic step here, just
        // like in the transactional backends.
        for entry in audit {
            inner.audit.push(MemoryAuditRow {
                row_id,
                entry: entry.clone(),
                actor: actor.to_string(),
            });
        }

        Ok(())
    }

    async fn table_summary(&self, _definition: &TableDefinition) -> LoaderResult<TableSummary> {
        let inner = self.inner.lock().await;
        let mut summary = TableSummary {
            total_rows: inner.rows.len() as u64,
            ..TableSummary::default()
        };
        for row in &inner.rows {
            if row.load_status == RecordStatus::New.as_load_status() {
                summary.new_rows += 1;
            } else if row.load_status == RecordStatus::Updated.as_load_status() {
                summary.updated_rows += 1;
            }
        }

        Ok(summary)
    }
}
