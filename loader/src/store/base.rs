use async_trait::async_trait;

use crate::error::LoaderResult;
use crate::schema::TableDefinition;
use crate::types::{AuditEntry, Record, Snapshot, SnapshotScope};

/// Result of a bulk insert: how many rows landed and how many failed after
/// the per-row fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub inserted: u64,
    pub failed: u64,
}

/// Row counts of the live table, queried after a run for the summary log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableSummary {
    pub total_rows: u64,
    pub new_rows: u64,
    pub updated_rows: u64,
}

/// The persistence backend of a load run.
///
/// Implementations are responsible for idempotent schema provisioning,
/// snapshot reads scoped to the batch, chunked inserts with a per-row
/// fallback, and per-row transactional updates where the value update and its
/// audit rows commit or roll back together.
#[async_trait]
pub trait RecordStore {
    /// Verifies connectivity before any work happens.
    async fn ping(&self) -> LoaderResult<()>;

    /// Provisions the target table, its unique natural key index and the
    /// audit table, and repairs additive schema drift.
    async fn ensure_schema(&self, definition: &TableDefinition) -> LoaderResult<()>;

    /// Reads the persisted rows relevant to the incoming batch.
    async fn load_snapshot(
        &self,
        definition: &TableDefinition,
        scope: SnapshotScope,
    ) -> LoaderResult<Snapshot>;

    /// Bulk-inserts new records in chunks.
    ///
    /// A failing chunk falls back to row-by-row inserts, so a single bad row
    /// costs one row, not a whole chunk.
    async fn insert_records(
        &self,
        definition: &TableDefinition,
        records: &[Record],
        chunk_size: usize,
    ) -> LoaderResult<InsertOutcome>;

    /// Updates one persisted row and writes its audit trail in a single
    /// transaction.
    async fn update_record(
        &self,
        definition: &TableDefinition,
        row_id: i64,
        record: &Record,
        audit: &[AuditEntry],
        actor: &str,
    ) -> LoaderResult<()>;

    /// Counts the live table's rows by load status.
    async fn table_summary(&self, definition: &TableDefinition) -> LoaderResult<TableSummary>;
}
