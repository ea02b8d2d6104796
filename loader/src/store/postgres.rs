use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, NaiveTime, Utc};
use config::shared::PgConnectionConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::{info, warn};

use crate::error::{ErrorKind, LoaderResult};
use crate::schema::{ColumnType, TableDefinition};
use crate::store::{InsertOutcome, RecordStore, TableSummary};
use crate::types::{
    AuditEntry, PersistedRow, Record, RecordStatus, Snapshot, SnapshotScope, Value,
};
use crate::{bail, loader_error};

/// Maximum number of connections the pool keeps open.
const MAX_POOL_CONNECTIONS: u32 = 4;

/// Duration after which idle connections are closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Postgres-backed record store.
///
/// Every identifier interpolated into statement text here has passed the
/// allow-list in [`TableDefinition::from_profile`]; values always travel as
/// bind parameters.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store with a lazily connected pool.
    ///
    /// Returns immediately without establishing connections; they are created
    /// on demand and closed again after sitting idle.
    pub fn new(config: &PgConnectionConfig) -> Self {
        let pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(MAX_POOL_CONNECTIONS)
            .idle_timeout(Some(IDLE_TIMEOUT))
            .connect_lazy_with(config.with_db());

        Self { pool }
    }

    /// Adds columns missing from the live table and rejects type drift on
    /// columns that do exist.
    ///
    /// The check covers the service columns too: a pre-existing table from
    /// before this loader has the data columns but no fingerprint, status or
    /// timestamp columns, and gets them retrofitted here.
    async fn repair_drift(&self, definition: &TableDefinition) -> LoaderResult<()> {
        let rows = sqlx::query(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1",
        )
        .bind(definition.table())
        .fetch_all(&self.pool)
        .await?;

        let mut existing = BTreeMap::new();
        for row in rows {
            let name: String = row.try_get("column_name")?;
            let data_type: String = row.try_get("data_type")?;
            existing.insert(name, data_type);
        }

        for column in definition.drift_columns() {
            match existing.get(&column.name) {
                None => {
                    info!(
                        table = definition.table(),
                        column = %column.name,
                        "adding missing column to live table"
                    );
                    sqlx::query(&definition.add_column_sql(&column))
                        .execute(&self.pool)
                        .await?;
                }
                Some(data_type) if data_type != expected_data_type(column.column_type) => {
                    bail!(
                        ErrorKind::SchemaDrift,
                        "live column type does not match the profile",
                        format!(
                            "column `{}` is `{data_type}`, profile expects `{}`",
                            column.name,
                            expected_data_type(column.column_type)
                        )
                    );
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    async fn read_snapshot_rows(
        &self,
        definition: &TableDefinition,
        scope: SnapshotScope,
    ) -> LoaderResult<Vec<(String, PersistedRow)>> {
        let mut select = String::from("SELECT id, natural_key, fingerprint, loaded_at, updated_at");
        for column in definition.columns() {
            select.push_str(", ");
            select.push_str(&column.name);
        }
        select.push_str(" FROM ");
        select.push_str(definition.table());

        let mut builder = QueryBuilder::<Postgres>::new(select);
        if let SnapshotScope::Partition(date) = scope {
            let field = definition.partition_field().ok_or_else(|| {
                loader_error!(
                    ErrorKind::InvalidState,
                    "partition scope without a partition field"
                )
            })?;
            let start = date.and_time(NaiveTime::MIN);
            let end = date
                .succ_opt()
                .unwrap_or(chrono::NaiveDate::MAX)
                .and_time(NaiveTime::MIN);
            builder.push(format!(" WHERE {field} >= "));
            builder.push_bind(start);
            builder.push(format!(" AND {field} < "));
            builder.push_bind(end);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;

        let mut persisted = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = BTreeMap::new();
            for column in definition.columns() {
                let value = match column.column_type {
                    ColumnType::Text => row
                        .try_get::<Option<String>, _>(column.name.as_str())?
                        .map_or(Value::Null, Value::Text),
                    ColumnType::DoublePrecision => row
                        .try_get::<Option<f64>, _>(column.name.as_str())?
                        .map_or(Value::Null, Value::Numeric),
                    ColumnType::Timestamp => row
                        .try_get::<Option<NaiveDateTime>, _>(column.name.as_str())?
                        .map_or(Value::Null, Value::Date),
                };
                values.insert(column.name.clone(), value);
            }

            let natural_key: String = row.try_get("natural_key")?;
            persisted.push((
                natural_key,
                PersistedRow {
                    row_id: row.try_get("id")?,
                    fingerprint: row.try_get("fingerprint")?,
                    values,
                    loaded_at: row.try_get("loaded_at")?,
                    updated_at: row.try_get("updated_at")?,
                },
            ));
        }

        Ok(persisted)
    }

    async fn insert_chunk(
        &self,
        definition: &TableDefinition,
        records: &[Record],
        loaded_at: NaiveDateTime,
    ) -> LoaderResult<u64> {
        let mut insert = format!(
            "INSERT INTO {} (natural_key, fingerprint, load_status, loaded_at",
            definition.table()
        );
        for column in definition.columns() {
            insert.push_str(", ");
            insert.push_str(&column.name);
        }
        insert.push_str(") ");

        let mut builder = QueryBuilder::<Postgres>::new(insert);
        builder.push_values(records, |mut row, record| {
            row.push_bind(record.natural_key().to_string());
            row.push_bind(record.fingerprint().to_string());
            row.push_bind(RecordStatus::New.as_load_status());
            row.push_bind(loaded_at);
            for column in definition.columns() {
                match (record.value(&column.name), column.column_type) {
                    (Value::Text(text), _) => {
                        row.push_bind(text.clone());
                    }
                    (Value::Numeric(number), _) => {
                        row.push_bind(*number);
                    }
                    (Value::Date(datetime), _) => {
                        row.push_bind(*datetime);
                    }
                    (Value::Null, ColumnType::Text) => {
                        row.push_bind(None::<String>);
                    }
                    (Value::Null, ColumnType::DoublePrecision) => {
                        row.push_bind(None::<f64>);
                    }
                    (Value::Null, ColumnType::Timestamp) => {
                        row.push_bind(None::<NaiveDateTime>);
                    }
                }
            }
        });

        let result = builder.build().execute(&self.pool).await?;

        Ok(result.rows_affected())
    }
}

/// Returns the `information_schema` rendering of a column type.
fn expected_data_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Text => "text",
        ColumnType::DoublePrecision => "double precision",
        ColumnType::Timestamp => "timestamp without time zone",
    }
}

/// Appends one typed value to a statement under construction.
fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: &Value, column_type: ColumnType) {
    match (value, column_type) {
        (Value::Text(text), _) => {
            builder.push_bind(text.clone());
        }
        (Value::Numeric(number), _) => {
            builder.push_bind(*number);
        }
        (Value::Date(datetime), _) => {
            builder.push_bind(*datetime);
        }
        (Value::Null, ColumnType::Text) => {
            builder.push_bind(None::<String>);
        }
        (Value::Null, ColumnType::DoublePrecision) => {
            builder.push_bind(None::<f64>);
        }
        (Value::Null, ColumnType::Timestamp) => {
            builder.push_bind(None::<NaiveDateTime>);
        }
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn ping(&self) -> LoaderResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;

        Ok(())
    }

    async fn ensure_schema(&self, definition: &TableDefinition) -> LoaderResult<()> {
        sqlx::query(&definition.create_table_sql())
            .execute(&self.pool)
            .await?;
        self.repair_drift(definition).await?;
        sqlx::query(&definition.create_unique_index_sql())
            .execute(&self.pool)
            .await?;
        sqlx::query(&definition.create_fingerprint_index_sql())
            .execute(&self.pool)
            .await?;
        if definition.audit_enabled() {
            sqlx::query(&definition.create_audit_table_sql())
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    async fn load_snapshot(
        &self,
        definition: &TableDefinition,
        scope: SnapshotScope,
    ) -> LoaderResult<Snapshot> {
        let rows = self
            .read_snapshot_rows(definition, scope)
            .await
            .map_err(|error| {
                loader_error!(
                    ErrorKind::SnapshotReadFailed,
                    "failed to read the persisted snapshot",
                    error.to_string(),
                    source: error
                )
            })?;

        Ok(Snapshot::new(rows))
    }

    async fn insert_records(
        &self,
        definition: &TableDefinition,
        records: &[Record],
        chunk_size: usize,
    ) -> LoaderResult<InsertOutcome> {
        let mut outcome = InsertOutcome::default();
        let loaded_at = Utc::now().naive_utc();

        for chunk in records.chunks(chunk_size.max(1)) {
            match self.insert_chunk(definition, chunk, loaded_at).await {
                Ok(inserted) => outcome.inserted += inserted,
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    warn!(%error, rows = chunk.len(), "bulk insert failed, retrying row by row");
                    for record in chunk {
                        match self
                            .insert_chunk(definition, std::slice::from_ref(record), loaded_at)
                            .await
                        {
                            Ok(inserted) => outcome.inserted += inserted,
                            Err(error) if error.is_fatal() => return Err(error),
                            Err(error) => {
                                warn!(
                                    %error,
                                    natural_key = record.natural_key(),
                                    "row insert failed"
                                );
                                outcome.failed += 1;
                            }
                        }
                    }
                }
            }
        }

        Ok(outcome)
    }

    async fn update_record(
        &self,
        definition: &TableDefinition,
        row_id: i64,
        record: &Record,
        audit: &[AuditEntry],
        actor: &str,
    ) -> LoaderResult<()> {
        let updated_at = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        let mut builder =
            QueryBuilder::<Postgres>::new(format!("UPDATE {} SET fingerprint = ", definition.table()));
        builder.push_bind(record.fingerprint().to_string());
        builder.push(", load_status = ");
        builder.push_bind(RecordStatus::Updated.as_load_status());
        builder.push(", updated_at = ");
        builder.push_bind(updated_at);
        for column in definition.columns() {
            builder.push(format!(", {} = ", column.name));
            push_value(&mut builder, record.value(&column.name), column.column_type);
        }
        builder.push(" WHERE id = ");
        builder.push_bind(row_id);

        builder.build().execute(&mut *tx).await?;

        if definition.audit_enabled() {
            let audit_sql = format!(
                "INSERT INTO {} (row_id, field, old_value, new_value, changed_by, changed_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
                definition.audit_table()
            );
            for entry in audit {
                sqlx::query(&audit_sql)
                    .bind(row_id)
                    .bind(&entry.field)
                    .bind(&entry.old_value)
                    .bind(&entry.new_value)
                    .bind(actor)
                    .bind(updated_at)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        Ok(())
    }

    async fn table_summary(&self, definition: &TableDefinition) -> LoaderResult<TableSummary> {
        let rows = sqlx::query(&format!(
            "SELECT load_status, COUNT(*) AS count FROM {} GROUP BY load_status",
            definition.table()
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut summary = TableSummary::default();
        for row in rows {
            let status: String = row.try_get("load_status")?;
            let count: i64 = row.try_get("count")?;
            summary.total_rows += count as u64;
            if status == RecordStatus::New.as_load_status() {
                summary.new_rows += count as u64;
            } else if status == RecordStatus::Updated.as_load_status() {
                summary.updated_rows += count as u64;
            }
        }

        Ok(summary)
    }
}
