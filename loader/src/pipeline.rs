//! Run orchestration: one batch from source to report.
//!
//! The pipeline owns the phase progression of a run. Fatal errors abort the
//! run where they happen; per-row write failures are counted and the run
//! still reaches its report.

use std::collections::HashSet;

use config::shared::LoadProfile;
use tracing::{debug, error, info, warn};

use crate::bail;
use crate::error::{ErrorKind, LoaderResult};
use crate::fingerprint::normalize_record;
use crate::reconcile::reconcile;
use crate::schema::TableDefinition;
use crate::source::RecordSource;
use crate::store::RecordStore;
use crate::types::SnapshotScope;

/// Identity recorded in audit rows written by a pipeline run.
const DEFAULT_ACTOR: &str = "loader";

/// Phases a run moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    Connected,
    SchemaReady,
    Loaded,
    Normalized,
    Reconciled,
    Written,
    Reported,
    Aborted,
}

impl RunPhase {
    /// Returns the phase name used in logs.
    pub fn as_static_str(&self) -> &'static str {
        match self {
            RunPhase::Init => "init",
            RunPhase::Connected => "connected",
            RunPhase::SchemaReady => "schema_ready",
            RunPhase::Loaded => "loaded",
            RunPhase::Normalized => "normalized",
            RunPhase::Reconciled => "reconciled",
            RunPhase::Written => "written",
            RunPhase::Reported => "reported",
            RunPhase::Aborted => "aborted",
        }
    }
}

/// Counts of one finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Profile the run executed.
    pub profile: String,
    /// Phase the run ended in.
    pub phase: RunPhase,
    /// Records read from the source.
    pub total_input: u64,
    /// In-batch duplicates dropped before reconciliation.
    pub deduplicated: u64,
    /// Rows inserted as new.
    pub inserted: u64,
    /// Rows updated in place.
    pub updated: u64,
    /// Records whose persisted row needed no write.
    pub unchanged: u64,
    /// Rows that failed to insert or update.
    pub errors: u64,
}

/// One load run: source, profile and store wired together.
#[derive(Debug)]
pub struct Pipeline<Src, Store> {
    profile: LoadProfile,
    source: Src,
    store: Store,
    actor: String,
    phase: RunPhase,
    last_completed: RunPhase,
}

impl<Src, Store> Pipeline<Src, Store>
where
    Src: RecordSource,
    Store: RecordStore,
{
    /// Creates a pipeline for one profile.
    pub fn new(profile: LoadProfile, source: Src, store: Store) -> Self {
        Self {
            profile,
            source,
            store,
            actor: DEFAULT_ACTOR.to_string(),
            phase: RunPhase::Init,
            last_completed: RunPhase::Init,
        }
    }

    /// Overrides the actor recorded in audit rows.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Returns the phase the run is in; [`RunPhase::Aborted`] after a fatal
    /// error.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Returns the last phase the run completed, which an aborted run keeps
    /// alongside the [`RunPhase::Aborted`] marker.
    pub fn last_completed_phase(&self) -> RunPhase {
        self.last_completed
    }

    fn advance(&mut self, phase: RunPhase) {
        debug!(
            profile = %self.profile.name,
            phase = phase.as_static_str(),
            "run phase"
        );
        self.phase = phase;
        self.last_completed = phase;
    }

    /// Executes the run to completion.
    ///
    /// Running the same extract twice is idempotent: the second run
    /// reconciles every record as unchanged and writes nothing.
    pub async fn run(&mut self) -> LoaderResult<RunReport> {
        match self.execute().await {
            Ok(report) => Ok(report),
            Err(err) => {
                self.phase = RunPhase::Aborted;
                error!(
                    profile = %self.profile.name,
                    last_phase = self.last_completed.as_static_str(),
                    %err,
                    "run aborted"
                );
                Err(err)
            }
        }
    }

    async fn execute(&mut self) -> LoaderResult<RunReport> {
        info!(
            profile = %self.profile.name,
            source = %self.source.describe(),
            "starting load run"
        );

        self.profile.validate()?;
        let definition = TableDefinition::from_profile(&self.profile)?;

        self.store.ping().await?;
        self.advance(RunPhase::Connected);

        self.store.ensure_schema(&definition).await?;
        self.advance(RunPhase::SchemaReady);

        let raw_records = self.source.read().await?;
        if raw_records.is_empty() {
            bail!(
                ErrorKind::SourceEmpty,
                "source produced no records",
                self.source.describe()
            );
        }
        let total_input = raw_records.len() as u64;
        self.advance(RunPhase::Loaded);

        self.warn_unmapped_headers(&raw_records[0]);
        let records: Vec<_> = raw_records
            .iter()
            .map(|raw| normalize_record(raw, &self.profile))
            .collect();
        self.advance(RunPhase::Normalized);

        let scope = self.snapshot_scope(&records);
        let snapshot = self.store.load_snapshot(&definition, scope).await?;
        debug!(
            snapshot_rows = snapshot.len(),
            scope = ?scope,
            "loaded persisted snapshot"
        );

        let batch = reconcile(records, &snapshot, &self.profile);
        self.advance(RunPhase::Reconciled);

        let outcome = self
            .store
            .insert_records(&definition, &batch.new_records, self.profile.insert_chunk_size)
            .await?;
        let mut errors = outcome.failed;

        let mut updated = 0u64;
        for update in &batch.updates {
            let audit: &[_] = if self.profile.audit_enabled {
                &update.audit
            } else {
                &[]
            };
            match self
                .store
                .update_record(&definition, update.row_id, &update.record, audit, &self.actor)
                .await
            {
                Ok(()) => updated += 1,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(
                        natural_key = update.record.natural_key(),
                        %err,
                        "row update failed, continuing"
                    );
                    errors += 1;
                }
            }
        }
        self.advance(RunPhase::Written);

        self.advance(RunPhase::Reported);
        let report = RunReport {
            profile: self.profile.name.clone(),
            phase: self.phase,
            total_input,
            deduplicated: batch.deduplicated_count,
            inserted: outcome.inserted,
            updated,
            unchanged: batch.unchanged_count,
            errors,
        };

        info!(
            profile = %report.profile,
            total_input = report.total_input,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            deduplicated = report.deduplicated,
            errors = report.errors,
            "load run finished"
        );

        // The live counts come from the table itself, so discrepancies with
        // the run counts surface in the logs.
        match self.store.table_summary(&definition).await {
            Ok(summary) => info!(
                table = %self.profile.table,
                total_rows = summary.total_rows,
                new_rows = summary.new_rows,
                updated_rows = summary.updated_rows,
                "post-run table summary"
            ),
            Err(err) => warn!(%err, "failed to query the post-run table summary"),
        }

        Ok(report)
    }

    /// Warns once per run about source headers the profile does not know.
    fn warn_unmapped_headers(&self, sample: &crate::types::RawRecord) {
        for (header, _) in &sample.fields {
            let canonical = self
                .profile
                .column_mapping
                .get(header)
                .map(String::as_str)
                .unwrap_or(header.as_str());
            if self.profile.rule_for(canonical).is_none() {
                warn!(
                    profile = %self.profile.name,
                    header = %header,
                    "source header has no mapped column and will be ignored"
                );
            }
        }
    }

    /// Decides how much of the table the snapshot read covers.
    ///
    /// When every record of the batch falls in the same declared partition,
    /// the read is scoped to that partition. A batch spanning partitions, or
    /// records without a partition value, falls back to the full table.
    fn snapshot_scope(&self, records: &[crate::types::Record]) -> SnapshotScope {
        if self.profile.partition_field.is_none() {
            return SnapshotScope::FullTable;
        }

        let partitions: HashSet<_> = records.iter().map(|record| record.partition()).collect();
        match partitions.iter().next() {
            Some(Some(date)) if partitions.len() == 1 => SnapshotScope::Partition(*date),
            _ => {
                warn!(
                    profile = %self.profile.name,
                    partitions = partitions.len(),
                    "batch does not sit in a single partition, reading the full table"
                );
                SnapshotScope::FullTable
            }
        }
    }
}
