//! Batch-versus-snapshot reconciliation.
//!
//! Classifies every normalized record as new, unchanged or updated, plans the
//! audit trail for updates, and collapses in-batch duplicates with a
//! last-write-wins policy before anything touches the store.

use std::collections::HashMap;

use config::shared::{FieldRule, LoadProfile};
use tracing::debug;

use crate::conversions::round_to;
use crate::types::{AuditEntry, Record, Snapshot, Value};

/// One update the writer will apply: the target row, the incoming record and
/// the per-field audit trail.
#[derive(Debug, Clone)]
pub struct PlannedUpdate {
    pub row_id: i64,
    pub record: Record,
    pub audit: Vec<AuditEntry>,
}

/// The outcome of reconciling a batch against a snapshot.
#[derive(Debug, Default)]
pub struct ReconciledBatch {
    /// Records with no persisted counterpart, in batch order.
    pub new_records: Vec<Record>,
    /// Records whose persisted counterpart has at least one differing
    /// non-key field.
    pub updates: Vec<PlannedUpdate>,
    /// Records whose persisted counterpart still matches field for field.
    pub unchanged_count: u64,
    /// In-batch duplicates dropped by the last-write-wins policy.
    pub deduplicated_count: u64,
}

/// Reconciles a normalized batch against the persisted snapshot.
pub fn reconcile(records: Vec<Record>, snapshot: &Snapshot, profile: &LoadProfile) -> ReconciledBatch {
    let mut batch = ReconciledBatch::default();

    // Last write wins inside the batch: a natural key occurring twice keeps
    // its first position but carries the later record's values.
    let mut deduplicated: Vec<Record> = Vec::with_capacity(records.len());
    let mut position: HashMap<String, usize> = HashMap::new();
    for record in records {
        match position.get(record.natural_key()) {
            Some(index) => {
                debug!(
                    natural_key = record.natural_key(),
                    "duplicate natural key in batch, keeping the later record"
                );
                deduplicated[*index] = record;
                batch.deduplicated_count += 1;
            }
            None => {
                position.insert(record.natural_key().to_string(), deduplicated.len());
                deduplicated.push(record);
            }
        }
    }

    for record in deduplicated {
        // The fingerprint set answers "have we seen these key values" cheaply;
        // the natural key resolves the concrete row to compare against.
        if !snapshot.contains_fingerprint(record.fingerprint()) {
            batch.new_records.push(record);
            continue;
        }
        let Some(persisted) = snapshot.row_by_natural_key(record.natural_key()) else {
            batch.new_records.push(record);
            continue;
        };

        let mut audit = Vec::new();
        for column in &profile.columns {
            if profile.is_key_field(&column.name) {
                continue;
            }

            let incoming = record.value(&column.name);
            let existing = persisted.value(&column.name);
            if !values_equal(incoming, existing, &column.rule) {
                audit.push(AuditEntry {
                    field: column.name.clone(),
                    old_value: existing.render(),
                    new_value: incoming.render(),
                });
            }
        }

        if audit.is_empty() {
            batch.unchanged_count += 1;
        } else {
            batch.updates.push(PlannedUpdate {
                row_id: persisted.row_id,
                record,
                audit,
            });
        }
    }

    batch
}

/// Compares an incoming value against a persisted one under a field rule.
///
/// Text compares case-insensitively after trimming, numbers compare after
/// rounding to the rule's decimals, dates at second resolution. A null on one
/// side only is always a difference.
fn values_equal(incoming: &Value, existing: &Value, rule: &FieldRule) -> bool {
    match (incoming, existing) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Numeric(a), Value::Numeric(b)) => {
            let decimals = match rule {
                FieldRule::Numeric { decimals } => *decimals,
                _ => 6,
            };
            round_to(*a, decimals) == round_to(*b, decimals)
        }
        (Value::Text(a), Value::Text(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        (Value::Date(a), Value::Date(b)) => {
            a.and_utc().timestamp() == b.and_utc().timestamp()
        }
        // Shape changed between runs, e.g. a column retyped in the profile.
        (a, b) => a.canonical_string(6) == b.canonical_string(6),
    }
}
