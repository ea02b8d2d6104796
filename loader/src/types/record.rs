use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::types::Value;

/// A raw record as produced by a record source: named fields in source order,
/// untouched by normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    /// Field name to raw value, in the order the source produced them.
    pub fields: Vec<(String, crate::types::RawValue)>,
}

impl RawRecord {
    /// Creates a raw record from named values.
    pub fn new(fields: Vec<(String, crate::types::RawValue)>) -> Self {
        Self { fields }
    }
}

/// Classification assigned to a record by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    /// No persisted row with this fingerprint exists in the snapshot.
    New,
    /// A persisted row exists and every non-key field still matches.
    Unchanged,
    /// A persisted row exists but at least one non-key field differs.
    Updated,
}

impl RecordStatus {
    /// Returns the marker persisted in the `load_status` column.
    pub fn as_load_status(&self) -> &'static str {
        match self {
            RecordStatus::New => "new",
            RecordStatus::Unchanged => "unchanged",
            RecordStatus::Updated => "updated",
        }
    }
}

/// One changed field captured for the audit trail of an update.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    /// Name of the changed column.
    pub field: String,
    /// Previously persisted value rendering, if any.
    pub old_value: Option<String>,
    /// Incoming value rendering, if any.
    pub new_value: Option<String>,
}

/// One normalized record of the incoming batch.
///
/// The fingerprint is computed once at construction from the key fields and
/// never mutated afterwards; the record itself is discarded at the end of the
/// run, only its effect on the persisted row survives.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Canonical column name to normalized value.
    fields: BTreeMap<String, Value>,
    /// Hex digest over the canonical key field values.
    fingerprint: String,
    /// Canonical joined key string, used to resolve the persisted row when
    /// the fingerprint alone cannot (composite key targeting).
    natural_key: String,
    /// Processing partition scoping uniqueness, when the profile declares one.
    partition: Option<NaiveDate>,
}

impl Record {
    /// Creates a record from normalized fields and its precomputed identity.
    pub fn new(
        fields: BTreeMap<String, Value>,
        fingerprint: String,
        natural_key: String,
        partition: Option<NaiveDate>,
    ) -> Self {
        Self {
            fields,
            fingerprint,
            natural_key,
            partition,
        }
    }

    /// Returns the normalized fields in canonical column order.
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Returns the value of a field, treating missing fields as null.
    pub fn value(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&Value::Null)
    }

    /// Returns the content fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Returns the canonical natural key string.
    ///
    /// Includes the partition date when one is set, so identical natural keys
    /// in different partitions never collide.
    pub fn natural_key(&self) -> &str {
        &self.natural_key
    }

    /// Returns the processing partition, when the profile declares one.
    pub fn partition(&self) -> Option<NaiveDate> {
        self.partition
    }
}
