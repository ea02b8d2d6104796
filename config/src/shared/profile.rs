use std::collections::BTreeMap;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Case folding applied to text fields during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseFold {
    Upper,
    Lower,
    Title,
}

/// Per-field normalization rule.
///
/// The rule also determines the column type of the persisted table: text-like
/// rules map to `TEXT`, numeric to `DOUBLE PRECISION`, date to `TIMESTAMP`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldRule {
    /// Free text: trim, optional case fold, optional accent stripping.
    Text {
        #[serde(default)]
        case: Option<CaseFold>,
        #[serde(default)]
        strip_accents: bool,
    },
    /// Floating point number rounded to a fixed number of decimals.
    Numeric {
        #[serde(default = "default_numeric_decimals")]
        decimals: u32,
    },
    /// Date or datetime parsed against an ordered list of format patterns.
    Date {
        #[serde(default = "default_date_formats")]
        formats: Vec<String>,
    },
    /// Identity document number: digits only, minimum length enforced.
    Document {
        #[serde(default = "default_document_min_digits")]
        min_digits: usize,
    },
    /// Phone number: digits plus optional leading `+`, best-effort length check.
    Phone {
        /// Country dial code without `+`, e.g. `51` for Peru.
        country_code: String,
        #[serde(default = "default_phone_min_digits")]
        min_digits: usize,
        #[serde(default = "default_phone_max_digits")]
        max_digits: usize,
    },
    /// Email address: trimmed, lowercased, minimally shape-checked.
    Email,
}

/// Default number of decimals for numeric fields (geocoordinate precision).
fn default_numeric_decimals() -> u32 {
    6
}

/// Date formats the original extracts are known to use, tried in order.
fn default_date_formats() -> Vec<String> {
    [
        "%d/%m/%Y %H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%d/%m/%Y",
        "%Y-%m-%d",
        "%d-%m-%Y",
        "%m/%d/%Y",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_document_min_digits() -> usize {
    8
}

fn default_phone_min_digits() -> usize {
    7
}

fn default_phone_max_digits() -> usize {
    15
}

/// One canonical column of the target table, with its normalization rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ColumnSpec {
    /// Canonical column name. Must satisfy the identifier allow-list enforced
    /// by the schema layer before it ever reaches SQL.
    pub name: String,
    /// Normalization rule applied to values of this column.
    pub rule: FieldRule,
}

/// Configuration of a single incremental load: what the original repository
/// expressed as N near-duplicate scripts, expressed as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoadProfile {
    /// Human-readable profile name used in logs, e.g. `activities`.
    pub name: String,
    /// Target table name.
    pub table: String,
    /// Canonical columns in persisted order.
    pub columns: Vec<ColumnSpec>,
    /// Ordered subset of columns participating in the fingerprint and the
    /// natural key.
    pub key_fields: Vec<String>,
    /// Optional date-valued column that scopes uniqueness and snapshot reads
    /// to one processing partition.
    #[serde(default)]
    pub partition_field: Option<String>,
    /// Source header to canonical column name mapping. A `BTreeMap` keeps
    /// serialized profiles diffable.
    #[serde(default)]
    pub column_mapping: BTreeMap<String, String>,
    /// Whether per-field audit rows are written for updated records.
    #[serde(default)]
    pub audit_enabled: bool,
    /// Sentinel substituted for null or invalid values in key columns, so
    /// NOT-NULL key constraints are never violated.
    #[serde(default = "default_key_sentinel")]
    pub key_sentinel: String,
    /// Number of rows per bulk insert statement.
    #[serde(default = "default_insert_chunk_size")]
    pub insert_chunk_size: usize,
}

fn default_key_sentinel() -> String {
    "UNKNOWN".to_string()
}

fn default_insert_chunk_size() -> usize {
    500
}

impl LoadProfile {
    /// Default sentinel for key columns with missing values.
    pub const DEFAULT_KEY_SENTINEL: &'static str = "UNKNOWN";

    /// Default number of rows per bulk insert statement.
    pub const DEFAULT_INSERT_CHUNK_SIZE: usize = 500;

    /// Validates internal consistency of the profile.
    ///
    /// Identifier charset validation is intentionally not done here; the
    /// schema layer owns the allow-list and re-checks every identifier before
    /// it is interpolated into a statement.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(ValidationError::DuplicateColumn(column.name.clone()));
            }
        }

        if self.key_fields.is_empty() {
            return Err(ValidationError::EmptyKeyFields);
        }

        for key_field in &self.key_fields {
            if !seen.contains(key_field.as_str()) {
                return Err(ValidationError::UnknownKeyField(key_field.clone()));
            }
        }

        if let Some(partition_field) = &self.partition_field {
            let is_date_column = self.columns.iter().any(|column| {
                column.name == *partition_field && matches!(column.rule, FieldRule::Date { .. })
            });
            if !is_date_column {
                return Err(ValidationError::InvalidPartitionField(
                    partition_field.clone(),
                ));
            }
        }

        for target in self.column_mapping.values() {
            if !seen.contains(target.as_str()) {
                return Err(ValidationError::UnknownMappingTarget(target.clone()));
            }
        }

        if self.insert_chunk_size == 0 {
            return Err(ValidationError::InsertChunkSizeZero);
        }

        Ok(())
    }

    /// Returns the rule of a column, if declared.
    pub fn rule_for(&self, column: &str) -> Option<&FieldRule> {
        self.columns
            .iter()
            .find(|spec| spec.name == column)
            .map(|spec| &spec.rule)
    }

    /// Returns whether a column participates in the natural key.
    pub fn is_key_field(&self, column: &str) -> bool {
        self.key_fields.iter().any(|field| field == column)
    }
}
