use config::shared::{FieldRule, LoadProfile};

use crate::error::{ErrorKind, LoaderResult};
use crate::{bail, loader_error};

/// Suffix appended to the target table name to form the audit table name.
pub const AUDIT_TABLE_SUFFIX: &str = "_audit";

/// Postgres limits identifiers to 63 bytes.
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Service columns every target table carries alongside the profile columns.
const SERVICE_COLUMNS: &[(&str, &str)] = &[
    ("id", "BIGSERIAL PRIMARY KEY"),
    ("fingerprint", "TEXT NOT NULL"),
    ("natural_key", "TEXT NOT NULL"),
    ("load_status", "TEXT NOT NULL"),
    ("loaded_at", "TIMESTAMP NOT NULL"),
    ("updated_at", "TIMESTAMP"),
];

/// Service columns the drift check can retrofit onto a live table.
///
/// `id` is absent: a table that lost its surrogate key is not additively
/// repairable. Retrofitted columns are added nullable, so legacy rows keep
/// working until the next run fills them in.
const REPAIRABLE_SERVICE_COLUMNS: &[(&str, ColumnType)] = &[
    ("fingerprint", ColumnType::Text),
    ("natural_key", ColumnType::Text),
    ("load_status", ColumnType::Text),
    ("loaded_at", ColumnType::Timestamp),
    ("updated_at", ColumnType::Timestamp),
];

/// Validates an identifier against the allow-list: a lowercase ASCII letter
/// followed by lowercase letters, digits or underscores.
///
/// Identifiers are interpolated into DDL and DML text, so everything that is
/// not provably safe is rejected before any statement is built.
pub fn validate_identifier(identifier: &str) -> LoaderResult<()> {
    let mut chars = identifier.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_lowercase()
                && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        None => false,
    };

    if !valid || identifier.len() > MAX_IDENTIFIER_LENGTH {
        bail!(
            ErrorKind::InvalidIdentifier,
            "invalid identifier",
            format!("identifier `{identifier}` is not a safe lowercase sql name")
        );
    }

    Ok(())
}

/// SQL type of a persisted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    DoublePrecision,
    Timestamp,
}

impl ColumnType {
    /// Returns the SQL type name.
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::DoublePrecision => "DOUBLE PRECISION",
            ColumnType::Timestamp => "TIMESTAMP",
        }
    }
}

impl From<&FieldRule> for ColumnType {
    fn from(rule: &FieldRule) -> Self {
        match rule {
            FieldRule::Numeric { .. } => ColumnType::DoublePrecision,
            FieldRule::Date { .. } => ColumnType::Timestamp,
            FieldRule::Text { .. }
            | FieldRule::Document { .. }
            | FieldRule::Phone { .. }
            | FieldRule::Email => ColumnType::Text,
        }
    }
}

/// One profile-declared column of the target table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
}

/// The derived shape of a target table: profile columns plus service columns.
#[derive(Debug, Clone)]
pub struct TableDefinition {
    table: String,
    columns: Vec<ColumnDefinition>,
    partition_field: Option<String>,
    audit_enabled: bool,
}

impl TableDefinition {
    /// Derives the table definition from a load profile, validating the table
    /// name and every column name against the identifier allow-list.
    pub fn from_profile(profile: &LoadProfile) -> LoaderResult<Self> {
        validate_identifier(&profile.table)?;
        // The audit table name is derived, so the suffixed form must fit too.
        if profile.table.len() + AUDIT_TABLE_SUFFIX.len() > MAX_IDENTIFIER_LENGTH {
            return Err(loader_error!(
                ErrorKind::InvalidIdentifier,
                "invalid identifier",
                format!("table name `{}` leaves no room for the audit suffix", profile.table)
            ));
        }

        let mut columns = Vec::with_capacity(profile.columns.len());
        for spec in &profile.columns {
            validate_identifier(&spec.name)?;
            if SERVICE_COLUMNS.iter().any(|(name, _)| *name == spec.name) {
                bail!(
                    ErrorKind::InvalidIdentifier,
                    "invalid identifier",
                    format!("column `{}` collides with a service column", spec.name)
                );
            }

            columns.push(ColumnDefinition {
                name: spec.name.clone(),
                column_type: ColumnType::from(&spec.rule),
            });
        }

        Ok(Self {
            table: profile.table.clone(),
            columns,
            partition_field: profile.partition_field.clone(),
            audit_enabled: profile.audit_enabled,
        })
    }

    /// Returns the target table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the audit table name.
    pub fn audit_table(&self) -> String {
        format!("{}{AUDIT_TABLE_SUFFIX}", self.table)
    }

    /// Returns the profile-declared columns.
    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Returns the date column scoping snapshot reads, when one is declared.
    pub fn partition_field(&self) -> Option<&str> {
        self.partition_field.as_deref()
    }

    /// Returns whether updates write per-field audit rows.
    pub fn audit_enabled(&self) -> bool {
        self.audit_enabled
    }

    /// Returns every column the live-table drift check covers: the
    /// retrofittable service columns followed by the profile columns.
    ///
    /// A pre-existing table typically has the data columns but lacks the
    /// service columns, so the check must inspect both.
    pub fn drift_columns(&self) -> Vec<ColumnDefinition> {
        let mut columns: Vec<ColumnDefinition> = REPAIRABLE_SERVICE_COLUMNS
            .iter()
            .map(|(name, column_type)| ColumnDefinition {
                name: (*name).to_string(),
                column_type: *column_type,
            })
            .collect();
        columns.extend(self.columns.iter().cloned());

        columns
    }

    /// Builds the idempotent DDL for the target table.
    pub fn create_table_sql(&self) -> String {
        let mut parts: Vec<String> = SERVICE_COLUMNS
            .iter()
            .map(|(name, definition)| format!("{name} {definition}"))
            .collect();
        for column in &self.columns {
            parts.push(format!("{} {}", column.name, column.column_type.as_sql()));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table,
            parts.join(", ")
        )
    }

    /// Builds the idempotent DDL for the unique natural key index.
    pub fn create_unique_index_sql(&self) -> String {
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS {}_natural_key_idx ON {} (natural_key)",
            self.table, self.table
        )
    }

    /// Builds the idempotent DDL for the fingerprint lookup index.
    pub fn create_fingerprint_index_sql(&self) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS {}_fingerprint_idx ON {} (fingerprint)",
            self.table, self.table
        )
    }

    /// Builds the idempotent DDL for the audit table.
    pub fn create_audit_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             id BIGSERIAL PRIMARY KEY, \
             row_id BIGINT NOT NULL, \
             field TEXT NOT NULL, \
             old_value TEXT, \
             new_value TEXT, \
             changed_by TEXT NOT NULL, \
             changed_at TIMESTAMP NOT NULL)",
            self.audit_table()
        )
    }

    /// Builds the additive repair statement for one missing column.
    ///
    /// Drift repair only ever adds columns; narrowing or dropping is a manual
    /// operation.
    pub fn add_column_sql(&self, column: &ColumnDefinition) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN IF NOT EXISTS {} {}",
            self.table,
            column.name,
            column.column_type.as_sql()
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use config::shared::ColumnSpec;

    use super::*;

    fn profile() -> LoadProfile {
        LoadProfile {
            name: "activities".to_string(),
            table: "activities".to_string(),
            columns: vec![
                ColumnSpec {
                    name: "zone".to_string(),
                    rule: FieldRule::Text {
                        case: None,
                        strip_accents: false,
                    },
                },
                ColumnSpec {
                    name: "latitude".to_string(),
                    rule: FieldRule::Numeric { decimals: 6 },
                },
                ColumnSpec {
                    name: "visit_date".to_string(),
                    rule: FieldRule::Date { formats: vec![] },
                },
            ],
            key_fields: vec!["zone".to_string()],
            partition_field: None,
            column_mapping: BTreeMap::new(),
            audit_enabled: false,
            key_sentinel: LoadProfile::DEFAULT_KEY_SENTINEL.to_string(),
            insert_chunk_size: LoadProfile::DEFAULT_INSERT_CHUNK_SIZE,
        }
    }

    #[test]
    fn accepts_safe_identifiers() {
        validate_identifier("activities").unwrap();
        validate_identifier("zone_2024").unwrap();
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("2024_zone").is_err());
        assert!(validate_identifier("Zone").is_err());
        assert!(validate_identifier("zone; drop table users").is_err());
        assert!(validate_identifier("zona\u{f1}").is_err());
    }

    #[test]
    fn rule_determines_column_type() {
        let definition = TableDefinition::from_profile(&profile()).unwrap();
        let types: Vec<ColumnType> = definition
            .columns()
            .iter()
            .map(|c| c.column_type)
            .collect();

        assert_eq!(
            types,
            vec![
                ColumnType::Text,
                ColumnType::DoublePrecision,
                ColumnType::Timestamp
            ]
        );
    }

    #[test]
    fn create_table_sql_includes_service_and_profile_columns() {
        let definition = TableDefinition::from_profile(&profile()).unwrap();
        let sql = definition.create_table_sql();

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS activities ("));
        assert!(sql.contains("fingerprint TEXT NOT NULL"));
        assert!(sql.contains("latitude DOUBLE PRECISION"));
        assert!(sql.contains("visit_date TIMESTAMP"));
    }

    #[test]
    fn drift_check_covers_service_and_profile_columns() {
        let definition = TableDefinition::from_profile(&profile()).unwrap();
        let columns = definition.drift_columns();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();

        // A legacy table usually has the data columns but none of these, so
        // the service columns must be part of the check.
        assert_eq!(
            names,
            vec![
                "fingerprint",
                "natural_key",
                "load_status",
                "loaded_at",
                "updated_at",
                "zone",
                "latitude",
                "visit_date"
            ]
        );
        // `id` cannot be retrofitted and stays out of the repair list.
        assert!(!names.contains(&"id"));

        assert_eq!(
            definition.add_column_sql(&columns[0]),
            "ALTER TABLE activities ADD COLUMN IF NOT EXISTS fingerprint TEXT"
        );
        assert_eq!(
            definition.add_column_sql(&columns[4]),
            "ALTER TABLE activities ADD COLUMN IF NOT EXISTS updated_at TIMESTAMP"
        );
    }

    #[test]
    fn rejects_profile_columns_shadowing_service_columns() {
        let mut profile = profile();
        profile.columns.push(ColumnSpec {
            name: "fingerprint".to_string(),
            rule: FieldRule::Email,
        });

        let error = TableDefinition::from_profile(&profile).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidIdentifier);
    }

    #[test]
    fn audit_table_name_is_suffixed() {
        let definition = TableDefinition::from_profile(&profile()).unwrap();
        assert_eq!(definition.audit_table(), "activities_audit");
    }
}
