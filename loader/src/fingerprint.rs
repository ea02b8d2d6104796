//! Record normalization and content fingerprinting.
//!
//! A [`RawRecord`] coming out of a source becomes a [`Record`] here: headers
//! are mapped to canonical column names, every value goes through its field
//! rule, key columns get the sentinel substitution, and the fingerprint is
//! computed over the canonical key string. The fingerprint is the batch-side
//! identity for reconciliation and never changes after this point.

use std::collections::BTreeMap;

use config::shared::{FieldRule, LoadProfile};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::conversions::normalize;
use crate::types::{RawRecord, Record, Value};

/// Separator between key values in the canonical key string.
const KEY_SEPARATOR: char = '|';

/// Decimals used for canonical rendering of columns without a numeric rule.
const DEFAULT_DECIMALS: u32 = 6;

/// Computes the hex-encoded SHA-256 digest of a canonical key string.
pub fn fingerprint_hex(canonical_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_key.as_bytes());

    format!("{:x}", hasher.finalize())
}

/// Normalizes a raw record against a load profile.
///
/// Source headers are resolved through the profile's column mapping; headers
/// naming a canonical column directly pass through unmapped, anything else is
/// dropped. Declared columns absent from the record normalize to null. Null
/// key values of text-like columns are replaced with the profile's sentinel
/// before fingerprinting, so two extracts that both miss a key field produce
/// the same fingerprint and the persisted key columns stay non-null.
pub fn normalize_record(raw: &RawRecord, profile: &LoadProfile) -> Record {
    let mut mapped: BTreeMap<&str, &crate::types::RawValue> = BTreeMap::new();
    for (header, value) in &raw.fields {
        let canonical = profile
            .column_mapping
            .get(header)
            .map(String::as_str)
            .unwrap_or(header.as_str());
        if profile.rule_for(canonical).is_some() {
            mapped.insert(canonical, value);
        } else {
            debug!(header = %header, "dropping column not declared by the profile");
        }
    }

    let mut fields = BTreeMap::new();
    for column in &profile.columns {
        let value = match mapped.get(column.name.as_str()) {
            Some(raw_value) => normalize(&column.name, raw_value, &column.rule),
            None => Value::Null,
        };

        let value = if value.is_null()
            && profile.is_key_field(&column.name)
            && is_text_like(&column.rule)
        {
            Value::Text(profile.key_sentinel.clone())
        } else {
            value
        };

        fields.insert(column.name.clone(), value);
    }

    let canonical_key = canonical_key_string(&fields, profile);
    let fingerprint = fingerprint_hex(&canonical_key);

    let partition = profile
        .partition_field
        .as_deref()
        .and_then(|field| fields.get(field))
        .and_then(Value::as_partition_date);

    // Identical key values in different partitions must resolve to different
    // rows, unless the partition field already participates in the key.
    let natural_key = match partition {
        Some(date)
            if !profile
                .partition_field
                .as_deref()
                .is_some_and(|field| profile.is_key_field(field)) =>
        {
            format!("{canonical_key}{KEY_SEPARATOR}{date}")
        }
        _ => canonical_key,
    };

    Record::new(fields, fingerprint, natural_key, partition)
}

/// Joins the canonical renderings of the key fields, in profile order.
fn canonical_key_string(fields: &BTreeMap<String, Value>, profile: &LoadProfile) -> String {
    let mut parts = Vec::with_capacity(profile.key_fields.len());
    for key_field in &profile.key_fields {
        let value = fields.get(key_field).unwrap_or(&Value::Null);
        parts.push(value.canonical_string(decimals_for(profile, key_field)));
    }

    parts.join(&KEY_SEPARATOR.to_string())
}

/// Returns the canonical decimal count for a column.
fn decimals_for(profile: &LoadProfile, column: &str) -> u32 {
    match profile.rule_for(column) {
        Some(FieldRule::Numeric { decimals }) => *decimals,
        _ => DEFAULT_DECIMALS,
    }
}

/// Returns whether a rule produces text values, which is what the key
/// sentinel substitution requires.
fn is_text_like(rule: &FieldRule) -> bool {
    matches!(
        rule,
        FieldRule::Text { .. } | FieldRule::Document { .. } | FieldRule::Phone { .. } | FieldRule::Email
    )
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use config::shared::{CaseFold, ColumnSpec};

    use super::*;
    use crate::types::RawValue;

    fn profile() -> LoadProfile {
        LoadProfile {
            name: "activities".to_string(),
            table: "activities".to_string(),
            columns: vec![
                ColumnSpec {
                    name: "document".to_string(),
                    rule: FieldRule::Document { min_digits: 8 },
                },
                ColumnSpec {
                    name: "zone".to_string(),
                    rule: FieldRule::Text {
                        case: Some(CaseFold::Upper),
                        strip_accents: true,
                    },
                },
                ColumnSpec {
                    name: "visit_date".to_string(),
                    rule: FieldRule::Date {
                        formats: vec!["%d/%m/%Y".to_string()],
                    },
                },
                ColumnSpec {
                    name: "latitude".to_string(),
                    rule: FieldRule::Numeric { decimals: 6 },
                },
            ],
            key_fields: vec![
                "document".to_string(),
                "zone".to_string(),
                "visit_date".to_string(),
            ],
            partition_field: Some("visit_date".to_string()),
            column_mapping: BTreeMap::from([(
                "NUMERO DE DOCUMENTO".to_string(),
                "document".to_string(),
            )]),
            audit_enabled: true,
            key_sentinel: LoadProfile::DEFAULT_KEY_SENTINEL.to_string(),
            insert_chunk_size: LoadProfile::DEFAULT_INSERT_CHUNK_SIZE,
        }
    }

    fn raw(document: &str, zone: &str, date: &str) -> RawRecord {
        RawRecord::new(vec![
            (
                "NUMERO DE DOCUMENTO".to_string(),
                RawValue::Text(document.to_string()),
            ),
            ("zone".to_string(), RawValue::Text(zone.to_string())),
            ("visit_date".to_string(), RawValue::Text(date.to_string())),
            ("latitude".to_string(), RawValue::Number(-12.345_599_9)),
            (
                "IGNORED HEADER".to_string(),
                RawValue::Text("noise".to_string()),
            ),
        ])
    }

    #[test]
    fn identical_content_produces_identical_fingerprints() {
        let first = normalize_record(&raw("44137762", "sur", "14/03/2025"), &profile());
        let second = normalize_record(&raw(" 44.137.762 ", "SUR", "14/03/2025"), &profile());

        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(first.natural_key(), second.natural_key());
    }

    #[test]
    fn changed_key_value_changes_the_fingerprint() {
        let first = normalize_record(&raw("44137762", "SUR", "14/03/2025"), &profile());
        let second = normalize_record(&raw("44137762", "NORTE", "14/03/2025"), &profile());

        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn null_key_fields_get_the_sentinel() {
        let record = normalize_record(
            &RawRecord::new(vec![(
                "visit_date".to_string(),
                RawValue::Text("14/03/2025".to_string()),
            )]),
            &profile(),
        );

        assert_eq!(record.value("document"), &Value::Text("UNKNOWN".to_string()));
        assert_eq!(record.value("zone"), &Value::Text("UNKNOWN".to_string()));
        // Date-valued key columns stay null; the canonical NULL token keeps
        // the fingerprint stable for them.
        let undated = normalize_record(&RawRecord::default(), &profile());
        assert_eq!(undated.value("visit_date"), &Value::Null);
        assert_eq!(undated.partition(), None);
    }

    #[test]
    fn two_records_missing_the_same_key_collide() {
        let first = normalize_record(&raw("", "SUR", "14/03/2025"), &profile());
        let second = normalize_record(&raw("-", "SUR", "14/03/2025"), &profile());

        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn partition_is_extracted_from_the_declared_field() {
        let record = normalize_record(&raw("44137762", "SUR", "14/03/2025"), &profile());

        assert_eq!(
            record.partition(),
            chrono::NaiveDate::from_ymd_opt(2025, 3, 14)
        );
    }

    #[test]
    fn undeclared_headers_are_dropped() {
        let record = normalize_record(&raw("44137762", "SUR", "14/03/2025"), &profile());

        assert_eq!(record.fields().len(), 4);
        assert!(!record.fields().contains_key("IGNORED HEADER"));
    }

    #[test]
    fn fingerprint_is_a_sha256_hex_digest() {
        let record = normalize_record(&raw("44137762", "SUR", "14/03/2025"), &profile());

        assert_eq!(record.fingerprint().len(), 64);
        assert!(record.fingerprint().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
