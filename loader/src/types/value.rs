use chrono::{NaiveDate, NaiveDateTime};

/// Canonical string substituted for null or missing values when building
/// fingerprints, so that null-vs-null comparisons are stable.
pub const NULL_SENTINEL: &str = "NULL";

/// Canonical textual format for date values in fingerprints and comparisons.
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A raw cell value as produced by a record source, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Empty or missing cell.
    Empty,
    /// Textual cell content.
    Text(String),
    /// Numeric cell content.
    Number(f64),
    /// Date or datetime cell content, already typed by the source.
    DateTime(NaiveDateTime),
    /// Boolean cell content.
    Bool(bool),
}

impl RawValue {
    /// Returns the raw value as a string for parsers that work on text.
    ///
    /// Numbers are rendered in their shortest form so `12` does not become
    /// `12.0` when a document id arrives through a numeric cell.
    pub fn to_text(&self) -> Option<String> {
        match self {
            RawValue::Empty => None,
            RawValue::Text(text) => Some(text.clone()),
            RawValue::Number(number) => {
                if number.fract() == 0.0 && number.abs() < 1e15 {
                    Some(format!("{}", *number as i64))
                } else {
                    Some(number.to_string())
                }
            }
            RawValue::DateTime(datetime) => {
                Some(datetime.format(CANONICAL_DATE_FORMAT).to_string())
            }
            RawValue::Bool(value) => Some(value.to_string()),
        }
    }
}

/// A normalized field value.
///
/// Only the shapes the persisted schema knows about exist here: text, numeric
/// and date, plus null. Everything a source produces is funneled into one of
/// these by the conversions module.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Numeric(f64),
    Date(NaiveDateTime),
}

impl Value {
    /// Returns whether this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the canonical string form used for fingerprints.
    ///
    /// Numeric values are rendered with a fixed number of decimals so that
    /// floating point representation differences cannot change a fingerprint;
    /// dates use [`CANONICAL_DATE_FORMAT`]; nulls collapse to [`NULL_SENTINEL`].
    pub fn canonical_string(&self, decimals: u32) -> String {
        match self {
            Value::Null => NULL_SENTINEL.to_string(),
            Value::Text(text) => text.clone(),
            Value::Numeric(number) => format!("{number:.precision$}", precision = decimals as usize),
            Value::Date(datetime) => datetime.format(CANONICAL_DATE_FORMAT).to_string(),
        }
    }

    /// Returns the date part, if this value carries a date.
    pub fn as_partition_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(datetime) => Some(datetime.date()),
            _ => None,
        }
    }

    /// Returns a human-readable rendering for logs and audit rows.
    ///
    /// Unlike [`Value::canonical_string`], nulls render as [`None`] so audit
    /// rows can store SQL nulls instead of sentinel text.
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Text(text) => Some(text.clone()),
            Value::Numeric(number) => Some(number.to_string()),
            Value::Date(datetime) => Some(datetime.format(CANONICAL_DATE_FORMAT).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn canonical_numeric_uses_fixed_decimals() {
        assert_eq!(Value::Numeric(12.3456).canonical_string(6), "12.345600");
        assert_eq!(Value::Numeric(12.3456).canonical_string(2), "12.35");
    }

    #[test]
    fn canonical_null_is_the_sentinel() {
        assert_eq!(Value::Null.canonical_string(6), "NULL");
    }

    #[test]
    fn canonical_date_is_second_resolution() {
        let datetime = NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(
            Value::Date(datetime).canonical_string(6),
            "2025-03-14 09:30:00"
        );
    }

    #[test]
    fn raw_integer_numbers_render_without_fraction() {
        assert_eq!(
            RawValue::Number(44137762.0).to_text().as_deref(),
            Some("44137762")
        );
        assert_eq!(RawValue::Number(1.5).to_text().as_deref(), Some("1.5"));
    }
}
