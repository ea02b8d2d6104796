//! Field normalization: pure functions mapping raw extracted values to
//! canonical comparable forms.
//!
//! Each function recovers locally from bad input (null or sentinel
//! substitution, warn-level logs); a single bad field never aborts a batch.

mod date;
mod document;
mod email;
mod numeric;
mod phone;
mod text;

pub use date::parse_date;
pub use document::clean_document_id;
pub use email::normalize_email;
pub use numeric::{parse_numeric, round_to};
pub use phone::clean_phone;
pub use text::normalize_text;

use config::shared::FieldRule;
use tracing::warn;

use crate::types::{RawValue, Value};

/// Normalizes a single raw value according to a field rule.
///
/// Returns [`Value::Null`] for empty or unusable input. Sentinel substitution
/// for key columns happens one level up, in the record normalizer, so this
/// function stays a pure value-to-value mapping. The `field` name is only
/// used for warning context.
pub fn normalize(field: &str, raw: &RawValue, rule: &FieldRule) -> Value {
    match rule {
        FieldRule::Text {
            case,
            strip_accents,
        } => match raw.to_text().and_then(|text| {
            normalize_text(&text, *case, *strip_accents)
        }) {
            Some(text) => Value::Text(text),
            None => Value::Null,
        },
        FieldRule::Numeric { decimals } => match raw {
            RawValue::Empty => Value::Null,
            RawValue::Number(number) => Value::Numeric(round_to(*number, *decimals)),
            other => match other.to_text().map(|text| parse_numeric(&text)) {
                Some(Ok(number)) => Value::Numeric(round_to(number, *decimals)),
                Some(Err(_)) => {
                    warn!(field, value = ?other, "unparseable numeric value, using null");
                    Value::Null
                }
                None => Value::Null,
            },
        },
        FieldRule::Date { formats } => match raw {
            RawValue::Empty => Value::Null,
            RawValue::DateTime(datetime) => Value::Date(*datetime),
            other => match other.to_text() {
                Some(text) => match parse_date(&text, formats) {
                    Some(datetime) => Value::Date(datetime),
                    None => {
                        // Validation failure: the record stays in the batch
                        // with a null date, it is not silently dropped.
                        warn!(field, value = %text, "unknown date format, using null");
                        Value::Null
                    }
                },
                None => Value::Null,
            },
        },
        FieldRule::Document { min_digits } => match raw.to_text() {
            Some(text) => match clean_document_id(&text, *min_digits) {
                Some(document) => Value::Text(document),
                None => {
                    warn!(field, value = %text, "document id below minimum length");
                    Value::Null
                }
            },
            None => Value::Null,
        },
        FieldRule::Phone {
            country_code,
            min_digits,
            max_digits,
        } => match raw.to_text() {
            Some(text) => match clean_phone(&text, country_code, *min_digits, *max_digits) {
                Some(phone) => Value::Text(phone),
                None => Value::Null,
            },
            None => Value::Null,
        },
        FieldRule::Email => match raw.to_text() {
            Some(text) => match normalize_email(&text) {
                Some(email) => Value::Text(email),
                None => {
                    if !text.trim().is_empty() {
                        warn!(field, value = %text, "malformed email address, using null");
                    }
                    Value::Null
                }
            },
            None => Value::Null,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::shared::CaseFold;

    #[test]
    fn text_rule_trims_and_folds() {
        let rule = FieldRule::Text {
            case: Some(CaseFold::Upper),
            strip_accents: false,
        };
        let value = normalize("activity", &RawValue::Text("  visita  ".to_string()), &rule);
        assert_eq!(value, Value::Text("VISITA".to_string()));
    }

    #[test]
    fn empty_text_becomes_null() {
        let rule = FieldRule::Text {
            case: None,
            strip_accents: false,
        };
        assert_eq!(
            normalize("detail", &RawValue::Text("   ".to_string()), &rule),
            Value::Null
        );
        assert_eq!(normalize("detail", &RawValue::Empty, &rule), Value::Null);
    }

    #[test]
    fn numeric_rule_rounds_to_fixed_decimals() {
        let rule = FieldRule::Numeric { decimals: 6 };
        assert_eq!(
            normalize("latitude", &RawValue::Number(-12.345_599_999), &rule),
            Value::Numeric(-12.3456)
        );
        assert_eq!(
            normalize("latitude", &RawValue::Text("12.3456".to_string()), &rule),
            Value::Numeric(12.3456)
        );
    }

    #[test]
    fn unparseable_numeric_becomes_null() {
        let rule = FieldRule::Numeric { decimals: 6 };
        assert_eq!(
            normalize("latitude", &RawValue::Text("n/a".to_string()), &rule),
            Value::Null
        );
    }

    #[test]
    fn unparseable_date_becomes_null() {
        let rule = FieldRule::Date {
            formats: vec!["%d/%m/%Y".to_string()],
        };
        assert_eq!(
            normalize("date", &RawValue::Text("sometime".to_string()), &rule),
            Value::Null
        );
    }

    #[test]
    fn phone_validation_failure_keeps_cleaned_value() {
        let rule = FieldRule::Phone {
            country_code: "51".to_string(),
            min_digits: 9,
            max_digits: 9,
        };
        // Too short to be a valid national number, but still contactable
        // information worth keeping.
        let value = normalize("phone", &RawValue::Text("95-967".to_string()), &rule);
        assert_eq!(value, Value::Text("95967".to_string()));
    }
}
