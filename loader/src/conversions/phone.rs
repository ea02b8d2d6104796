use tracing::warn;

/// Cleans a phone number, keeping digits and a single leading `+`.
///
/// The national number (after stripping the configured country code, when
/// present) is length-checked against `min_digits..=max_digits`. Validation
/// failure is logged but the cleaned value is still returned: a short or
/// oddly formatted number is still contact information worth persisting.
/// Only values with no digits at all map to [`None`].
pub fn clean_phone(
    raw: &str,
    country_code: &str,
    min_digits: usize,
    max_digits: usize,
) -> Option<String> {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    let national = digits.strip_prefix(country_code).unwrap_or(&digits);
    let length = national.len();
    if length < min_digits || length > max_digits {
        warn!(
            value = %digits,
            national_length = length,
            "phone number outside expected length, keeping cleaned value"
        );
    }

    let cleaned = if has_plus {
        format!("+{digits}")
    } else {
        digits
    };

    Some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_formatting() {
        assert_eq!(
            clean_phone("(01) 959-673-421", "51", 9, 9).as_deref(),
            Some("01959673421")
        );
    }

    #[test]
    fn preserves_leading_plus() {
        assert_eq!(
            clean_phone("+51 959 673 421", "51", 9, 9).as_deref(),
            Some("+51959673421")
        );
    }

    #[test]
    fn no_digits_is_none() {
        assert_eq!(clean_phone("n/a", "51", 9, 9), None);
        assert_eq!(clean_phone("", "51", 9, 9), None);
    }

    #[test]
    fn out_of_range_value_is_kept() {
        assert_eq!(clean_phone("95-967", "51", 9, 9).as_deref(), Some("95967"));
    }
}
