use chrono::{NaiveDate, NaiveDateTime};

/// Parses a date or datetime against an ordered list of format patterns.
///
/// The first matching format wins. Formats without a time component produce
/// midnight, so date-only and datetime columns share one canonical type.
pub fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in formats {
        if format_has_time(format) {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Some(datetime);
            }
        } else if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Returns whether a chrono format string contains a time specifier.
fn format_has_time(format: &str) -> bool {
    ["%H", "%M", "%S", "%T"]
        .iter()
        .any(|spec| format.contains(spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats() -> Vec<String> {
        ["%d/%m/%Y %H:%M", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y", "%Y-%m-%d"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn first_matching_format_wins() {
        let parsed = parse_date("14/03/2025 09:30", &formats()).unwrap();
        assert_eq!(parsed.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-03-14 09:30:00");
    }

    #[test]
    fn date_only_formats_produce_midnight() {
        let parsed = parse_date("14/03/2025", &formats()).unwrap();
        assert_eq!(parsed.format("%H:%M:%S").to_string(), "00:00:00");
    }

    #[test]
    fn unknown_format_is_none() {
        assert_eq!(parse_date("March 14th", &formats()), None);
        assert_eq!(parse_date("", &formats()), None);
    }
}
