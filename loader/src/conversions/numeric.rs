use std::num::ParseFloatError;

/// Parses a numeric value from its textual form.
pub fn parse_numeric(raw: &str) -> Result<f64, ParseFloatError> {
    raw.trim().parse::<f64>()
}

/// Rounds a number to a fixed count of decimals.
///
/// Fingerprints and comparisons both go through this, so two raw inputs that
/// differ only in floating point noise end up equal.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_requested_precision() {
        assert_eq!(round_to(12.345_599_999, 6), 12.3456);
        assert_eq!(round_to(-77.028_333_333, 6), -77.028_333);
        assert_eq!(round_to(10.0, 6), 10.0);
    }

    #[test]
    fn parses_with_surrounding_whitespace() {
        assert_eq!(parse_numeric(" 12.5 ").unwrap(), 12.5);
        assert!(parse_numeric("12,5").is_err());
    }
}
