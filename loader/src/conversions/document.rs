/// Cleans a document identifier down to its digits.
///
/// Separators, check-digit punctuation and stray letters are dropped. Returns
/// [`None`] when fewer than `min_digits` digits remain, which covers both
/// empty cells and placeholder values like "-".
pub fn clean_document_id(raw: &str, min_digits: usize) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < min_digits {
        return None;
    }

    Some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_separators() {
        assert_eq!(
            clean_document_id("12.345.678-9", 8).as_deref(),
            Some("123456789")
        );
    }

    #[test]
    fn short_values_are_rejected() {
        assert_eq!(clean_document_id("12345", 8), None);
        assert_eq!(clean_document_id("-", 8), None);
        assert_eq!(clean_document_id("", 8), None);
    }
}
