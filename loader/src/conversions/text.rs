use config::shared::CaseFold;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Normalizes a text value: trim, optional case fold, optional accent strip.
///
/// Returns [`None`] for values that are empty after trimming, so blank cells
/// and whitespace-only cells both map to null.
pub fn normalize_text(raw: &str, case: Option<CaseFold>, strip_accents: bool) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut text = if strip_accents {
        remove_accents(trimmed)
    } else {
        trimmed.to_string()
    };

    text = match case {
        Some(CaseFold::Upper) => text.to_uppercase(),
        Some(CaseFold::Lower) => text.to_lowercase(),
        Some(CaseFold::Title) => title_case(&text),
        None => text,
    };

    Some(text)
}

/// Removes combining marks after NFD decomposition, turning `Ñ` into `N` and
/// `é` into `e`.
fn remove_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Uppercases the first letter of every whitespace-separated word and
/// lowercases the rest.
fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut at_word_start = true;

    for c in text.chars() {
        if c.is_whitespace() {
            at_word_start = true;
            result.push(c);
        } else if at_word_start {
            result.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            result.extend(c.to_lowercase());
        }
    }

    result
}
