/// Normalizes an email address: trim, lowercase, and a minimal shape check.
///
/// The check requires exactly one `@`, a non-empty local part, and a domain
/// containing a dot. Anything else maps to [`None`].
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return None;
    }

    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return None;
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return None;
    }

    Some(email)
}
