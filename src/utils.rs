//! Utility functions shared by the resolver, query layer and detectors.

/// Reduce an address to its digits so formatting never affects equality.
///
/// `"+1 (415) 555-1234"` and `"14155551234"` normalize to the same value.
#[must_use]
pub fn normalize_address(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Whether two addresses refer to the same handle once normalized.
///
/// Addresses with no digits at all (e-mail handles) compare
/// case-insensitively on their trimmed text instead.
#[must_use]
pub fn addresses_match(a: &str, b: &str) -> bool {
    let (na, nb) = (normalize_address(a), normalize_address(b));
    if na.is_empty() || nb.is_empty() {
        return a.trim().eq_ignore_ascii_case(b.trim());
    }
    na == nb
}

/// Truncate to at most `max_chars` characters without splitting a code point.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'` clause.
#[must_use]
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `%value%` with LIKE wildcards in `value` escaped.
#[must_use]
pub fn contains_pattern(value: &str) -> String {
    format!("%{}%", escape_like(value))
}
