//! Char-boundary-safe text helpers shared by the web tools and formatters.

/// Collapse every whitespace run to one space and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Cut `text` to at most `max_chars`, preferring to end on the last '.'
/// found after `floor_chars`. Returns `None` when no cut was needed.
pub fn cut_at_sentence(text: &str, max_chars: usize, floor_chars: usize) -> Option<String> {
    if text.chars().count() <= max_chars {
        return None;
    }
    let truncated = truncate_chars(text, max_chars);
    let floor_byte = text
        .char_indices()
        .nth(floor_chars)
        .map(|(index, _)| index)
        .unwrap_or(truncated.len());
    match truncated.rfind('.') {
        Some(period) if period > floor_byte => Some(truncated[..=period].to_string()),
        _ => Some(truncated.to_string()),
    }
}
