use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\x0B' | '\x0C' | '\u{1C}' | '\u{1D}' | '\u{1E}' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

/// Collapse every whitespace run to a single space and trim the ends
pub fn collapse_whitespace(line: &str) -> String {
    WHITESPACE_RUN.replace_all(line.trim(), " ").into_owned()
}

/// Split raw text into paragraphs: one per line, whitespace collapsed,
/// lines shorter than `min_chars` dropped, source order kept.
pub fn normalize_paragraphs(text: &str, min_chars: usize) -> Vec<String> {
    text.split(is_line_break)
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty() && line.chars().count() >= min_chars)
        .collect()
}
