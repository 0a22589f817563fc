// src/utils/text.rs
use once_cell::sync::Lazy;
use regex::Regex;

static INLINE_SPACE_RE: Lazy<Regex> = Lazy::new(|| {
    // Half-width runs only; the ideographic space is folded in first.
    Regex::new(r"[ \t\r\f\v]+").expect("Failed to compile INLINE_SPACE_RE")
});

static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\n{3,}").expect("Failed to compile BLANK_RUN_RE")
});

/// Collapses redundant spaces and blank lines.
///
/// Every line is trimmed, runs of spaces (including U+3000 and NBSP) become a
/// single space, and any run of blank lines becomes exactly one blank line.
pub fn normalize_whitespace(text: &str) -> String {
    let folded = text.replace(['\u{3000}', '\u{00a0}'], " ");
    let lines: Vec<String> = folded
        .lines()
        .map(|line| INLINE_SPACE_RE.replace_all(line.trim(), " ").into_owned())
        .collect();
    let joined = lines.join("\n");
    BLANK_RUN_RE.replace_all(&joined, "\n\n").trim().to_string()
}

/// Truncates to at most `max_chars` characters, appending an ellipsis marker
/// when anything was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
