//! Text canonicalization for consistent embedding input.
//!
//! The same visual text must always produce the same canonical form, which in
//! turn produces the same vector. Queries and catalog texts both pass through
//! here before encoding.
//!
//! Pipeline:
//!
//! 1. Unicode NFC normalization: "café" (decomposed) becomes "café" (composed)
//! 2. Whitespace normalization: collapse runs, trim
//! 3. Truncation: limit to [`MAX_EMBED_CHARS`]

use unicode_normalization::UnicodeNormalization;

/// Maximum characters to keep after canonicalization. Job-role queries and
/// catalog attribute strings are short; anything longer is noise.
pub const MAX_EMBED_CHARS: usize = 2000;

/// Canonicalize text for embedding. Deterministic: the same visual input
/// always produces the same output.
pub fn canonicalize_for_embedding(text: &str) -> String {
    let normalized: String = text.nfc().collect();
    let collapsed = normalize_whitespace(&normalized);
    truncate_to_chars(&collapsed, MAX_EMBED_CHARS)
}

/// Collapse whitespace runs into single spaces and trim the ends.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` characters (not bytes), respecting UTF-8
/// boundaries.
fn truncate_to_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}
