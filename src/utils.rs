//! # Utilities Module
//!
//! ## Purpose
//! Common text helpers shared across the parser, matcher, and enhancer:
//! normalization for lexical comparison, log-safe previews, and bbox keying
//! for deduplication.
//!
//! ## Input/Output Specification
//! - **Input**: Raw text fragments, bounding boxes
//! - **Output**: Normalized comparison strings, truncated previews, hashable keys

use crate::BBox;
use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

fn whitespace_regex() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

/// Light normalization: Unicode NFC, collapsed whitespace, lowercase.
///
/// Used for the flattened searchable text, where positions must stay
/// consistent with the recorded span map.
pub fn normalize_text(text: &str) -> String {
    let normalized: String = text.nfc().collect();
    let collapsed = whitespace_regex().replace_all(&normalized, " ");
    collapsed.trim().to_lowercase()
}

/// Full normalization for marker/sentence comparison.
///
/// Markers are compared to source sentences case-insensitively with collapsed
/// whitespace and without trailing punctuation, since the model frequently
/// drops a period or reflows line breaks when quoting.
pub fn normalize_for_match(text: &str) -> String {
    normalize_text(text)
        .trim_end_matches(['.', ',', '!', '?', ';', ':'])
        .to_string()
}

/// Truncate text to a character budget for log/diagnostic messages
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Bit-exact key for a bounding box, usable in hash sets.
///
/// Geometry comes straight from the ingestion-time mapping and is never
/// recomputed, so identical sentences always carry identical bits.
pub fn bbox_key(bbox: &BBox) -> [u64; 4] {
    [
        bbox[0].to_bits(),
        bbox[1].to_bits(),
        bbox[2].to_bits(),
        bbox[3].to_bits(),
    ]
}
