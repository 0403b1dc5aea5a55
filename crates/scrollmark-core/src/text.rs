#![forbid(unsafe_code)]

//! Anchor text normalization and grapheme-aware measurement.
//!
//! # Normalization
//!
//! Anchor ids are derived from text, so the text must be stable across
//! re-renders of the same content. [`normalize`] removes characters that
//! vary without changing meaning:
//!
//! - zero-width characters (ZWSP, ZWNJ, ZWJ, word joiner, BOM),
//! - bidi controls (LRM, RLM, embeddings, overrides, isolates),
//! - runs of whitespace (collapsed to one space, trimmed),
//! - leading accessibility labels such as `"You said:"`.
//!
//! # Measurement
//!
//! Widths are in terminal cells via `unicode-width`, segmented by grapheme
//! cluster so emoji and combining sequences are never split.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Whether `c` is a zero-width formatting character.
#[inline]
#[must_use]
pub fn is_zero_width(c: char) -> bool {
    matches!(c, '\u{200B}'..='\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

/// Whether `c` is a bidirectional control character.
#[inline]
#[must_use]
pub fn is_bidi_control(c: char) -> bool {
    matches!(
        c,
        '\u{061C}' | '\u{200E}' | '\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}'
    )
}

/// Strip invisible characters and collapse whitespace.
#[must_use]
pub fn strip_invisible(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if is_zero_width(c) || is_bidi_control(c) {
            continue;
        }
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(c);
    }
    out
}

/// Remove the first matching label from the start of `text`.
///
/// Matching is ASCII case-insensitive; whitespace after the label is trimmed.
#[must_use]
pub fn strip_prefixes<'a>(text: &'a str, prefixes: &[String]) -> &'a str {
    for prefix in prefixes {
        let Some(head) = text.get(..prefix.len()) else {
            continue;
        };
        if !prefix.is_empty() && head.eq_ignore_ascii_case(prefix) {
            return text[prefix.len()..].trim_start();
        }
    }
    text
}

/// Full normalization used for anchor identity and deduplication.
#[must_use]
pub fn normalize(text: &str, prefixes: &[String]) -> String {
    let cleaned = strip_invisible(text);
    strip_prefixes(&cleaned, prefixes).to_string()
}

/// Display width of a string in cells.
#[must_use]
pub fn display_width(text: &str) -> usize {
    text.graphemes(true).map(grapheme_width).sum()
}

/// Display width of a single grapheme cluster.
#[inline]
#[must_use]
pub fn grapheme_width(grapheme: &str) -> usize {
    UnicodeWidthStr::width(grapheme)
}

/// Number of grapheme clusters in `text`.
#[must_use]
pub fn grapheme_count(text: &str) -> usize {
    text.graphemes(true).count()
}

/// The first `count` grapheme clusters of `text`.
#[must_use]
pub fn take_graphemes(text: &str, count: usize) -> &str {
    match text.grapheme_indices(true).nth(count) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// Lines needed to show `text` word-wrapped at `width` cells.
///
/// Words wider than a line are broken at grapheme boundaries.
#[must_use]
pub fn wrapped_line_count(text: &str, width: usize) -> usize {
    if text.is_empty() {
        return 0;
    }
    let width = width.max(1);
    let mut lines = 1;
    let mut used = 0;
    for word in text.split_whitespace() {
        let word_width = display_width(word);
        let needed = if used == 0 { word_width } else { word_width + 1 };
        if used + needed <= width {
            used += needed;
            continue;
        }
        if used > 0 {
            lines += 1;
            used = 0;
        }
        if word_width <= width {
            used = word_width;
            continue;
        }
        for grapheme in word.graphemes(true) {
            let w = grapheme_width(grapheme);
            if used + w > width && used > 0 {
                lines += 1;
                used = 0;
            }
            used += w;
        }
    }
    lines
}
