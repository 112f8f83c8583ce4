// Text Processing Service
// Normalization, tokenization and sentence splitting shared by every scorer.

use regex::Regex;
use std::sync::OnceLock;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}_]+(?:'[\p{L}\p{N}]+)*").expect("token regex"))
}

fn sentence_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+\s+").expect("sentence break regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

/// Normalize text before scoring and fingerprinting.
///
/// Smart quotes and dashes are folded to ASCII, every whitespace run
/// (including line breaks) collapses to a single space, and the result is
/// trimmed. Case is preserved.
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let s = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{2014}', '\u{2013}'], "-")
        .replace(['\u{3000}', '\u{00A0}'], " ");

    whitespace_re().replace_all(&s, " ").trim().to_string()
}

/// Cut `text` to at most `max_chars` characters.
/// Returns the kept prefix and whether anything was dropped.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

/// Split text into word tokens. Punctuation and whitespace separate tokens;
/// in-word apostrophes ("don't") are kept.
pub fn tokenize(text: &str) -> Vec<&str> {
    token_re().find_iter(text).map(|m| m.as_str()).collect()
}

pub fn count_words(text: &str) -> usize {
    token_re().find_iter(text).count()
}

/// Character offset of a byte index. `byte_idx` must sit on a char boundary.
pub fn char_offset(text: &str, byte_idx: usize) -> usize {
    text.get(..byte_idx).map(|s| s.chars().count()).unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceOffset {
    pub text: String,
    /// UTF-8 byte offset (0-based) into the source text.
    pub start: usize,
    /// UTF-8 byte offset (end-exclusive).
    pub end: usize,
}

/// Split sentences at `.`, `!` or `?` followed by whitespace.
/// The terminator stays with its sentence; a trailing fragment without a
/// terminator becomes the final sentence.
pub fn split_sentences(text: &str) -> Vec<SentenceOffset> {
    let mut sentences = Vec::new();
    let mut cursor = 0usize;

    for m in sentence_break_re().find_iter(text) {
        let punct_len = m.as_str().trim_end().len();
        push_trimmed(text, cursor, m.start() + punct_len, &mut sentences);
        cursor = m.end();
    }
    push_trimmed(text, cursor, text.len(), &mut sentences);

    sentences
}

fn push_trimmed(text: &str, start: usize, end: usize, out: &mut Vec<SentenceOffset>) {
    let Some(raw) = text.get(start..end) else {
        return;
    };
    let lead = raw.len() - raw.trim_start().len();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    let s = start + lead;
    out.push(SentenceOffset {
        text: trimmed.to_string(),
        start: s,
        end: s + trimmed.len(),
    });
}

/// Human-friendly preview that never cuts a code point.
pub fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}
