//! The spelling codec (C1): the textual encoding of a lexicon entry's `glyph_order`.
//!
//! A spelling entry is, on the wire, just a string: `grapheme-{id}` for a grapheme
//! reference, anything else for an IPA fallback character. The textual form is
//! normative, not an implementation detail, so `classify` is the one place that
//! interprets it.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

fn grapheme_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^grapheme-([1-9][0-9]*)$").expect("static pattern"))
}

/// One element of a lexicon entry's ordered spelling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpellingEntry {
    GraphemeRef(i64),
    Ipa(String),
}

impl SpellingEntry {
    pub fn grapheme(id: i64) -> Self {
        SpellingEntry::GraphemeRef(id)
    }

    pub fn ipa(ch: impl Into<String>) -> Self {
        SpellingEntry::Ipa(ch.into())
    }

    fn to_wire(&self) -> String {
        match self {
            SpellingEntry::GraphemeRef(id) => format!("grapheme-{id}"),
            SpellingEntry::Ipa(ch) => ch.clone(),
        }
    }

    /// Applies the classification predicate to a raw wire string. `grapheme-0` and
    /// negative ids are never grapheme-refs; an empty string is never a valid IPA-char.
    pub fn classify(raw: &str) -> Option<SpellingEntry> {
        if let Some(caps) = grapheme_ref_pattern().captures(raw) {
            let id: i64 = caps[1].parse().ok()?;
            return Some(SpellingEntry::GraphemeRef(id));
        }
        if raw.is_empty() {
            return None;
        }
        Some(SpellingEntry::Ipa(raw.to_string()))
    }
}

/// JSON-encodes an ordered sequence of spelling entries to the `glyph_order` payload.
///
/// Deterministic: the same sequence always serializes to the same string.
pub fn encode(entries: &[SpellingEntry]) -> String {
    let wire: Vec<String> = entries.iter().map(SpellingEntry::to_wire).collect();
    serde_json::to_string(&wire).unwrap_or_else(|_| "[]".to_string())
}

/// Decodes a `glyph_order` payload. Tolerates null/empty/malformed input by
/// returning an empty sequence; never panics.
pub fn decode(raw: &str) -> Vec<SpellingEntry> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    let wire: Vec<RawEntry> = match serde_json::from_str(raw) {
        Ok(w) => w,
        Err(_) => return Vec::new(),
    };
    wire.into_iter()
        .filter_map(|entry| SpellingEntry::classify(&entry.0))
        .collect()
}

/// Wraps a single wire string so malformed arrays (mixed types, nulls) decode
/// element-by-element instead of failing the whole payload.
#[derive(Deserialize, Serialize)]
#[serde(transparent)]
struct RawEntry(String);

/// Returns the unique grapheme ids referenced by `entries`, in first-appearance order.
pub fn grapheme_id_set(entries: &[SpellingEntry]) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    let mut ordered = Vec::new();
    for entry in entries {
        if let SpellingEntry::GraphemeRef(id) = entry {
            if seen.insert(*id) {
                ordered.push(*id);
            }
        }
    }
    ordered
}

/// True if any entry in `entries` is an IPA fallback rather than a grapheme reference.
pub fn has_ipa_fallbacks(entries: &[SpellingEntry]) -> bool {
    entries.iter().any(|e| matches!(e, SpellingEntry::Ipa(_)))
}
