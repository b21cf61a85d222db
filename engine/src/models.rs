//! The data model: glyphs, graphemes, phonemes, lexicon entries, and ancestry edges.
//!
//! These are plain row structs; the invariants that bind them (junction consistency,
//! closure soundness, …) live in the modules that own the corresponding table.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// A drawable symbol. The `svg_data` payload is opaque to the engine; rendering it
/// is the drawing surface's job, out of scope here.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Glyph {
    pub id: i64,
    pub name: String,
    pub svg_data: String,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One glyph's placement within a grapheme's composition.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphemeGlyph {
    pub glyph_id: i64,
    pub position: i32,
    pub transform: Option<String>,
}

/// An ordered composition of glyphs, optionally carrying phonemes.
///
/// Invariant: a grapheme has at least one glyph at all times; the caller is
/// responsible for deleting the grapheme when its last glyph is removed.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Grapheme {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub glyphs: Vec<GraphemeGlyph>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// An IPA pronunciation carried by a grapheme.
///
/// No uniqueness is enforced on `phoneme` across graphemes; ties for auto-spelling
/// purposes are resolved by smallest `grapheme_id` (see [`crate::phoneme_table`]).
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Phoneme {
    pub id: i64,
    pub grapheme_id: i64,
    pub phoneme: String,
    pub use_in_auto_spelling: bool,
    pub context: Option<String>,
}

/// A lexicon entry. `glyph_order` (see [`crate::spelling`]) is the source of truth
/// for the entry's spelling; the junction table in [`crate::lexicon`] is derived from it.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LexiconEntry {
    pub id: i64,
    pub lemma: String,
    pub pronunciation: Option<String>,
    pub is_native: bool,
    pub auto_spell: bool,
    pub meaning: Option<String>,
    pub part_of_speech: Option<String>,
    pub notes: Option<String>,
    pub glyph_order: String,
    pub needs_attention: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// How a lexicon entry relates to one of its ancestors.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AncestryType {
    #[default]
    Derived,
    Borrowed,
    Compound,
    Blend,
    Calque,
    Other,
}

/// An adjacency edge: `lexicon_id` is the child, `ancestor_id` the parent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AncestryEdge {
    pub lexicon_id: i64,
    pub ancestor_id: i64,
    pub position: i32,
    pub ancestry_type: AncestryType,
}

/// A materialized transitive-closure row. `depth` is a path length, not
/// necessarily the shortest one between incremental rebuilds (see [`crate::ancestry`]).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ClosureRow {
    pub ancestor_id: i64,
    pub descendant_id: i64,
    pub depth: u32,
}
