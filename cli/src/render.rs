//! Tabled-based rendering of engine rows into CLI table output.

use etymolog_core::models::{Glyph, Grapheme, LexiconEntry, Phoneme};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct GlyphRow {
    id: i64,
    name: String,
    category: String,
    usage: usize,
}

pub fn glyphs_table(rows: &[(&Glyph, usize)]) -> String {
    let rows: Vec<GlyphRow> = rows
        .iter()
        .map(|(g, usage)| GlyphRow {
            id: g.id,
            name: g.name.clone(),
            category: g.category.clone().unwrap_or_default(),
            usage: *usage,
        })
        .collect();
    Table::new(rows).to_string()
}

#[derive(Tabled)]
struct GraphemeRow {
    id: i64,
    name: String,
    category: String,
    glyphs: usize,
}

pub fn graphemes_table(rows: &[&Grapheme]) -> String {
    let rows: Vec<GraphemeRow> = rows
        .iter()
        .map(|g| GraphemeRow {
            id: g.id,
            name: g.name.clone(),
            category: g.category.clone().unwrap_or_default(),
            glyphs: g.glyphs.len(),
        })
        .collect();
    Table::new(rows).to_string()
}

#[derive(Tabled)]
struct PhonemeRow {
    id: i64,
    phoneme: String,
    auto_spelling: bool,
    context: String,
}

pub fn phonemes_table(rows: &[&Phoneme]) -> String {
    let rows: Vec<PhonemeRow> = rows
        .iter()
        .map(|p| PhonemeRow {
            id: p.id,
            phoneme: p.phoneme.clone(),
            auto_spelling: p.use_in_auto_spelling,
            context: p.context.clone().unwrap_or_default(),
        })
        .collect();
    Table::new(rows).to_string()
}

#[derive(Tabled)]
struct LexiconRow {
    id: i64,
    lemma: String,
    pronunciation: String,
    native: bool,
    needs_attention: bool,
}

pub fn lexicon_table(rows: &[&LexiconEntry]) -> String {
    let rows: Vec<LexiconRow> = rows
        .iter()
        .map(|e| LexiconRow {
            id: e.id,
            lemma: e.lemma.clone(),
            pronunciation: e.pronunciation.clone().unwrap_or_default(),
            native: e.is_native,
            needs_attention: e.needs_attention,
        })
        .collect();
    Table::new(rows).to_string()
}
