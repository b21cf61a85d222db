//! Grapheme CRUD (C9): ordered glyph compositions that may carry phonemes.
//!
//! The restricted-delete check (blocked while any lexicon entry's junction
//! references the grapheme) and the repair protocol that follows a successful
//! delete both need the lexicon store's usage index, so — like glyph
//! deletion — the restricted/cascade variants are orchestrated by
//! [`crate::store::Database`]; this module owns the plain composition CRUD.

use std::collections::HashMap;

use crate::errors::{EngineError, EngineResult};
use crate::models::{Grapheme, GraphemeGlyph, Phoneme};
use crate::phoneme_table::PhonemeTable;
use crate::phonemes::PhonemeStore;

#[derive(Clone, Debug, Default)]
pub struct GraphemePatch {
    pub name: Option<String>,
    pub category: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

/// A grapheme together with its owned phoneme rows, for the "complete" reads.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphemeComplete {
    pub grapheme: Grapheme,
    pub phonemes: Vec<Phoneme>,
}

#[derive(Default)]
pub struct GraphemeStore {
    graphemes: HashMap<i64, Grapheme>,
}

fn validate_composition(glyphs: &[GraphemeGlyph]) -> EngineResult<()> {
    if glyphs.is_empty() {
        return Err(EngineError::validation(
            "a grapheme must have at least one glyph",
        ));
    }
    Ok(())
}

impl GraphemeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        id: i64,
        name: String,
        category: Option<String>,
        notes: Option<String>,
        glyphs: Vec<GraphemeGlyph>,
        now: i64,
    ) -> EngineResult<&Grapheme> {
        if name.trim().is_empty() {
            return Err(EngineError::validation("grapheme name must not be empty"));
        }
        validate_composition(&glyphs)?;

        let grapheme = Grapheme {
            id,
            name,
            category,
            notes,
            glyphs,
            created_at: now,
            updated_at: now,
        };
        self.graphemes.insert(id, grapheme);
        Ok(self.graphemes.get(&id).expect("just inserted"))
    }

    pub fn get_by_id(&self, id: i64) -> EngineResult<&Grapheme> {
        self.graphemes
            .get(&id)
            .ok_or(EngineError::not_found("grapheme", id))
    }

    pub fn get_by_id_complete(
        &self,
        id: i64,
        phonemes: &PhonemeStore,
    ) -> EngineResult<GraphemeComplete> {
        let grapheme = self.get_by_id(id)?.clone();
        let owned = phonemes
            .get_by_grapheme_id(id)
            .into_iter()
            .cloned()
            .collect();
        Ok(GraphemeComplete {
            grapheme,
            phonemes: owned,
        })
    }

    pub fn get_all(&self) -> Vec<&Grapheme> {
        let mut all: Vec<&Grapheme> = self.graphemes.values().collect();
        all.sort_by_key(|g| g.id);
        all
    }

    pub fn get_all_complete(&self, phonemes: &PhonemeStore) -> Vec<GraphemeComplete> {
        self.get_all()
            .into_iter()
            .map(|g| GraphemeComplete {
                grapheme: g.clone(),
                phonemes: phonemes
                    .get_by_grapheme_id(g.id)
                    .into_iter()
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    pub fn search(&self, query: &str) -> Vec<&Grapheme> {
        let needle = query.to_lowercase();
        let mut matches: Vec<&Grapheme> = self
            .graphemes
            .values()
            .filter(|g| g.name.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by_key(|g| g.id);
        matches
    }

    pub fn update(&mut self, id: i64, patch: GraphemePatch, now: i64) -> EngineResult<&Grapheme> {
        if let Some(ref name) = patch.name {
            if name.trim().is_empty() {
                return Err(EngineError::validation("grapheme name must not be empty"));
            }
        }
        let grapheme = self
            .graphemes
            .get_mut(&id)
            .ok_or(EngineError::not_found("grapheme", id))?;
        if let Some(name) = patch.name {
            grapheme.name = name;
        }
        if let Some(category) = patch.category {
            grapheme.category = category;
        }
        if let Some(notes) = patch.notes {
            grapheme.notes = notes;
        }
        grapheme.updated_at = now;
        Ok(self.graphemes.get(&id).expect("checked above"))
    }

    pub fn update_glyphs(
        &mut self,
        id: i64,
        glyphs: Vec<GraphemeGlyph>,
        now: i64,
    ) -> EngineResult<&Grapheme> {
        validate_composition(&glyphs)?;
        let grapheme = self
            .graphemes
            .get_mut(&id)
            .ok_or(EngineError::not_found("grapheme", id))?;
        grapheme.glyphs = glyphs;
        grapheme.updated_at = now;
        Ok(self.graphemes.get(&id).expect("checked above"))
    }

    /// Unconditional delete; the caller honors the lexicon-junction restriction.
    pub fn remove(&mut self, id: i64) -> EngineResult<Grapheme> {
        self.graphemes
            .remove(&id)
            .ok_or(EngineError::not_found("grapheme", id))
    }

    pub fn exists(&self, id: i64) -> bool {
        self.graphemes.contains_key(&id)
    }

    /// Every grapheme that composes `glyph_id`, used by glyph usage counting
    /// and by the unlink step of a glyph's force-delete.
    pub fn containing_glyph(&self, glyph_id: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .graphemes
            .values()
            .filter(|g| g.glyphs.iter().any(|gg| gg.glyph_id == glyph_id))
            .map(|g| g.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Removes every composition row referencing `glyph_id` from every grapheme.
    /// Leaves graphemes with an empty composition for the caller to then delete
    /// or repair, per the force-delete contract.
    pub fn unlink_glyph(&mut self, glyph_id: i64, now: i64) {
        for grapheme in self.graphemes.values_mut() {
            let before = grapheme.glyphs.len();
            grapheme.glyphs.retain(|gg| gg.glyph_id != glyph_id);
            if grapheme.glyphs.len() != before {
                grapheme.updated_at = now;
            }
        }
    }

    /// Graphemes owning a phoneme equal to `phoneme`, sorted by id.
    pub fn get_by_phoneme<'a>(&'a self, phoneme: &str, phonemes: &PhonemeStore) -> Vec<&'a Grapheme> {
        let mut owners: Vec<i64> = phonemes
            .all()
            .into_iter()
            .filter(|p| p.phoneme == phoneme)
            .map(|p| p.grapheme_id)
            .collect();
        owners.sort_unstable();
        owners.dedup();
        owners
            .into_iter()
            .filter_map(|id| self.graphemes.get(&id))
            .collect()
    }

    /// The derived phoneme→grapheme map (see [`crate::phoneme_table`]).
    pub fn get_phoneme_map(&self, phonemes: &PhonemeStore) -> PhonemeTable {
        PhonemeTable::build(phonemes.get_auto_spelling().into_iter())
    }
}
