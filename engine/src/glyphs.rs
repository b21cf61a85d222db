//! Glyph CRUD (C9): the base drawable-symbol store. Usage counting and the
//! restricted/force/cascade delete variants need visibility into the grapheme
//! store's compositions, so only the plain per-entity operations live here —
//! [`crate::store::Database`] orchestrates the cross-store ones.

use std::collections::HashMap;

use crate::errors::{EngineError, EngineResult};
use crate::models::Glyph;

#[derive(Clone, Debug, Default)]
pub struct GlyphPatch {
    pub name: Option<String>,
    pub svg_data: Option<String>,
    pub category: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

#[derive(Default)]
pub struct GlyphStore {
    glyphs: HashMap<i64, Glyph>,
}

impl GlyphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        id: i64,
        name: String,
        svg_data: String,
        category: Option<String>,
        notes: Option<String>,
        now: i64,
    ) -> EngineResult<&Glyph> {
        if name.trim().is_empty() {
            return Err(EngineError::validation("glyph name must not be empty"));
        }
        if self.name_exists(&name, None) {
            return Err(EngineError::constraint(format!(
                "a glyph named {name:?} already exists"
            )));
        }
        let glyph = Glyph {
            id,
            name,
            svg_data,
            category,
            notes,
            created_at: now,
            updated_at: now,
        };
        self.glyphs.insert(id, glyph);
        Ok(self.glyphs.get(&id).expect("just inserted"))
    }

    pub fn get_by_id(&self, id: i64) -> EngineResult<&Glyph> {
        self.glyphs.get(&id).ok_or(EngineError::not_found("glyph", id))
    }

    pub fn get_all(&self) -> Vec<&Glyph> {
        let mut all: Vec<&Glyph> = self.glyphs.values().collect();
        all.sort_by_key(|g| g.id);
        all
    }

    pub fn search(&self, query: &str) -> Vec<&Glyph> {
        let needle = query.to_lowercase();
        let mut matches: Vec<&Glyph> = self
            .glyphs
            .values()
            .filter(|g| g.name.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by_key(|g| g.id);
        matches
    }

    pub fn update(&mut self, id: i64, patch: GlyphPatch, now: i64) -> EngineResult<&Glyph> {
        if let Some(ref name) = patch.name {
            if name.trim().is_empty() {
                return Err(EngineError::validation("glyph name must not be empty"));
            }
            if self.name_exists(name, Some(id)) {
                return Err(EngineError::constraint(format!(
                    "a glyph named {name:?} already exists"
                )));
            }
        }
        let glyph = self
            .glyphs
            .get_mut(&id)
            .ok_or(EngineError::not_found("glyph", id))?;
        if let Some(name) = patch.name {
            glyph.name = name;
        }
        if let Some(svg_data) = patch.svg_data {
            glyph.svg_data = svg_data;
        }
        if let Some(category) = patch.category {
            glyph.category = category;
        }
        if let Some(notes) = patch.notes {
            glyph.notes = notes;
        }
        glyph.updated_at = now;
        Ok(self.glyphs.get(&id).expect("checked above"))
    }

    /// Unconditional delete; the caller is responsible for honoring the
    /// restricted/force/cascade contract before calling this.
    pub fn remove(&mut self, id: i64) -> EngineResult<Glyph> {
        self.glyphs.remove(&id).ok_or(EngineError::not_found("glyph", id))
    }

    pub fn name_exists(&self, name: &str, excluding: Option<i64>) -> bool {
        self.glyphs
            .values()
            .any(|g| g.name == name && Some(g.id) != excluding)
    }

    pub fn exists(&self, id: i64) -> bool {
        self.glyphs.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_duplicate_name() {
        let mut store = GlyphStore::new();
        store.create(1, "dot".into(), "<svg/>".into(), None, None, 0).unwrap();
        let err = store
            .create(2, "dot".into(), "<svg/>".into(), None, None, 0)
            .unwrap_err();
        assert!(matches!(err, EngineError::ConstraintViolation(_)));
    }

    #[test]
    fn update_rename_checks_duplicates_excluding_self() {
        let mut store = GlyphStore::new();
        store.create(1, "dot".into(), "<svg/>".into(), None, None, 0).unwrap();
        // renaming to its own current name is fine
        store
            .update(1, GlyphPatch { name: Some("dot".into()), ..Default::default() }, 1)
            .unwrap();
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let mut store = GlyphStore::new();
        store.create(1, "Circle".into(), "<svg/>".into(), None, None, 0).unwrap();
        assert_eq!(store.search("circ").len(), 1);
    }
}
