//! Phoneme CRUD (C9): IPA pronunciations owned by a grapheme.

use std::collections::HashMap;

use crate::errors::{EngineError, EngineResult};
use crate::models::Phoneme;

#[derive(Clone, Debug, Default)]
pub struct PhonemePatch {
    pub phoneme: Option<String>,
    pub use_in_auto_spelling: Option<bool>,
    pub context: Option<Option<String>>,
}

#[derive(Default)]
pub struct PhonemeStore {
    phonemes: HashMap<i64, Phoneme>,
}

impl PhonemeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        id: i64,
        grapheme_id: i64,
        phoneme: String,
        use_in_auto_spelling: bool,
        context: Option<String>,
    ) -> EngineResult<&Phoneme> {
        if phoneme.trim().is_empty() {
            return Err(EngineError::validation("phoneme must not be empty"));
        }
        let row = Phoneme {
            id,
            grapheme_id,
            phoneme,
            use_in_auto_spelling,
            context,
        };
        self.phonemes.insert(id, row);
        Ok(self.phonemes.get(&id).expect("just inserted"))
    }

    pub fn get_by_id(&self, id: i64) -> EngineResult<&Phoneme> {
        self.phonemes
            .get(&id)
            .ok_or(EngineError::not_found("phoneme", id))
    }

    pub fn get_by_grapheme_id(&self, grapheme_id: i64) -> Vec<&Phoneme> {
        let mut rows: Vec<&Phoneme> = self
            .phonemes
            .values()
            .filter(|p| p.grapheme_id == grapheme_id)
            .collect();
        rows.sort_by_key(|p| p.id);
        rows
    }

    pub fn update(&mut self, id: i64, patch: PhonemePatch) -> EngineResult<&Phoneme> {
        if let Some(ref phoneme) = patch.phoneme {
            if phoneme.trim().is_empty() {
                return Err(EngineError::validation("phoneme must not be empty"));
            }
        }
        let row = self
            .phonemes
            .get_mut(&id)
            .ok_or(EngineError::not_found("phoneme", id))?;
        if let Some(phoneme) = patch.phoneme {
            row.phoneme = phoneme;
        }
        if let Some(use_in_auto_spelling) = patch.use_in_auto_spelling {
            row.use_in_auto_spelling = use_in_auto_spelling;
        }
        if let Some(context) = patch.context {
            row.context = context;
        }
        Ok(self.phonemes.get(&id).expect("checked above"))
    }

    pub fn delete(&mut self, id: i64) -> EngineResult<Phoneme> {
        self.phonemes
            .remove(&id)
            .ok_or(EngineError::not_found("phoneme", id))
    }

    /// Deletes every phoneme owned by `grapheme_id`; returns the removed rows.
    pub fn delete_all_for_grapheme(&mut self, grapheme_id: i64) -> Vec<Phoneme> {
        let ids: Vec<i64> = self
            .phonemes
            .values()
            .filter(|p| p.grapheme_id == grapheme_id)
            .map(|p| p.id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.phonemes.remove(&id))
            .collect()
    }

    /// Every phoneme row eligible for the auto-spell matcher, sorted by id.
    pub fn get_auto_spelling(&self) -> Vec<&Phoneme> {
        let mut rows: Vec<&Phoneme> = self
            .phonemes
            .values()
            .filter(|p| p.use_in_auto_spelling)
            .collect();
        rows.sort_by_key(|p| p.id);
        rows
    }

    pub fn all(&self) -> Vec<&Phoneme> {
        let mut rows: Vec<&Phoneme> = self.phonemes.values().collect();
        rows.sort_by_key(|p| p.id);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_empty_phoneme_string() {
        let mut store = PhonemeStore::new();
        let err = store.add(1, 1, "  ".into(), true, None).unwrap_err();
        assert!(matches!(err, EngineError::ValidationError(_)));
    }

    #[test]
    fn delete_all_for_grapheme_removes_only_that_grapheme_rows() {
        let mut store = PhonemeStore::new();
        store.add(1, 10, "a".into(), true, None).unwrap();
        store.add(2, 10, "b".into(), true, None).unwrap();
        store.add(3, 20, "c".into(), true, None).unwrap();

        let removed = store.delete_all_for_grapheme(10);
        assert_eq!(removed.len(), 2);
        assert_eq!(store.get_by_grapheme_id(10).len(), 0);
        assert_eq!(store.get_by_grapheme_id(20).len(), 1);
    }

    #[test]
    fn get_auto_spelling_filters_disabled_rows() {
        let mut store = PhonemeStore::new();
        store.add(1, 10, "a".into(), true, None).unwrap();
        store.add(2, 10, "b".into(), false, None).unwrap();
        assert_eq!(store.get_auto_spelling().len(), 1);
    }
}
