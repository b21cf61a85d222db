//! The lexicon store (C4): CRUD over lexicon entries plus the grapheme-usage
//! junction derived from each entry's `glyph_order`.
//!
//! The junction is not a separate source of truth — it is rebuilt from
//! `glyph_order` on every write, so it can never drift from the spelling it
//! indexes.

use std::collections::{HashMap, HashSet};

use crate::errors::{EngineError, EngineResult};
use crate::graphemes::GraphemeStore;
use crate::models::LexiconEntry;
use crate::spelling::{self, SpellingEntry};

/// One resolved element of a lexicon entry's spelling display (see
/// [`LexiconStore::get_complete`]): a grapheme-ref is resolved to its current
/// name, or — if the grapheme no longer exists — replaced with a synthetic
/// IPA placeholder without touching storage.
#[derive(Clone, Debug, PartialEq)]
pub enum SpellingDisplayEntry {
    Grapheme { grapheme_id: i64, name: String },
    Ipa(String),
}

/// A lexicon entry plus its resolved spelling display.
#[derive(Clone, Debug, PartialEq)]
pub struct LexiconComplete {
    pub entry: LexiconEntry,
    pub spelling: Vec<SpellingDisplayEntry>,
    pub has_ipa_fallbacks: bool,
}

#[derive(Clone, Debug, Default)]
pub struct LexiconPatch {
    pub lemma: Option<String>,
    pub pronunciation: Option<Option<String>>,
    pub is_native: Option<bool>,
    pub auto_spell: Option<bool>,
    pub meaning: Option<Option<String>>,
    pub part_of_speech: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub glyph_order: Option<Vec<SpellingEntry>>,
    pub needs_attention: Option<bool>,
}

#[derive(Default)]
pub struct LexiconStore {
    entries: HashMap<i64, LexiconEntry>,
    // lexicon_id -> grapheme ids it currently references, first-appearance order
    junction: HashMap<i64, Vec<i64>>,
    // grapheme_id -> lexicon ids that reference it; the reverse index the
    // grapheme-deletion repair protocol walks
    usage_index: HashMap<i64, HashSet<i64>>,
}

impl LexiconStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &mut self,
        id: i64,
        lemma: String,
        pronunciation: Option<String>,
        is_native: bool,
        auto_spell: bool,
        meaning: Option<String>,
        part_of_speech: Option<String>,
        notes: Option<String>,
        glyph_order: Vec<SpellingEntry>,
        now: i64,
    ) -> EngineResult<&LexiconEntry> {
        if lemma.trim().is_empty() {
            return Err(EngineError::validation("lemma must not be empty"));
        }
        if self.entries.contains_key(&id) {
            return Err(EngineError::constraint(format!(
                "lexicon entry {id} already exists"
            )));
        }

        let entry = LexiconEntry {
            id,
            lemma,
            pronunciation,
            is_native,
            auto_spell,
            meaning,
            part_of_speech,
            notes,
            glyph_order: spelling::encode(&glyph_order),
            needs_attention: false,
            created_at: now,
            updated_at: now,
        };

        self.entries.insert(id, entry);
        self.rebuild_junction_for(id);
        Ok(self.entries.get(&id).expect("just inserted"))
    }

    pub fn get(&self, id: i64) -> EngineResult<&LexiconEntry> {
        self.entries
            .get(&id)
            .ok_or(EngineError::not_found("lexicon_entry", id))
    }

    /// Sorted by `(needs_attention desc, coalesce(pronunciation, lemma) asc)`
    /// so entries awaiting review surface first.
    pub fn get_all(&self) -> Vec<&LexiconEntry> {
        let mut all: Vec<&LexiconEntry> = self.entries.values().collect();
        all.sort_by(Self::review_order);
        all
    }

    fn review_order(a: &&LexiconEntry, b: &&LexiconEntry) -> std::cmp::Ordering {
        b.needs_attention
            .cmp(&a.needs_attention)
            .then_with(|| Self::sort_key(a).cmp(Self::sort_key(b)))
            .then_with(|| a.id.cmp(&b.id))
    }

    fn sort_key(entry: &LexiconEntry) -> &str {
        entry.pronunciation.as_deref().unwrap_or(&entry.lemma)
    }

    /// Case-insensitive substring match over `lemma`, `meaning`, or `pronunciation`.
    pub fn search(&self, query: &str) -> Vec<&LexiconEntry> {
        let needle = query.to_lowercase();
        let mut matches: Vec<&LexiconEntry> = self
            .entries
            .values()
            .filter(|e| {
                e.lemma.to_lowercase().contains(&needle)
                    || e.meaning
                        .as_ref()
                        .is_some_and(|m| m.to_lowercase().contains(&needle))
                    || e.pronunciation
                        .as_ref()
                        .is_some_and(|p| p.to_lowercase().contains(&needle))
            })
            .collect();
        matches.sort_by_key(|e| e.id);
        matches
    }

    /// Every entry with the given `is_native` flag, in the same
    /// review order as [`Self::get_all`].
    pub fn get_by_native(&self, is_native: bool) -> Vec<&LexiconEntry> {
        let mut matches: Vec<&LexiconEntry> = self
            .entries
            .values()
            .filter(|e| e.is_native == is_native)
            .collect();
        matches.sort_by(Self::review_order);
        matches
    }

    /// The entry plus its spelling resolved against the current grapheme
    /// table: each grapheme-ref becomes its grapheme's name, or — if the
    /// grapheme no longer exists — a synthetic `[?{id}]` placeholder with
    /// `has_ipa_fallbacks` set. Read-only; never mutates storage.
    pub fn get_complete(&self, id: i64, graphemes: &GraphemeStore) -> EngineResult<LexiconComplete> {
        let entry = self.get(id)?.clone();
        let mut has_ipa_fallbacks = false;
        let spelling = spelling::decode(&entry.glyph_order)
            .into_iter()
            .map(|e| match e {
                SpellingEntry::GraphemeRef(grapheme_id) => match graphemes.get_by_id(grapheme_id) {
                    Ok(g) => SpellingDisplayEntry::Grapheme {
                        grapheme_id,
                        name: g.name.clone(),
                    },
                    Err(_) => {
                        has_ipa_fallbacks = true;
                        SpellingDisplayEntry::Ipa(format!("[?{grapheme_id}]"))
                    }
                },
                SpellingEntry::Ipa(ch) => SpellingDisplayEntry::Ipa(ch),
            })
            .collect();
        Ok(LexiconComplete {
            entry,
            spelling,
            has_ipa_fallbacks,
        })
    }

    pub fn get_all_complete(&self, graphemes: &GraphemeStore) -> Vec<LexiconComplete> {
        self.get_all()
            .into_iter()
            .map(|e| {
                self.get_complete(e.id, graphemes)
                    .expect("id came from get_all")
            })
            .collect()
    }

    pub fn update(&mut self, id: i64, patch: LexiconPatch, now: i64) -> EngineResult<&LexiconEntry> {
        if !self.entries.contains_key(&id) {
            return Err(EngineError::not_found("lexicon_entry", id));
        }

        let glyph_order_changed = patch.glyph_order.is_some();
        {
            let entry = self.entries.get_mut(&id).expect("checked above");
            if let Some(lemma) = patch.lemma {
                if lemma.trim().is_empty() {
                    return Err(EngineError::validation("lemma must not be empty"));
                }
                entry.lemma = lemma;
            }
            if let Some(pronunciation) = patch.pronunciation {
                entry.pronunciation = pronunciation;
            }
            if let Some(is_native) = patch.is_native {
                entry.is_native = is_native;
            }
            if let Some(auto_spell) = patch.auto_spell {
                entry.auto_spell = auto_spell;
            }
            if let Some(meaning) = patch.meaning {
                entry.meaning = meaning;
            }
            if let Some(part_of_speech) = patch.part_of_speech {
                entry.part_of_speech = part_of_speech;
            }
            if let Some(notes) = patch.notes {
                entry.notes = notes;
            }
            if let Some(glyph_order) = patch.glyph_order {
                entry.glyph_order = spelling::encode(&glyph_order);
            }
            if let Some(needs_attention) = patch.needs_attention {
                entry.needs_attention = needs_attention;
            }
            entry.updated_at = now;
        }

        if glyph_order_changed {
            self.rebuild_junction_for(id);
        }
        Ok(self.entries.get(&id).expect("checked above"))
    }

    pub fn delete(&mut self, id: i64) -> EngineResult<LexiconEntry> {
        let entry = self
            .entries
            .remove(&id)
            .ok_or(EngineError::not_found("lexicon_entry", id))?;
        self.clear_junction_for(id);
        Ok(entry)
    }

    /// The grapheme ids currently referenced by `id`'s spelling, first-appearance order.
    pub fn graphemes_used_by(&self, id: i64) -> &[i64] {
        self.junction.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `(grapheme_id, position)` pairs for the `lexicon_spelling` export table.
    pub fn junction_rows(&self, id: i64) -> Vec<(i64, i32)> {
        self.graphemes_used_by(id)
            .iter()
            .enumerate()
            .map(|(position, &grapheme_id)| (grapheme_id, position as i32))
            .collect()
    }

    /// Inserts a fully-formed entry (as read back from an import) and rebuilds
    /// its junction. Unlike [`Self::create`], this trusts the caller's id and
    /// timestamps rather than validating freshness.
    pub fn load_entry(&mut self, entry: LexiconEntry) {
        let id = entry.id;
        self.entries.insert(id, entry);
        self.rebuild_junction_for(id);
    }

    /// Every lexicon entry that currently references `grapheme_id`, sorted by id.
    pub fn entries_referencing_grapheme(&self, grapheme_id: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .usage_index
            .get(&grapheme_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Repairs every entry referencing a grapheme that was just deleted:
    /// substitutes every occurrence of the dangling reference with the IPA
    /// char of the grapheme's primary auto-spelling phoneme, or `?` if it had
    /// none, then sets `needs_attention` to the inverse of the entry's own
    /// `auto_spell` flag — an auto-spellable entry heals silently, a
    /// manually-spelled one always needs review. Returns the ids touched, sorted.
    pub fn repair_after_grapheme_delete(
        &mut self,
        grapheme_id: i64,
        replacement_phoneme: Option<&str>,
        now: i64,
    ) -> Vec<i64> {
        let affected = self.entries_referencing_grapheme(grapheme_id);
        for &id in &affected {
            let Some(entry) = self.entries.get_mut(&id) else {
                continue;
            };
            let remaining: Vec<SpellingEntry> = spelling::decode(&entry.glyph_order)
                .into_iter()
                .map(|e| match &e {
                    SpellingEntry::GraphemeRef(g) if *g == grapheme_id => {
                        SpellingEntry::ipa(replacement_phoneme.unwrap_or("?"))
                    }
                    _ => e,
                })
                .collect();
            entry.glyph_order = spelling::encode(&remaining);
            entry.needs_attention = !entry.auto_spell;
            entry.updated_at = now;
        }
        for &id in &affected {
            self.rebuild_junction_for(id);
        }
        affected
    }

    fn clear_junction_for(&mut self, id: i64) {
        if let Some(old) = self.junction.remove(&id) {
            for grapheme_id in old {
                if let Some(set) = self.usage_index.get_mut(&grapheme_id) {
                    set.remove(&id);
                    if set.is_empty() {
                        self.usage_index.remove(&grapheme_id);
                    }
                }
            }
        }
    }

    fn rebuild_junction_for(&mut self, id: i64) {
        self.clear_junction_for(id);
        let Some(entry) = self.entries.get(&id) else {
            return;
        };
        let graphemes = spelling::grapheme_id_set(&spelling::decode(&entry.glyph_order));
        for &grapheme_id in &graphemes {
            self.usage_index.entry(grapheme_id).or_default().insert(id);
        }
        self.junction.insert(id, graphemes);
    }
}
