//! The in-process store (C7): ties every component together behind a single
//! `Uninitialized -> Ready` state machine, and owns the JSON export/import
//! envelope since only the top level knows every table's shape at once.

use serde::{Deserialize, Serialize};

use crate::ancestry::{AncestryEngine, TreeNode};
use crate::errors::{EngineError, EngineResult};
use crate::glyphs::{GlyphPatch, GlyphStore};
use crate::graphemes::{GraphemeComplete, GraphemePatch, GraphemeStore};
use crate::lexicon::{LexiconComplete, LexiconPatch, LexiconStore};
use crate::matcher::{self, AutoSpellResult};
use crate::models::{AncestryType, ClosureRow, Glyph, Grapheme, GraphemeGlyph, LexiconEntry, Phoneme};
use crate::phoneme_table::PhonemeTable;
use crate::phonemes::{PhonemePatch, PhonemeStore};
use crate::settings::{Settings, SettingsPatch, SettingsStore};
use crate::spelling::{self, SpellingEntry};
use crate::translator::{self, TranslationResult};

pub const EXPORT_MAGIC: &str = "ETYMOLOG_EXPORT";
pub const EXPORT_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Binary,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseStatus {
    pub initialized: bool,
    pub glyph_count: usize,
    pub grapheme_count: usize,
    pub last_persisted: Option<i64>,
}

pub struct Database {
    ready: bool,
    now: i64,
    dirty: bool,
    last_persisted: Option<i64>,

    next_glyph_id: i64,
    next_grapheme_id: i64,
    next_phoneme_id: i64,
    next_lexicon_id: i64,

    glyphs: GlyphStore,
    graphemes: GraphemeStore,
    phonemes: PhonemeStore,
    lexicon: LexiconStore,
    ancestry: AncestryEngine,
    settings: SettingsStore,
}

impl Default for Database {
    fn default() -> Self {
        Database {
            ready: false,
            now: 0,
            dirty: false,
            last_persisted: None,
            next_glyph_id: 1,
            next_grapheme_id: 1,
            next_phoneme_id: 1,
            next_lexicon_id: 1,
            glyphs: GlyphStore::new(),
            graphemes: GraphemeStore::new(),
            phonemes: PhonemeStore::new(),
            lexicon: LexiconStore::new(),
            ancestry: AncestryEngine::new(),
            settings: SettingsStore::default(),
        }
    }
}

impl Database {
    /// The only suspension point in the original system was persistence init;
    /// since persistence is out of scope here this is a plain constructor that
    /// leaves the store immediately `Ready`.
    pub fn init() -> Self {
        Database {
            ready: true,
            ..Database::default()
        }
    }

    fn ensure_ready(&self) -> EngineResult<()> {
        if self.ready {
            Ok(())
        } else {
            Err(EngineError::NotReady("database has not been initialized"))
        }
    }

    fn tick(&mut self) -> i64 {
        self.now += 1;
        self.dirty = true;
        self.now
    }

    pub fn status(&self) -> DatabaseStatus {
        DatabaseStatus {
            initialized: self.ready,
            glyph_count: self.glyphs.get_all().len(),
            grapheme_count: self.graphemes.get_all().len(),
            last_persisted: self.last_persisted,
        }
    }

    // ---- glyphs ---------------------------------------------------------

    pub fn create_glyph(
        &mut self,
        name: String,
        svg_data: String,
        category: Option<String>,
        notes: Option<String>,
    ) -> EngineResult<&Glyph> {
        self.ensure_ready()?;
        let id = self.next_glyph_id;
        let now = self.tick();
        let glyph = self.glyphs.create(id, name, svg_data, category, notes, now)?;
        self.next_glyph_id += 1;
        Ok(glyph)
    }

    pub fn get_glyph(&self, id: i64) -> EngineResult<&Glyph> {
        self.ensure_ready()?;
        self.glyphs.get_by_id(id)
    }

    pub fn list_glyphs(&self) -> EngineResult<Vec<&Glyph>> {
        self.ensure_ready()?;
        Ok(self.glyphs.get_all())
    }

    pub fn list_glyphs_with_usage(&self) -> EngineResult<Vec<(&Glyph, usize)>> {
        self.ensure_ready()?;
        Ok(self
            .glyphs
            .get_all()
            .into_iter()
            .map(|g| (g, self.glyph_usage(g.id)))
            .collect())
    }

    pub fn search_glyphs(&self, query: &str) -> EngineResult<Vec<&Glyph>> {
        self.ensure_ready()?;
        Ok(self.glyphs.search(query))
    }

    pub fn update_glyph(&mut self, id: i64, patch: GlyphPatch) -> EngineResult<&Glyph> {
        self.ensure_ready()?;
        let now = self.tick();
        self.glyphs.update(id, patch, now)
    }

    pub fn glyph_name_exists(&self, name: &str, excluding: Option<i64>) -> EngineResult<bool> {
        self.ensure_ready()?;
        Ok(self.glyphs.name_exists(name, excluding))
    }

    fn glyph_usage(&self, glyph_id: i64) -> usize {
        self.graphemes.containing_glyph(glyph_id).len()
    }

    /// Fails with `ConstraintViolation` while any grapheme still composes this glyph.
    pub fn delete_glyph(&mut self, id: i64) -> EngineResult<Glyph> {
        self.ensure_ready()?;
        if !self.glyphs.exists(id) {
            return Err(EngineError::not_found("glyph", id));
        }
        if self.glyph_usage(id) > 0 {
            return Err(EngineError::constraint(format!(
                "glyph {id} is still used by one or more graphemes"
            )));
        }
        self.glyphs.remove(id)
    }

    /// Unlinks the glyph from every grapheme composition first (deleting any
    /// grapheme this leaves without glyphs), then deletes the glyph.
    pub fn force_delete_glyph(&mut self, id: i64) -> EngineResult<Glyph> {
        self.ensure_ready()?;
        if !self.glyphs.exists(id) {
            return Err(EngineError::not_found("glyph", id));
        }
        let now = self.tick();
        self.graphemes.unlink_glyph(id, now);
        let emptied: Vec<i64> = self
            .graphemes
            .get_all()
            .into_iter()
            .filter(|g| g.glyphs.is_empty())
            .map(|g| g.id)
            .collect();
        for grapheme_id in emptied {
            self.delete_grapheme_unchecked(grapheme_id)?;
        }
        self.glyphs.remove(id)
    }

    /// Deletes every grapheme composing this glyph, then the glyph itself.
    pub fn cascade_delete_glyph(&mut self, id: i64) -> EngineResult<Glyph> {
        self.ensure_ready()?;
        if !self.glyphs.exists(id) {
            return Err(EngineError::not_found("glyph", id));
        }
        let dependents = self.graphemes.containing_glyph(id);
        for grapheme_id in dependents {
            self.delete_grapheme_unchecked(grapheme_id)?;
        }
        self.glyphs.remove(id)
    }

    fn sweep_orphan_glyphs(&mut self) {
        let orphans: Vec<i64> = self
            .glyphs
            .get_all()
            .into_iter()
            .filter(|g| self.glyph_usage(g.id) == 0)
            .map(|g| g.id)
            .collect();
        for id in orphans {
            let _ = self.glyphs.remove(id);
        }
    }

    // ---- graphemes --------------------------------------------------------

    pub fn create_grapheme(
        &mut self,
        name: String,
        category: Option<String>,
        notes: Option<String>,
        glyphs: Vec<GraphemeGlyph>,
        phonemes: Vec<(String, bool, Option<String>)>,
    ) -> EngineResult<&Grapheme> {
        self.ensure_ready()?;
        let id = self.next_grapheme_id;
        let now = self.tick();
        self.graphemes.create(id, name, category, notes, glyphs, now)?;
        self.next_grapheme_id += 1;
        for (phoneme, use_in_auto_spelling, context) in phonemes {
            let phoneme_id = self.next_phoneme_id;
            self.phonemes
                .add(phoneme_id, id, phoneme, use_in_auto_spelling, context)?;
            self.next_phoneme_id += 1;
        }
        self.graphemes.get_by_id(id)
    }

    pub fn get_grapheme(&self, id: i64) -> EngineResult<&Grapheme> {
        self.ensure_ready()?;
        self.graphemes.get_by_id(id)
    }

    pub fn get_grapheme_complete(&self, id: i64) -> EngineResult<GraphemeComplete> {
        self.ensure_ready()?;
        self.graphemes.get_by_id_complete(id, &self.phonemes)
    }

    pub fn list_graphemes(&self) -> EngineResult<Vec<&Grapheme>> {
        self.ensure_ready()?;
        Ok(self.graphemes.get_all())
    }

    pub fn list_graphemes_complete(&self) -> EngineResult<Vec<GraphemeComplete>> {
        self.ensure_ready()?;
        Ok(self.graphemes.get_all_complete(&self.phonemes))
    }

    pub fn search_graphemes(&self, query: &str) -> EngineResult<Vec<&Grapheme>> {
        self.ensure_ready()?;
        Ok(self.graphemes.search(query))
    }

    pub fn update_grapheme(&mut self, id: i64, patch: GraphemePatch) -> EngineResult<&Grapheme> {
        self.ensure_ready()?;
        let now = self.tick();
        self.graphemes.update(id, patch, now)
    }

    pub fn update_grapheme_glyphs(
        &mut self,
        id: i64,
        glyphs: Vec<GraphemeGlyph>,
    ) -> EngineResult<&Grapheme> {
        self.ensure_ready()?;
        let now = self.tick();
        self.graphemes.update_glyphs(id, glyphs, now)?;
        if self.settings.get().auto_manage_glyphs {
            self.sweep_orphan_glyphs();
        }
        self.graphemes.get_by_id(id)
    }

    /// Fails with `ConstraintViolation` while any lexicon entry's junction
    /// references this grapheme.
    pub fn delete_grapheme(&mut self, id: i64) -> EngineResult<Grapheme> {
        self.ensure_ready()?;
        if !self.graphemes.exists(id) {
            return Err(EngineError::not_found("grapheme", id));
        }
        if !self.lexicon.entries_referencing_grapheme(id).is_empty() {
            return Err(EngineError::constraint(format!(
                "grapheme {id} is still referenced by one or more lexicon entries"
            )));
        }
        self.delete_grapheme_unchecked(id)
    }

    fn delete_grapheme_unchecked(&mut self, id: i64) -> EngineResult<Grapheme> {
        let now = self.tick();
        let primary_phoneme = self
            .phonemes
            .get_by_grapheme_id(id)
            .into_iter()
            .find(|p| p.use_in_auto_spelling)
            .map(|p| p.phoneme.clone());
        let removed = self.graphemes.remove(id)?;
        self.phonemes.delete_all_for_grapheme(id);
        self.lexicon
            .repair_after_grapheme_delete(id, primary_phoneme.as_deref(), now);
        if self.settings.get().auto_manage_glyphs {
            self.sweep_orphan_glyphs();
        }
        Ok(removed)
    }

    pub fn get_grapheme_by_phoneme(&self, phoneme: &str) -> EngineResult<Vec<&Grapheme>> {
        self.ensure_ready()?;
        Ok(self.graphemes.get_by_phoneme(phoneme, &self.phonemes))
    }

    pub fn get_phoneme_map(&self) -> EngineResult<PhonemeTable> {
        self.ensure_ready()?;
        Ok(self.graphemes.get_phoneme_map(&self.phonemes))
    }

    // ---- phonemes -----------------------------------------------------------

    pub fn add_phoneme(
        &mut self,
        grapheme_id: i64,
        phoneme: String,
        use_in_auto_spelling: bool,
        context: Option<String>,
    ) -> EngineResult<&Phoneme> {
        self.ensure_ready()?;
        self.graphemes.get_by_id(grapheme_id)?;
        let id = self.next_phoneme_id;
        let added = self
            .phonemes
            .add(id, grapheme_id, phoneme, use_in_auto_spelling, context)?;
        self.next_phoneme_id += 1;
        Ok(added)
    }

    pub fn get_phoneme(&self, id: i64) -> EngineResult<&Phoneme> {
        self.ensure_ready()?;
        self.phonemes.get_by_id(id)
    }

    pub fn get_phonemes_by_grapheme(&self, grapheme_id: i64) -> EngineResult<Vec<&Phoneme>> {
        self.ensure_ready()?;
        Ok(self.phonemes.get_by_grapheme_id(grapheme_id))
    }

    pub fn update_phoneme(&mut self, id: i64, patch: PhonemePatch) -> EngineResult<&Phoneme> {
        self.ensure_ready()?;
        self.phonemes.update(id, patch)
    }

    pub fn delete_phoneme(&mut self, id: i64) -> EngineResult<Phoneme> {
        self.ensure_ready()?;
        self.phonemes.delete(id)
    }

    pub fn delete_all_phonemes_for_grapheme(&mut self, grapheme_id: i64) -> EngineResult<Vec<Phoneme>> {
        self.ensure_ready()?;
        Ok(self.phonemes.delete_all_for_grapheme(grapheme_id))
    }

    pub fn get_auto_spelling_phonemes(&self) -> EngineResult<Vec<&Phoneme>> {
        self.ensure_ready()?;
        Ok(self.phonemes.get_auto_spelling())
    }

    // ---- lexicon ------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn create_lexicon_entry(
        &mut self,
        lemma: String,
        pronunciation: Option<String>,
        is_native: bool,
        auto_spell: bool,
        meaning: Option<String>,
        part_of_speech: Option<String>,
        notes: Option<String>,
        glyph_order: Vec<SpellingEntry>,
    ) -> EngineResult<&LexiconEntry> {
        self.ensure_ready()?;
        let id = self.next_lexicon_id;
        let now = self.tick();
        let created = self.lexicon.create(
            id,
            lemma,
            pronunciation,
            is_native,
            auto_spell,
            meaning,
            part_of_speech,
            notes,
            glyph_order,
            now,
        )?;
        self.next_lexicon_id += 1;
        Ok(created)
    }

    pub fn get_lexicon_entry(&self, id: i64) -> EngineResult<&LexiconEntry> {
        self.ensure_ready()?;
        self.lexicon.get(id)
    }

    pub fn list_lexicon_entries(&self) -> EngineResult<Vec<&LexiconEntry>> {
        self.ensure_ready()?;
        Ok(self.lexicon.get_all())
    }

    pub fn get_lexicon_entry_complete(&self, id: i64) -> EngineResult<LexiconComplete> {
        self.ensure_ready()?;
        self.lexicon.get_complete(id, &self.graphemes)
    }

    pub fn list_lexicon_entries_complete(&self) -> EngineResult<Vec<LexiconComplete>> {
        self.ensure_ready()?;
        Ok(self.lexicon.get_all_complete(&self.graphemes))
    }

    /// Every entry alongside its usage count (its number of descendants in the
    /// ancestry graph), in the same review order as [`Self::list_lexicon_entries`].
    pub fn list_lexicon_entries_with_usage(&self) -> EngineResult<Vec<(&LexiconEntry, usize)>> {
        self.ensure_ready()?;
        Ok(self
            .lexicon
            .get_all()
            .into_iter()
            .map(|e| (e, self.ancestry.descendants_of(e.id).len()))
            .collect())
    }

    pub fn get_lexicon_entries_by_native(&self, is_native: bool) -> EngineResult<Vec<&LexiconEntry>> {
        self.ensure_ready()?;
        Ok(self.lexicon.get_by_native(is_native))
    }

    pub fn search_lexicon(&self, query: &str) -> EngineResult<Vec<&LexiconEntry>> {
        self.ensure_ready()?;
        Ok(self.lexicon.search(query))
    }

    pub fn update_lexicon_entry(&mut self, id: i64, patch: LexiconPatch) -> EngineResult<&LexiconEntry> {
        self.ensure_ready()?;
        let now = self.tick();
        self.lexicon.update(id, patch, now)
    }

    /// Explicit spelling write: clears `needs_attention`, the contract shared
    /// with auto-generated spellings.
    pub fn set_glyph_order(&mut self, id: i64, entries: Vec<SpellingEntry>) -> EngineResult<&LexiconEntry> {
        self.ensure_ready()?;
        let now = self.tick();
        self.lexicon.update(
            id,
            LexiconPatch {
                glyph_order: Some(entries),
                needs_attention: Some(false),
                ..Default::default()
            },
            now,
        )
    }

    /// Runs the strict auto-spell matcher (C3) against `pronunciation`, without
    /// touching any stored entry. Fails if any segment has no covering grapheme.
    pub fn generate_auto_spelling(&self, pronunciation: &str) -> EngineResult<AutoSpellResult> {
        self.ensure_ready()?;
        let table = self.graphemes.get_phoneme_map(&self.phonemes);
        matcher::generate_auto_spelling(pronunciation, &table)
    }

    /// Runs the fallback auto-spell matcher (C3) against `pronunciation`: like
    /// [`Self::generate_auto_spelling`], but uncovered segments fall back to a
    /// virtual IPA glyph instead of failing the whole match.
    pub fn preview_auto_spelling(&self, pronunciation: &str) -> EngineResult<AutoSpellResult> {
        self.ensure_ready()?;
        let table = self.graphemes.get_phoneme_map(&self.phonemes);
        matcher::preview_auto_spelling(pronunciation, &table)
    }

    /// Runs the strict auto-spell matcher (C3) against the entry's pronunciation
    /// and persists the result as its spelling. Fails if the entry has no
    /// pronunciation, or if strict matching can't cover it.
    pub fn apply_auto_spelling(&mut self, id: i64) -> EngineResult<AutoSpellResult> {
        self.ensure_ready()?;
        let pronunciation = self
            .lexicon
            .get(id)?
            .pronunciation
            .clone()
            .ok_or_else(|| EngineError::validation("entry has no pronunciation to auto-spell"))?;
        let result = self.generate_auto_spelling(&pronunciation)?;
        let entries: Vec<SpellingEntry> = result
            .entries
            .iter()
            .map(|e| match e {
                matcher::MatchEntry::GraphemeRef { grapheme_id, .. } => {
                    SpellingEntry::GraphemeRef(*grapheme_id)
                }
                matcher::MatchEntry::Virtual { ch, .. } => SpellingEntry::Ipa(ch.clone()),
            })
            .collect();
        self.set_glyph_order(id, entries)?;
        Ok(result)
    }

    pub fn delete_lexicon_entry(&mut self, id: i64) -> EngineResult<LexiconEntry> {
        self.ensure_ready()?;
        let removed = self.lexicon.delete(id)?;
        self.ancestry.drop_node(id);
        self.ancestry.rebuild_closure();
        Ok(removed)
    }

    // ---- ancestry -------------------------------------------------------------

    pub fn add_ancestor(
        &mut self,
        lexicon_id: i64,
        ancestor_id: i64,
        position: i32,
        ancestry_type: AncestryType,
    ) -> EngineResult<()> {
        self.ensure_ready()?;
        self.lexicon.get(lexicon_id)?;
        self.lexicon.get(ancestor_id)?;
        self.tick();
        self.ancestry.add_edge(lexicon_id, ancestor_id, position, ancestry_type)
    }

    pub fn remove_ancestor(&mut self, lexicon_id: i64, ancestor_id: i64) -> EngineResult<()> {
        self.ensure_ready()?;
        self.tick();
        self.ancestry.remove_edge(lexicon_id, ancestor_id);
        Ok(())
    }

    pub fn would_create_cycle(&self, lexicon_id: i64, ancestor_id: i64) -> EngineResult<bool> {
        self.ensure_ready()?;
        Ok(self.ancestry.would_create_cycle(lexicon_id, ancestor_id))
    }

    /// Replaces `lexicon_id`'s entire set of direct ancestor edges with
    /// `ancestors`, validating every id and rejecting the whole call on the
    /// first cycle it would introduce.
    pub fn update_ancestry(
        &mut self,
        lexicon_id: i64,
        ancestors: Vec<(i64, i32, AncestryType)>,
    ) -> EngineResult<()> {
        self.ensure_ready()?;
        self.lexicon.get(lexicon_id)?;
        for &(ancestor_id, _, _) in &ancestors {
            self.lexicon.get(ancestor_id)?;
        }
        self.tick();
        self.ancestry.set_ancestors(lexicon_id, ancestors)
    }

    pub fn ancestors_of(&self, id: i64) -> EngineResult<Vec<i64>> {
        self.ensure_ready()?;
        Ok(self.ancestry.ancestors_of(id))
    }

    pub fn descendants_of(&self, id: i64) -> EngineResult<Vec<i64>> {
        self.ensure_ready()?;
        Ok(self.ancestry.descendants_of(id))
    }

    pub fn ancestry_tree(&self, id: i64, max_depth: u32) -> EngineResult<TreeNode> {
        self.ensure_ready()?;
        Ok(self.ancestry.ancestry_tree(id, max_depth))
    }

    // ---- translator -------------------------------------------------------------

    pub fn translate_phrase(&self, phrase: &str) -> EngineResult<TranslationResult> {
        self.ensure_ready()?;
        let table = self.graphemes.get_phoneme_map(&self.phonemes);
        translator::translate(phrase, &self.lexicon, &table, &self.settings.get().punctuation, self.now)
    }

    // ---- settings -------------------------------------------------------------

    pub fn get_settings(&self) -> EngineResult<&Settings> {
        self.ensure_ready()?;
        Ok(self.settings.get())
    }

    pub fn update_settings(&mut self, patch: SettingsPatch) -> EngineResult<&Settings> {
        self.ensure_ready()?;
        Ok(self.settings.update(patch))
    }

    pub fn reset_settings(&mut self) -> EngineResult<&Settings> {
        self.ensure_ready()?;
        Ok(self.settings.reset())
    }

    // ---- export / import -------------------------------------------------------------

    pub fn export(&mut self, format: ExportFormat) -> EngineResult<Vec<u8>> {
        self.ensure_ready()?;
        let envelope = self.build_envelope();
        let bytes = match format {
            // The binary format is a private placeholder with no real storage
            // engine backing it; it carries the same envelope as JSON.
            ExportFormat::Binary | ExportFormat::Json => serde_json::to_vec(&envelope)
                .map_err(|e| EngineError::OperationFailed(e.to_string()))?,
        };
        self.last_persisted = Some(self.now);
        self.dirty = false;
        Ok(bytes)
    }

    fn build_envelope(&self) -> ExportEnvelope {
        let mut grapheme_glyph_rows = Vec::new();
        let mut next_row_id = 1i64;
        for grapheme in self.graphemes.get_all() {
            for gg in &grapheme.glyphs {
                grapheme_glyph_rows.push(GraphemeGlyphRow {
                    id: next_row_id,
                    grapheme_id: grapheme.id,
                    glyph_id: gg.glyph_id,
                    position: gg.position,
                    transform: gg.transform.clone(),
                });
                next_row_id += 1;
            }
        }

        let mut lexicon_spelling_rows = Vec::new();
        let mut lexicon_ancestry_rows = Vec::new();
        next_row_id = 1;
        for entry in self.lexicon.get_all() {
            for (grapheme_id, position) in self.lexicon.junction_rows(entry.id) {
                lexicon_spelling_rows.push(LexiconSpellingRow {
                    id: next_row_id,
                    lexicon_id: entry.id,
                    grapheme_id,
                    position,
                });
                next_row_id += 1;
            }
        }
        next_row_id = 1;
        for (lexicon_id, ancestor_id, position, ancestry_type) in self.ancestry.edges() {
            lexicon_ancestry_rows.push(LexiconAncestryRow {
                id: next_row_id,
                lexicon_id,
                ancestor_id,
                position,
                ancestry_type,
            });
            next_row_id += 1;
        }

        ExportEnvelope {
            magic: EXPORT_MAGIC.to_string(),
            version: EXPORT_VERSION,
            tables: ExportTables {
                glyphs: self.glyphs.get_all().into_iter().cloned().collect(),
                graphemes: self
                    .graphemes
                    .get_all()
                    .into_iter()
                    .map(GraphemeRow::from)
                    .collect(),
                grapheme_glyphs: grapheme_glyph_rows,
                phonemes: self.phonemes.all().into_iter().cloned().collect(),
                lexicon: self.lexicon.get_all().into_iter().cloned().collect(),
                lexicon_spelling: lexicon_spelling_rows,
                lexicon_ancestry: lexicon_ancestry_rows,
                lexicon_ancestry_closure: self.ancestry.closure_rows(),
            },
            settings: self.settings.get().clone(),
        }
    }

    /// Replaces the entire store with the decoded contents of `bytes`. Migrations
    /// are forward-only: a missing column takes its default, a missing table
    /// starts empty (nothing in a version-1 export is actually optional at the
    /// table level — see validation below — but rows tolerate legacy shapes).
    pub fn import(&mut self, bytes: &[u8]) -> EngineResult<()> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| EngineError::validation(format!("invalid export payload: {e}")))?;
        validate_envelope_shape(&value)?;

        let tables = value.get("tables").expect("validated above");
        let settings: Settings = serde_json::from_value(
            value.get("settings").cloned().unwrap_or(serde_json::Value::Null),
        )
        .map_err(|e| EngineError::validation(format!("invalid settings payload: {e}")))?;

        let glyphs: Vec<Glyph> = parse_table(tables, "glyphs")?;
        let grapheme_rows: Vec<GraphemeRow> = parse_table(tables, "graphemes")?;
        let grapheme_glyph_rows: Vec<GraphemeGlyphRow> = parse_table(tables, "grapheme_glyphs")?;
        let phonemes: Vec<Phoneme> = parse_table(tables, "phonemes")?;
        let lexicon_spelling_rows: Vec<LexiconSpellingRow> = parse_table(tables, "lexicon_spelling")?;
        let lexicon_ancestry_rows: Vec<LexiconAncestryRow> = parse_table(tables, "lexicon_ancestry")?;

        let lexicon_raw = tables
            .get("lexicon")
            .and_then(|v| v.as_array())
            .expect("validated above");
        let lexicon_entries = rematerialize_lexicon(lexicon_raw, &lexicon_spelling_rows)?;

        let mut fresh = Database::init();
        fresh.settings = SettingsStore::default();
        fresh.settings.update(SettingsPatch {
            simple_script_system: Some(settings.simple_script_system),
            default_gallery_view: Some(settings.default_gallery_view),
            auto_save_interval_ms: Some(settings.auto_save_interval_ms),
            auto_manage_glyphs: Some(settings.auto_manage_glyphs),
            punctuation: Some(settings.punctuation),
            writing_system: Some(settings.writing_system),
        });

        let mut max_glyph_id = 0;
        let mut max_timestamp = 0;
        for glyph in glyphs {
            max_glyph_id = max_glyph_id.max(glyph.id);
            max_timestamp = max_timestamp.max(glyph.created_at).max(glyph.updated_at);
            let now = glyph.updated_at;
            fresh.glyphs.create(
                glyph.id,
                glyph.name,
                glyph.svg_data,
                glyph.category,
                glyph.notes,
                glyph.created_at,
            )?;
            if now != glyph.created_at {
                fresh.glyphs.update(glyph.id, GlyphPatch::default(), now)?;
            }
        }

        let mut max_grapheme_id = 0;
        for row in grapheme_rows {
            max_grapheme_id = max_grapheme_id.max(row.id);
            max_timestamp = max_timestamp.max(row.created_at).max(row.updated_at);
            let mut composition: Vec<GraphemeGlyph> = grapheme_glyph_rows
                .iter()
                .filter(|r| r.grapheme_id == row.id)
                .map(|r| GraphemeGlyph {
                    glyph_id: r.glyph_id,
                    position: r.position,
                    transform: r.transform.clone(),
                })
                .collect();
            composition.sort_by_key(|g| g.position);
            let now = row.updated_at;
            fresh
                .graphemes
                .create(row.id, row.name, row.category, row.notes, composition, row.created_at)?;
            if now != row.created_at {
                fresh.graphemes.update(row.id, GraphemePatch::default(), now)?;
            }
        }

        let mut max_phoneme_id = 0;
        for phoneme in phonemes {
            max_phoneme_id = max_phoneme_id.max(phoneme.id);
            fresh.phonemes.add(
                phoneme.id,
                phoneme.grapheme_id,
                phoneme.phoneme,
                phoneme.use_in_auto_spelling,
                phoneme.context,
            )?;
        }

        let mut max_lexicon_id = 0;
        for entry in lexicon_entries {
            max_lexicon_id = max_lexicon_id.max(entry.id);
            max_timestamp = max_timestamp.max(entry.updated_at).max(entry.created_at);
            fresh.lexicon.load_entry(entry);
        }

        let edges: Vec<(i64, i64, i32, AncestryType)> = lexicon_ancestry_rows
            .into_iter()
            .map(|r| (r.lexicon_id, r.ancestor_id, r.position, r.ancestry_type))
            .collect();
        fresh.ancestry.load_edges_unchecked(edges);

        fresh.next_glyph_id = max_glyph_id + 1;
        fresh.next_grapheme_id = max_grapheme_id + 1;
        fresh.next_phoneme_id = max_phoneme_id + 1;
        fresh.next_lexicon_id = max_lexicon_id + 1;
        fresh.now = max_timestamp;
        fresh.dirty = false;
        fresh.last_persisted = self.last_persisted;

        *self = fresh;
        Ok(())
    }

    /// Truncates every table, preserving schema (counters, settings untouched).
    pub fn clear(&mut self) -> EngineResult<()> {
        self.ensure_ready()?;
        self.glyphs = GlyphStore::new();
        self.graphemes = GraphemeStore::new();
        self.phonemes = PhonemeStore::new();
        self.lexicon = LexiconStore::new();
        self.ancestry = AncestryEngine::new();
        self.next_glyph_id = 1;
        self.next_grapheme_id = 1;
        self.next_phoneme_id = 1;
        self.next_lexicon_id = 1;
        self.dirty = true;
        Ok(())
    }

    /// Drops the entire store and recreates it from scratch.
    pub fn reset(&mut self) {
        *self = Database::init();
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct GraphemeRow {
    id: i64,
    name: String,
    category: Option<String>,
    notes: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<&Grapheme> for GraphemeRow {
    fn from(g: &Grapheme) -> Self {
        GraphemeRow {
            id: g.id,
            name: g.name.clone(),
            category: g.category.clone(),
            notes: g.notes.clone(),
            created_at: g.created_at,
            updated_at: g.updated_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct GraphemeGlyphRow {
    id: i64,
    grapheme_id: i64,
    glyph_id: i64,
    position: i32,
    transform: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct LexiconSpellingRow {
    id: i64,
    lexicon_id: i64,
    grapheme_id: i64,
    position: i32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct LexiconAncestryRow {
    id: i64,
    lexicon_id: i64,
    ancestor_id: i64,
    position: i32,
    ancestry_type: AncestryType,
}

#[derive(Serialize, Deserialize)]
struct ExportTables {
    glyphs: Vec<Glyph>,
    graphemes: Vec<GraphemeRow>,
    grapheme_glyphs: Vec<GraphemeGlyphRow>,
    phonemes: Vec<Phoneme>,
    lexicon: Vec<LexiconEntry>,
    lexicon_spelling: Vec<LexiconSpellingRow>,
    lexicon_ancestry: Vec<LexiconAncestryRow>,
    lexicon_ancestry_closure: Vec<ClosureRow>,
}

#[derive(Serialize, Deserialize)]
struct ExportEnvelope {
    magic: String,
    version: u32,
    tables: ExportTables,
    settings: Settings,
}

const TABLE_NAMES: [&str; 8] = [
    "glyphs",
    "graphemes",
    "grapheme_glyphs",
    "phonemes",
    "lexicon",
    "lexicon_spelling",
    "lexicon_ancestry",
    "lexicon_ancestry_closure",
];

fn validate_envelope_shape(value: &serde_json::Value) -> EngineResult<()> {
    if value.get("magic").and_then(|v| v.as_str()) != Some(EXPORT_MAGIC) {
        return Err(EngineError::validation(
            "export magic does not match ETYMOLOG_EXPORT",
        ));
    }
    if value.get("version").and_then(|v| v.as_u64()) != Some(EXPORT_VERSION as u64) {
        return Err(EngineError::validation("unsupported or missing export version"));
    }
    let tables = value
        .get("tables")
        .ok_or_else(|| EngineError::validation("export is missing the tables object"))?;
    for name in TABLE_NAMES {
        match tables.get(name) {
            Some(serde_json::Value::Array(_)) => {}
            Some(_) => return Err(EngineError::validation(format!("table {name} is not an array"))),
            None => return Err(EngineError::validation(format!("export is missing table {name}"))),
        }
    }
    if value.get("settings").is_none() {
        return Err(EngineError::validation("export is missing settings"));
    }
    Ok(())
}

fn parse_table<T: for<'de> Deserialize<'de>>(
    tables: &serde_json::Value,
    name: &str,
) -> EngineResult<Vec<T>> {
    serde_json::from_value(tables.get(name).cloned().unwrap_or(serde_json::Value::Null))
        .map_err(|e| EngineError::validation(format!("invalid rows in table {name}: {e}")))
}

/// Legacy imports may carry lexicon rows without `glyph_order`; rematerialize
/// it from the `lexicon_spelling` junction rows, ordered by position.
fn rematerialize_lexicon(
    raw_rows: &[serde_json::Value],
    spelling_rows: &[LexiconSpellingRow],
) -> EngineResult<Vec<LexiconEntry>> {
    let mut entries = Vec::with_capacity(raw_rows.len());
    for raw in raw_rows {
        let id = raw
            .get("id")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| EngineError::validation("lexicon row missing id"))?;
        let lemma = raw
            .get("lemma")
            .and_then(|v| v.as_str())
            .ok_or_else(|| EngineError::validation("lexicon row missing lemma"))?
            .to_string();
        let pronunciation = raw.get("pronunciation").and_then(|v| v.as_str()).map(String::from);
        let is_native = raw.get("is_native").and_then(|v| v.as_bool()).unwrap_or(false);
        let auto_spell = raw.get("auto_spell").and_then(|v| v.as_bool()).unwrap_or(false);
        let meaning = raw.get("meaning").and_then(|v| v.as_str()).map(String::from);
        let part_of_speech = raw.get("part_of_speech").and_then(|v| v.as_str()).map(String::from);
        let notes = raw.get("notes").and_then(|v| v.as_str()).map(String::from);
        let needs_attention = raw.get("needs_attention").and_then(|v| v.as_bool()).unwrap_or(false);
        let created_at = raw.get("created_at").and_then(|v| v.as_i64()).unwrap_or(0);
        let updated_at = raw.get("updated_at").and_then(|v| v.as_i64()).unwrap_or(created_at);

        let glyph_order = match raw.get("glyph_order").and_then(|v| v.as_str()) {
            Some(encoded) => encoded.to_string(),
            None => {
                let mut rows: Vec<&LexiconSpellingRow> =
                    spelling_rows.iter().filter(|r| r.lexicon_id == id).collect();
                rows.sort_by_key(|r| r.position);
                let entries: Vec<SpellingEntry> = rows
                    .into_iter()
                    .map(|r| SpellingEntry::grapheme(r.grapheme_id))
                    .collect();
                spelling::encode(&entries)
            }
        };

        entries.push(LexiconEntry {
            id,
            lemma,
            pronunciation,
            is_native,
            auto_spell,
            meaning,
            part_of_speech,
            notes,
            glyph_order,
            needs_attention,
            created_at,
            updated_at,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_glyph(db: &mut Database, name: &str) -> i64 {
        db.create_glyph(name.to_string(), "<svg/>".to_string(), None, None)
            .unwrap()
            .id
    }

    #[test]
    fn operations_fail_before_init() {
        let db = Database::default();
        assert!(matches!(
            db.status(),
            DatabaseStatus { initialized: false, .. }
        ));
        assert!(matches!(
            Database::default().list_glyphs(),
            Err(EngineError::NotReady(_))
        ));
    }

    #[test]
    fn export_then_import_round_trips_a_populated_store() {
        let mut db = Database::init();
        let glyph_id = init_glyph(&mut db, "dot");
        db.create_grapheme(
            "a".to_string(),
            None,
            None,
            vec![GraphemeGlyph {
                glyph_id,
                position: 0,
                transform: None,
            }],
            vec![("a".to_string(), true, None)],
        )
        .unwrap();
        db.create_lexicon_entry(
            "hello".to_string(),
            Some("a".to_string()),
            true,
            true,
            None,
            None,
            None,
            vec![SpellingEntry::grapheme(1)],
        )
        .unwrap();

        let bytes = db.export(ExportFormat::Json).unwrap();

        let mut restored = Database::init();
        restored.import(&bytes).unwrap();

        assert_eq!(restored.list_glyphs().unwrap().len(), 1);
        assert_eq!(restored.list_graphemes().unwrap().len(), 1);
        assert_eq!(restored.list_lexicon_entries().unwrap().len(), 1);
    }

    #[test]
    fn import_rejects_wrong_magic() {
        let mut db = Database::init();
        let bad = serde_json::json!({"magic": "NOPE", "version": 1, "tables": {}, "settings": {}});
        let err = db.import(bad.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, EngineError::ValidationError(_)));
    }

    #[test]
    fn import_rejects_missing_table() {
        let mut db = Database::init();
        let bad = serde_json::json!({
            "magic": EXPORT_MAGIC,
            "version": 1,
            "tables": { "glyphs": [] },
            "settings": {},
        });
        let err = db.import(bad.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, EngineError::ValidationError(_)));
    }

    #[test]
    fn force_delete_glyph_deletes_emptied_grapheme_and_repairs_lexicon() {
        let mut db = Database::init();
        let glyph_id = init_glyph(&mut db, "dot");
        db.create_grapheme(
            "a".to_string(),
            None,
            None,
            vec![GraphemeGlyph {
                glyph_id,
                position: 0,
                transform: None,
            }],
            vec![],
        )
        .unwrap();
        db.create_lexicon_entry(
            "hello".to_string(),
            None,
            true,
            false,
            None,
            None,
            None,
            vec![SpellingEntry::grapheme(1)],
        )
        .unwrap();

        db.force_delete_glyph(glyph_id).unwrap();

        assert!(db.list_graphemes().unwrap().is_empty());
        let entry = db.get_lexicon_entry(1).unwrap();
        assert!(entry.needs_attention);
        // The deleted grapheme had no phonemes, so the dangling ref falls
        // back to the unknown-phoneme placeholder rather than being dropped.
        assert_eq!(
            spelling::decode(&entry.glyph_order),
            vec![SpellingEntry::ipa("?")]
        );
    }

    #[test]
    fn delete_grapheme_is_restricted_while_referenced_by_lexicon() {
        let mut db = Database::init();
        let glyph_id = init_glyph(&mut db, "dot");
        db.create_grapheme(
            "a".to_string(),
            None,
            None,
            vec![GraphemeGlyph {
                glyph_id,
                position: 0,
                transform: None,
            }],
            vec![],
        )
        .unwrap();
        db.create_lexicon_entry(
            "hello".to_string(),
            None,
            true,
            false,
            None,
            None,
            None,
            vec![SpellingEntry::grapheme(1)],
        )
        .unwrap();

        let err = db.delete_grapheme(1).unwrap_err();
        assert!(matches!(err, EngineError::ConstraintViolation(_)));
    }

    #[test]
    fn get_lexicon_entry_complete_flags_a_dangling_grapheme_ref() {
        let mut db = Database::init();
        let glyph_id = init_glyph(&mut db, "dot");
        db.create_grapheme(
            "a".to_string(),
            None,
            None,
            vec![GraphemeGlyph {
                glyph_id,
                position: 0,
                transform: None,
            }],
            vec![],
        )
        .unwrap();
        let entry_id = db
            .create_lexicon_entry(
                "hello".to_string(),
                None,
                true,
                false,
                None,
                None,
                None,
                vec![SpellingEntry::grapheme(1), SpellingEntry::grapheme(999)],
            )
            .unwrap()
            .id;

        let complete = db.get_lexicon_entry_complete(entry_id).unwrap();
        assert!(complete.has_ipa_fallbacks);
        assert_eq!(db.list_lexicon_entries_complete().unwrap().len(), 1);
    }

    #[test]
    fn list_lexicon_entries_with_usage_counts_descendants() {
        let mut db = Database::init();
        let a = db
            .create_lexicon_entry("a".to_string(), None, true, false, None, None, None, vec![])
            .unwrap()
            .id;
        let b = db
            .create_lexicon_entry("b".to_string(), None, true, false, None, None, None, vec![])
            .unwrap()
            .id;
        db.add_ancestor(b, a, 0, AncestryType::Derived).unwrap();

        let with_usage = db.list_lexicon_entries_with_usage().unwrap();
        let a_usage = with_usage.iter().find(|(e, _)| e.id == a).unwrap().1;
        assert_eq!(a_usage, 1);
        let b_usage = with_usage.iter().find(|(e, _)| e.id == b).unwrap().1;
        assert_eq!(b_usage, 0);
    }

    #[test]
    fn get_lexicon_entries_by_native_filters() {
        let mut db = Database::init();
        db.create_lexicon_entry("native".to_string(), None, true, false, None, None, None, vec![])
            .unwrap();
        db.create_lexicon_entry("loaned".to_string(), None, false, false, None, None, None, vec![])
            .unwrap();

        assert_eq!(db.get_lexicon_entries_by_native(true).unwrap().len(), 1);
        assert_eq!(db.get_lexicon_entries_by_native(false).unwrap().len(), 1);
    }

    #[test]
    fn would_create_cycle_and_update_ancestry_replace_the_parent_set() {
        let mut db = Database::init();
        let a = db
            .create_lexicon_entry("a".to_string(), None, true, false, None, None, None, vec![])
            .unwrap()
            .id;
        let b = db
            .create_lexicon_entry("b".to_string(), None, true, false, None, None, None, vec![])
            .unwrap()
            .id;
        let c = db
            .create_lexicon_entry("c".to_string(), None, true, false, None, None, None, vec![])
            .unwrap()
            .id;

        db.add_ancestor(b, a, 0, AncestryType::Derived).unwrap();
        assert!(db.would_create_cycle(a, b).unwrap());
        assert!(!db.would_create_cycle(b, c).unwrap());

        db.update_ancestry(b, vec![(c, 0, AncestryType::Borrowed)])
            .unwrap();
        assert_eq!(db.ancestors_of(b).unwrap(), vec![c]);
    }

    #[test]
    fn generate_and_preview_auto_spelling_do_not_persist() {
        let mut db = Database::init();
        let glyph_id = init_glyph(&mut db, "dot");
        db.create_grapheme(
            "a".to_string(),
            None,
            None,
            vec![GraphemeGlyph {
                glyph_id,
                position: 0,
                transform: None,
            }],
            vec![("a".to_string(), true, None)],
        )
        .unwrap();
        let entry_id = db
            .create_lexicon_entry(
                "hello".to_string(),
                Some("a".to_string()),
                true,
                false,
                None,
                None,
                None,
                vec![],
            )
            .unwrap()
            .id;

        let generated = db.generate_auto_spelling("a").unwrap();
        assert_eq!(generated.coverage, 1);
        let preview = db.preview_auto_spelling("az").unwrap();
        assert!(preview.count >= 1);

        // Neither call touched the stored entry.
        let entry = db.get_lexicon_entry(entry_id).unwrap();
        assert!(spelling::decode(&entry.glyph_order).is_empty());
    }
}
