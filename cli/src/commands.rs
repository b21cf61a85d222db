//! Dispatches each parsed subcommand against a [`Database`], returning the
//! text to print (or write to `--output`), mirroring the engine's own
//! validate-then-mutate-then-report shape.

use anyhow::{bail, Context, Result};
use etymolog_core::glyphs::GlyphPatch;
use etymolog_core::graphemes::GraphemePatch;
use etymolog_core::models::{AncestryType, Glyph, GraphemeGlyph};
use etymolog_core::settings::SettingsPatch;
use etymolog_core::store::ExportFormat;
use etymolog_core::Database;

use crate::cli::{
    AncestryCommand, Commands, DbCommand, GlyphCommand, GraphemeCommand, LexiconCommand,
    PhonemeCommand, SettingsCommand,
};
use crate::render;

fn parse_ancestry_type(raw: &str) -> Result<AncestryType> {
    Ok(match raw.to_lowercase().as_str() {
        "derived" => AncestryType::Derived,
        "borrowed" => AncestryType::Borrowed,
        "compound" => AncestryType::Compound,
        "blend" => AncestryType::Blend,
        "calque" => AncestryType::Calque,
        "other" => AncestryType::Other,
        other => bail!("unknown ancestry kind {other:?} (expected derived/borrowed/compound/blend/calque/other)"),
    })
}

fn print_tree(node: &etymolog_core::ancestry::TreeNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    if node.truncated {
        out.push_str(&format!("{indent}#{} (truncated)\n", node.lexicon_id));
        return;
    }
    out.push_str(&format!("{indent}#{}\n", node.lexicon_id));
    for child in &node.children {
        print_tree(child, depth + 1, out);
    }
}

pub fn dispatch(db: &mut Database, command: Commands) -> Result<String> {
    match command {
        Commands::Glyph { command } => glyph(db, command),
        Commands::Grapheme { command } => grapheme(db, command),
        Commands::Phoneme { command } => phoneme(db, command),
        Commands::Lexicon { command } => lexicon(db, command),
        Commands::Ancestry { command } => ancestry(db, command),
        Commands::Translate { phrase } => translate(db, &phrase),
        Commands::Settings { command } => settings(db, command),
        Commands::Db { command } => database(db, command),
    }
}

fn glyph(db: &mut Database, command: GlyphCommand) -> Result<String> {
    match command {
        GlyphCommand::Add { name, svg, category, notes } => {
            let glyph = db.create_glyph(name, svg, category, notes)?;
            Ok(format!("created glyph #{}", glyph.id))
        }
        GlyphCommand::List => Ok(render::glyphs_table(&db.list_glyphs_with_usage()?)),
        GlyphCommand::Show { id } => Ok(format!("{:#?}", db.get_glyph(id)?)),
        GlyphCommand::Search { query } => {
            let matches = db.search_glyphs(&query)?;
            let usage = db.list_glyphs_with_usage()?;
            let rows: Vec<(&Glyph, usize)> = matches
                .into_iter()
                .map(|g| {
                    let count = usage
                        .iter()
                        .find(|(ug, _)| ug.id == g.id)
                        .map(|(_, n)| *n)
                        .unwrap_or(0);
                    (g, count)
                })
                .collect();
            Ok(render::glyphs_table(&rows))
        }
        GlyphCommand::Update { id, name, svg, category, notes } => {
            let patch = GlyphPatch {
                name,
                svg_data: svg,
                category: category.map(Some),
                notes: notes.map(Some),
            };
            let glyph = db.update_glyph(id, patch)?;
            Ok(format!("updated glyph #{}", glyph.id))
        }
        GlyphCommand::Rm { id } => {
            db.delete_glyph(id)?;
            Ok(format!("deleted glyph #{id}"))
        }
        GlyphCommand::ForceRm { id } => {
            db.force_delete_glyph(id)?;
            Ok(format!("force-deleted glyph #{id}"))
        }
        GlyphCommand::CascadeRm { id } => {
            db.cascade_delete_glyph(id)?;
            Ok(format!("cascade-deleted glyph #{id}"))
        }
    }
}

fn grapheme(db: &mut Database, command: GraphemeCommand) -> Result<String> {
    match command {
        GraphemeCommand::Add { name, glyphs, category, notes, phonemes } => {
            let composition: Vec<GraphemeGlyph> = glyphs
                .into_iter()
                .enumerate()
                .map(|(position, glyph_id)| GraphemeGlyph {
                    glyph_id,
                    position: position as i32,
                    transform: None,
                })
                .collect();
            let phoneme_rows: Vec<(String, bool, Option<String>)> =
                phonemes.into_iter().map(|p| (p, true, None)).collect();
            let grapheme = db.create_grapheme(name, category, notes, composition, phoneme_rows)?;
            Ok(format!("created grapheme #{}", grapheme.id))
        }
        GraphemeCommand::List => Ok(render::graphemes_table(&db.list_graphemes()?)),
        GraphemeCommand::Show { id } => {
            let complete = db.get_grapheme_complete(id)?;
            Ok(format!("{complete:#?}"))
        }
        GraphemeCommand::Search { query } => Ok(render::graphemes_table(&db.search_graphemes(&query)?)),
        GraphemeCommand::Update { id, name, category, notes } => {
            let patch = GraphemePatch {
                name,
                category: category.map(Some),
                notes: notes.map(Some),
            };
            let grapheme = db.update_grapheme(id, patch)?;
            Ok(format!("updated grapheme #{}", grapheme.id))
        }
        GraphemeCommand::SetGlyphs { id, glyphs } => {
            let composition: Vec<GraphemeGlyph> = glyphs
                .into_iter()
                .enumerate()
                .map(|(position, glyph_id)| GraphemeGlyph {
                    glyph_id,
                    position: position as i32,
                    transform: None,
                })
                .collect();
            db.update_grapheme_glyphs(id, composition)?;
            Ok(format!("updated glyph composition for grapheme #{id}"))
        }
        GraphemeCommand::Rm { id } => {
            db.delete_grapheme(id)?;
            Ok(format!("deleted grapheme #{id}"))
        }
    }
}

fn phoneme(db: &mut Database, command: PhonemeCommand) -> Result<String> {
    match command {
        PhonemeCommand::Add { grapheme_id, phoneme, auto_spelling, context } => {
            let row = db.add_phoneme(grapheme_id, phoneme, auto_spelling, context)?;
            Ok(format!("added phoneme #{}", row.id))
        }
        PhonemeCommand::List { grapheme_id } => {
            Ok(render::phonemes_table(&db.get_phonemes_by_grapheme(grapheme_id)?))
        }
        PhonemeCommand::Rm { id } => {
            db.delete_phoneme(id)?;
            Ok(format!("deleted phoneme #{id}"))
        }
    }
}

fn lexicon(db: &mut Database, command: LexiconCommand) -> Result<String> {
    match command {
        LexiconCommand::Add {
            lemma,
            pronunciation,
            meaning,
            part_of_speech,
            notes,
            borrowed,
            auto_spell,
        } => {
            let has_pronunciation = pronunciation.is_some();
            let entry_id = db
                .create_lexicon_entry(
                    lemma,
                    pronunciation,
                    !borrowed,
                    auto_spell,
                    meaning,
                    part_of_speech,
                    notes,
                    vec![],
                )?
                .id;
            if auto_spell && has_pronunciation {
                db.apply_auto_spelling(entry_id)
                    .context("auto-spelling newly created entry")?;
            }
            Ok(format!("created lexicon entry #{entry_id}"))
        }
        LexiconCommand::List => Ok(render::lexicon_table(&db.list_lexicon_entries()?)),
        LexiconCommand::Show { id } => Ok(format!("{:#?}", db.get_lexicon_entry(id)?)),
        LexiconCommand::Search { query } => Ok(render::lexicon_table(&db.search_lexicon(&query)?)),
        LexiconCommand::Spell { id } => {
            let result = db.apply_auto_spelling(id)?;
            Ok(format!(
                "spelled entry #{id}: coverage={} count={}",
                result.coverage, result.count
            ))
        }
        LexiconCommand::PreviewSpell { pronunciation } => {
            let result = db.preview_auto_spelling(&pronunciation)?;
            Ok(format!("{:#?}", result.entries))
        }
        LexiconCommand::Rm { id } => {
            db.delete_lexicon_entry(id)?;
            Ok(format!("deleted lexicon entry #{id}"))
        }
    }
}

fn ancestry(db: &mut Database, command: AncestryCommand) -> Result<String> {
    match command {
        AncestryCommand::Add { id, ancestor, position, kind } => {
            let ancestry_type = parse_ancestry_type(&kind)?;
            db.add_ancestor(id, ancestor, position, ancestry_type)?;
            Ok(format!("recorded #{id} deriving from #{ancestor}"))
        }
        AncestryCommand::Rm { id, ancestor } => {
            db.remove_ancestor(id, ancestor)?;
            Ok(format!("removed ancestry edge #{id} <- #{ancestor}"))
        }
        AncestryCommand::Tree { id, max_depth } => {
            let tree = db.ancestry_tree(id, max_depth)?;
            let mut out = String::new();
            print_tree(&tree, 0, &mut out);
            Ok(out)
        }
    }
}

fn translate(db: &mut Database, phrase: &str) -> Result<String> {
    let result = db.translate_phrase(phrase)?;
    Ok(format!("{result:#?}"))
}

fn settings(db: &mut Database, command: SettingsCommand) -> Result<String> {
    match command {
        SettingsCommand::Show => {
            let settings = db.get_settings()?;
            serde_json::to_string_pretty(settings).context("rendering settings as JSON")
        }
        SettingsCommand::Set { file } => {
            let raw = std::fs::read_to_string(&file).with_context(|| format!("reading {file}"))?;
            let patch: SettingsPatch =
                toml::from_str(&raw).with_context(|| format!("parsing {file} as TOML"))?;
            db.update_settings(patch)?;
            Ok("settings updated".to_string())
        }
        SettingsCommand::Reset => {
            db.reset_settings()?;
            Ok("settings reset to defaults".to_string())
        }
    }
}

fn database(db: &mut Database, command: DbCommand) -> Result<String> {
    match command {
        DbCommand::Status => {
            let status = db.status();
            Ok(format!(
                "initialized={} glyphs={} graphemes={} last_persisted={:?}",
                status.initialized, status.glyph_count, status.grapheme_count, status.last_persisted
            ))
        }
        DbCommand::Export => {
            db.export(ExportFormat::Json)?;
            Ok("exported".to_string())
        }
        DbCommand::Import { file } => {
            let bytes = std::fs::read(&file).with_context(|| format!("reading {file}"))?;
            db.import(&bytes)?;
            Ok(format!("imported store from {file}"))
        }
        DbCommand::Clear => {
            db.clear()?;
            Ok("store cleared".to_string())
        }
        DbCommand::Reset => {
            db.reset();
            Ok("store reset".to_string())
        }
    }
}
