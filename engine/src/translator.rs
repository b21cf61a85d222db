//! The phrase translator (C6): tokenizes a source phrase, resolves each token
//! against the lexicon (falling back to the auto-spell matcher), and splices
//! separators back in to produce one combined, globally-numbered spelling.

use crate::errors::EngineResult;
use crate::lexicon::LexiconStore;
use crate::matcher::{preview_auto_spelling, virtual_id, MatchEntry};
use crate::phoneme_table::PhonemeTable;
use crate::settings::PunctuationSettings;
use crate::spelling::{self, SpellingEntry};

/// Sentinel token emitted between consecutive lines of a multi-line phrase.
pub const LINE_BREAK: &str = "\u{2028}";

struct Token {
    text: String,
    normalized: String,
    position: usize,
    is_line_break: bool,
}

/// Splits on newlines first (inserting a [`LINE_BREAK`] sentinel between
/// lines), then on horizontal whitespace within each line. Empty tokens are
/// dropped; each surviving token keeps a monotonic position.
fn tokenize(phrase: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut position = 0usize;

    for (i, line) in phrase.split('\n').enumerate() {
        if i > 0 {
            tokens.push(Token {
                text: LINE_BREAK.to_string(),
                normalized: LINE_BREAK.to_string(),
                position,
                is_line_break: true,
            });
            position += 1;
        }
        for word in line.split(|c: char| c == ' ' || c == '\t') {
            if word.is_empty() {
                continue;
            }
            tokens.push(Token {
                normalized: word.to_lowercase(),
                text: word.to_string(),
                position,
                is_line_break: false,
            });
            position += 1;
        }
    }

    tokens
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenTranslationKind {
    LexiconHit {
        lexicon_id: i64,
        entries: Vec<SpellingEntry>,
        has_ipa_fallbacks: bool,
    },
    AutoSpelled {
        entries: Vec<MatchEntry>,
    },
    LineBreak,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TokenTranslation {
    pub position: usize,
    pub source_text: String,
    pub kind: TokenTranslationKind,
}

/// One element of the combined, globally-numbered output spelling.
#[derive(Clone, Debug, PartialEq)]
pub enum SpellingOutputEntry {
    Grapheme { grapheme_id: i64 },
    Virtual { ch: String, id: i32 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PositionedEntry {
    pub position: usize,
    pub entry: SpellingOutputEntry,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TranslationResult {
    pub original_phrase: String,
    pub normalized_phrase: String,
    pub tokens: Vec<TokenTranslation>,
    pub spelling: Vec<PositionedEntry>,
    pub has_virtual_glyphs: bool,
    pub created_at: i64,
}

fn spelling_entry_to_output(entry: &SpellingEntry) -> SpellingOutputEntry {
    match entry {
        SpellingEntry::GraphemeRef(id) => SpellingOutputEntry::Grapheme { grapheme_id: *id },
        SpellingEntry::Ipa(ch) => SpellingOutputEntry::Virtual {
            id: virtual_id(ch),
            ch: ch.clone(),
        },
    }
}

fn match_entry_to_output(entry: &MatchEntry) -> SpellingOutputEntry {
    match entry {
        MatchEntry::GraphemeRef { grapheme_id, .. } => SpellingOutputEntry::Grapheme {
            grapheme_id: *grapheme_id,
        },
        MatchEntry::Virtual { ch, id } => SpellingOutputEntry::Virtual {
            ch: ch.clone(),
            id: *id,
        },
    }
}

/// Resolves the word separator: `None` means `useNoGlyph`, emit nothing.
fn resolve_word_separator(punctuation: &PunctuationSettings) -> Option<SpellingOutputEntry> {
    let binding = &punctuation.word_separator;
    if binding.use_no_glyph {
        return None;
    }
    match binding.grapheme_id {
        Some(grapheme_id) => Some(SpellingOutputEntry::Grapheme { grapheme_id }),
        None => Some(SpellingOutputEntry::Virtual {
            ch: " ".to_string(),
            id: virtual_id(" "),
        }),
    }
}

fn translate_token(
    token: &Token,
    lexicon: &LexiconStore,
    table: &PhonemeTable,
) -> EngineResult<TokenTranslationKind> {
    let hit = lexicon
        .get_all()
        .into_iter()
        .find(|e| e.lemma.to_lowercase() == token.normalized);

    if let Some(entry) = hit {
        let entries = spelling::decode(&entry.glyph_order);
        let has_ipa_fallbacks = spelling::has_ipa_fallbacks(&entries);
        return Ok(TokenTranslationKind::LexiconHit {
            lexicon_id: entry.id,
            entries,
            has_ipa_fallbacks,
        });
    }

    // Miss: fall back to the matcher on the original (non-IPA) token text. Since
    // ordinary orthography rarely matches a phoneme table built from IPA strings,
    // this typically surfaces the token as a run of virtual glyphs, one per
    // input character — the documented "verbatim fallback" behavior.
    let result = preview_auto_spelling(&token.text, table)?;
    Ok(TokenTranslationKind::AutoSpelled {
        entries: result.entries,
    })
}

/// Translates `phrase`. Every word token is looked up by case-insensitive lemma
/// equality against `lexicon`; on a miss it falls back to the auto-spell matcher
/// (C3) in fallback mode so translation always completes. A word separator is
/// spliced between consecutive real tokens, resolved from `punctuation`'s
/// `word_separator` binding; line breaks suppress the pending separator and
/// contribute a literal newline entry instead.
pub fn translate(
    phrase: &str,
    lexicon: &LexiconStore,
    table: &PhonemeTable,
    punctuation: &PunctuationSettings,
    now: i64,
) -> EngineResult<TranslationResult> {
    let tokens = tokenize(phrase);
    let mut token_translations = Vec::with_capacity(tokens.len());
    let mut spelling_out = Vec::new();
    let mut global_position = 0usize;
    let mut has_virtual_glyphs = false;
    let mut prev_was_real = false;
    let mut first = true;

    for token in &tokens {
        if token.is_line_break {
            spelling_out.push(PositionedEntry {
                position: global_position,
                entry: SpellingOutputEntry::Virtual {
                    ch: "\n".to_string(),
                    id: virtual_id("\n"),
                },
            });
            global_position += 1;
            token_translations.push(TokenTranslation {
                position: token.position,
                source_text: token.text.clone(),
                kind: TokenTranslationKind::LineBreak,
            });
            prev_was_real = false;
            first = false;
            continue;
        }

        if !first && prev_was_real {
            if let Some(separator) = resolve_word_separator(punctuation) {
                if matches!(separator, SpellingOutputEntry::Virtual { .. }) {
                    has_virtual_glyphs = true;
                }
                spelling_out.push(PositionedEntry {
                    position: global_position,
                    entry: separator,
                });
                global_position += 1;
            }
        }

        let kind = translate_token(token, lexicon, table)?;
        match &kind {
            TokenTranslationKind::LexiconHit { entries, .. } => {
                for entry in entries {
                    let output = spelling_entry_to_output(entry);
                    has_virtual_glyphs |= matches!(output, SpellingOutputEntry::Virtual { .. });
                    spelling_out.push(PositionedEntry {
                        position: global_position,
                        entry: output,
                    });
                    global_position += 1;
                }
            }
            TokenTranslationKind::AutoSpelled { entries } => {
                for entry in entries {
                    let output = match_entry_to_output(entry);
                    has_virtual_glyphs |= matches!(output, SpellingOutputEntry::Virtual { .. });
                    spelling_out.push(PositionedEntry {
                        position: global_position,
                        entry: output,
                    });
                    global_position += 1;
                }
            }
            TokenTranslationKind::LineBreak => unreachable!("handled above"),
        }

        token_translations.push(TokenTranslation {
            position: token.position,
            source_text: token.text.clone(),
            kind,
        });
        prev_was_real = true;
        first = false;
    }

    Ok(TranslationResult {
        original_phrase: phrase.to_string(),
        normalized_phrase: phrase.trim().to_string(),
        tokens: token_translations,
        spelling: spelling_out,
        has_virtual_glyphs,
        created_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phoneme;

    fn table_from(pairs: &[(&str, i64)]) -> PhonemeTable {
        let phonemes: Vec<Phoneme> = pairs
            .iter()
            .enumerate()
            .map(|(i, (p, gid))| Phoneme {
                id: i as i64 + 1,
                grapheme_id: *gid,
                phoneme: p.to_string(),
                use_in_auto_spelling: true,
                context: None,
            })
            .collect();
        PhonemeTable::build(&phonemes)
    }

    #[test]
    fn tokenizer_splits_on_horizontal_whitespace_only() {
        let tokens = tokenize("one two\tthree");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn tokenizer_emits_line_break_sentinel_between_lines() {
        let tokens = tokenize("one\ntwo");
        assert!(tokens.iter().any(|t| t.is_line_break));
    }

    #[test]
    fn miss_falls_back_to_matcher_as_virtual_glyphs() {
        let lexicon = LexiconStore::new();
        let table = PhonemeTable::default();
        let punctuation = PunctuationSettings::default();
        let result = translate("cat", &lexicon, &table, &punctuation, 0).unwrap();
        assert!(result.has_virtual_glyphs);
        assert!(matches!(
            result.tokens[0].kind,
            TokenTranslationKind::AutoSpelled { .. }
        ));
    }

    #[test]
    fn separator_splices_between_consecutive_real_tokens_only() {
        let lexicon = LexiconStore::new();
        let table = table_from(&[("a", 1)]);
        let punctuation = PunctuationSettings::default();
        let result = translate("a a", &lexicon, &table, &punctuation, 0).unwrap();
        // entry, separator, entry => 3 combined spelling entries
        assert_eq!(result.spelling.len(), 3);
        assert_eq!(
            result.spelling[1].entry,
            SpellingOutputEntry::Virtual {
                ch: " ".to_string(),
                id: virtual_id(" ")
            }
        );
    }

    #[test]
    fn line_break_suppresses_pending_separator() {
        let lexicon = LexiconStore::new();
        let table = table_from(&[("a", 1)]);
        let punctuation = PunctuationSettings::default();
        let result = translate("a\na", &lexicon, &table, &punctuation, 0).unwrap();
        // entry, newline, entry => no separator entry in between
        assert_eq!(result.spelling.len(), 3);
        assert_eq!(
            result.spelling[1].entry,
            SpellingOutputEntry::Virtual {
                ch: "\n".to_string(),
                id: virtual_id("\n")
            }
        );
    }

    #[test]
    fn word_separator_use_no_glyph_emits_nothing() {
        let lexicon = LexiconStore::new();
        let table = table_from(&[("a", 1)]);
        let mut punctuation = PunctuationSettings::default();
        punctuation.word_separator.use_no_glyph = true;
        let result = translate("a a", &lexicon, &table, &punctuation, 0).unwrap();
        assert_eq!(result.spelling.len(), 2);
    }

    #[test]
    fn global_position_numbering_is_sequential() {
        let lexicon = LexiconStore::new();
        let table = table_from(&[("a", 1)]);
        let punctuation = PunctuationSettings::default();
        let result = translate("a a", &lexicon, &table, &punctuation, 0).unwrap();
        let positions: Vec<usize> = result.spelling.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }
}
