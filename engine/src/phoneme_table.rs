//! The phoneme→grapheme table (C2): a pure function of the current phoneme rows.

use std::collections::HashMap;

use crate::models::Phoneme;

/// The derived phoneme→grapheme map. When two graphemes carry the same phoneme
/// string, the smallest `grapheme_id` wins (first created). Iteration order is
/// first-appearance order, not insertion order of the winning row.
#[derive(Clone, Debug, Default)]
pub struct PhonemeTable {
    entries: Vec<(String, i64)>,
}

impl PhonemeTable {
    /// Builds the table from every phoneme row with `use_in_auto_spelling = true`.
    pub fn build<'a>(phonemes: impl IntoIterator<Item = &'a Phoneme>) -> Self {
        let mut order: Vec<String> = Vec::new();
        let mut winners: HashMap<String, i64> = HashMap::new();

        for phoneme in phonemes {
            if !phoneme.use_in_auto_spelling {
                continue;
            }
            match winners.get_mut(&phoneme.phoneme) {
                Some(current) => {
                    if phoneme.grapheme_id < *current {
                        *current = phoneme.grapheme_id;
                    }
                }
                None => {
                    winners.insert(phoneme.phoneme.clone(), phoneme.grapheme_id);
                    order.push(phoneme.phoneme.clone());
                }
            }
        }

        let entries = order
            .into_iter()
            .map(|phoneme| {
                let grapheme_id = winners[&phoneme];
                (phoneme, grapheme_id)
            })
            .collect();

        PhonemeTable { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The map as a list of unique `(phoneme, grapheme_id)` pairs, first-appearance order.
    pub fn build_map(&self) -> &[(String, i64)] {
        &self.entries
    }

    /// The same list, ordered by phoneme length (in chars) descending; used by the
    /// matcher's precomputation so longer phonemes are tried before shorter ones
    /// when iterating `matches_at`.
    pub fn sorted_by_length_desc(&self) -> Vec<(String, i64)> {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
        entries
    }

    pub fn grapheme_for(&self, phoneme: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(p, _)| p == phoneme)
            .map(|(_, g)| *g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phoneme(id: i64, grapheme_id: i64, value: &str, auto: bool) -> Phoneme {
        Phoneme {
            id,
            grapheme_id,
            phoneme: value.to_string(),
            use_in_auto_spelling: auto,
            context: None,
        }
    }

    #[test]
    fn empty_when_no_auto_spelling_phonemes() {
        let phonemes = vec![phoneme(1, 1, "a", false)];
        let table = PhonemeTable::build(&phonemes);
        assert!(table.is_empty());
    }

    #[test]
    fn ties_resolved_by_smallest_grapheme_id() {
        let phonemes = vec![
            phoneme(1, 5, "a", true),
            phoneme(2, 2, "a", true),
            phoneme(3, 9, "a", true),
        ];
        let table = PhonemeTable::build(&phonemes);
        assert_eq!(table.grapheme_for("a"), Some(2));
    }

    #[test]
    fn sorted_by_length_desc_is_stable() {
        let phonemes = vec![
            phoneme(1, 1, "a", true),
            phoneme(2, 2, "ab", true),
            phoneme(3, 3, "abc", true),
        ];
        let table = PhonemeTable::build(&phonemes);
        let sorted = table.sorted_by_length_desc();
        assert_eq!(
            sorted.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>(),
            vec!["abc", "ab", "a"]
        );
    }
}
