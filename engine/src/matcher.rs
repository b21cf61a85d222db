//! The auto-spell matcher (C3): a DP segmentation of an IPA string against the
//! phoneme→grapheme table, optimizing first for coverage, then for entry count.

use unicode_segmentation::UnicodeSegmentation;

use crate::crc32::crc32;
use crate::errors::{EngineError, EngineResult};
use crate::phoneme_table::PhonemeTable;

/// One output entry of an auto-spell result.
#[derive(Clone, Debug, PartialEq)]
pub enum MatchEntry {
    GraphemeRef { grapheme_id: i64, matched: String },
    Virtual { ch: String, id: i64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct AutoSpellResult {
    pub entries: Vec<MatchEntry>,
    pub coverage: usize,
    pub count: usize,
}

/// Derives the stable negative virtual-glyph id for an IPA character, reusing
/// the engine's own CRC-32 implementation as the hash so there is only one
/// audited hash function in the crate (see C10).
pub fn virtual_id(ch: &str) -> i32 {
    let hash = crc32(ch.as_bytes());
    // Fold into [-2147483647, -1]: always negative, never zero, stable across
    // processes since it depends only on crc32's fixed table and polynomial.
    -(1 + (hash % (i32::MAX as u32)) as i32)
}

#[derive(Clone, Copy)]
pub enum MatchMode {
    Strict,
    Fallback,
}

#[derive(Clone)]
enum Transition {
    Start,
    Match {
        grapheme_id: i64,
        start: usize,
        end: usize,
    },
    Skip {
        start: usize,
    },
}

#[derive(Clone)]
struct DpState {
    coverage: usize,
    count: usize,
    prev: usize,
    transition: Transition,
}

fn consider(best: &mut Option<DpState>, candidate: DpState) {
    let better = match best {
        None => true,
        Some(current) => {
            candidate.coverage > current.coverage
                || (candidate.coverage == current.coverage && candidate.count < current.count)
        }
    };
    if better {
        *best = Some(candidate);
    }
}

fn reconstruct(dp: &[Option<DpState>], end: usize, clusters: &[&str]) -> (Vec<MatchEntry>, usize, usize) {
    let final_state = dp[end].as_ref().expect("end reachable");
    let coverage = final_state.coverage;
    let count = final_state.count;

    let mut path = Vec::new();
    let mut cur = end;
    while cur != 0 {
        let state = dp[cur].as_ref().expect("path node reachable");
        match &state.transition {
            Transition::Match {
                grapheme_id,
                start,
                end,
            } => path.push(MatchEntry::GraphemeRef {
                grapheme_id: *grapheme_id,
                matched: clusters[*start..*end].concat(),
            }),
            Transition::Skip { start } => {
                let ch = clusters[*start].to_string();
                path.push(MatchEntry::Virtual {
                    id: virtual_id(&ch),
                    ch,
                });
            }
            Transition::Start => unreachable!("Start transition is only at position 0"),
        }
        cur = state.prev;
    }
    path.reverse();
    (path, coverage, count)
}

/// Runs the DP matcher described in the component design. `mode` selects whether
/// virtual (IPA fallback) glyphs may fill gaps.
fn run(input: &str, table: &PhonemeTable, mode: MatchMode) -> EngineResult<AutoSpellResult> {
    if input.is_empty() {
        return Err(EngineError::validation("Pronunciation is empty"));
    }

    let clusters: Vec<&str> = input.graphemes(true).collect();
    let n = clusters.len();
    let fallback = matches!(mode, MatchMode::Fallback);

    // Canonical mapping order for deterministic tie-breaks: longest phonemes first,
    // as the component design's precomputation step does.
    let phoneme_map = table.sorted_by_length_desc();
    let phoneme_clusters: Vec<Vec<&str>> = phoneme_map
        .iter()
        .map(|(phoneme, _)| phoneme.graphemes(true).collect())
        .collect();

    let mut dp: Vec<Option<DpState>> = vec![None; n + 1];
    dp[0] = Some(DpState {
        coverage: 0,
        count: 0,
        prev: 0,
        transition: Transition::Start,
    });

    for i in 1..=n {
        let mut best: Option<DpState> = None;
        for j in 0..i {
            let from = match &dp[j] {
                Some(state) => state,
                None => continue,
            };
            let from_coverage = from.coverage;
            let from_count = from.count;

            // SKIP transition only reaches position i from j == i - 1, and is
            // ordered before MATCH transitions at the same j (tie-break: skip loses
            // to no match at the same start, but ties among candidates at this j
            // are resolved by considering it first).
            if fallback && j == i - 1 {
                consider(
                    &mut best,
                    DpState {
                        coverage: from_coverage,
                        count: from_count + 1,
                        prev: j,
                        transition: Transition::Skip { start: j },
                    },
                );
            }

            for (idx, p_clusters) in phoneme_clusters.iter().enumerate() {
                let plen = p_clusters.len();
                if plen == 0 || j + plen != i {
                    continue;
                }
                if clusters[j..i] == p_clusters.as_slice() {
                    let grapheme_id = phoneme_map[idx].1;
                    consider(
                        &mut best,
                        DpState {
                            coverage: from_coverage + (i - j),
                            count: from_count + 1,
                            prev: j,
                            transition: Transition::Match {
                                grapheme_id,
                                start: j,
                                end: i,
                            },
                        },
                    );
                }
            }
        }
        dp[i] = best;
    }

    if dp[n].is_none() {
        // Strict mode (or fallback with n == 0, which cannot happen since we
        // already rejected empty input): report the longest reachable prefix.
        let mut longest = n;
        while longest > 0 && dp[longest].is_none() {
            longest -= 1;
        }
        let unmatched = clusters[longest..].concat();
        return Err(EngineError::NoCoverage { unmatched });
    }

    let (entries, coverage, count) = reconstruct(&dp, n, &clusters);
    Ok(AutoSpellResult {
        entries,
        coverage,
        count,
    })
}

/// Strict mode: fails with `NoCoverage` if no full segmentation exists.
pub fn generate_auto_spelling(input: &str, table: &PhonemeTable) -> EngineResult<AutoSpellResult> {
    run(input, table, MatchMode::Strict)
}

/// Fallback mode: always produces a full output, filling gaps with virtual glyphs.
pub fn preview_auto_spelling(input: &str, table: &PhonemeTable) -> EngineResult<AutoSpellResult> {
    run(input, table, MatchMode::Fallback)
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
    fn empty_pronunciation_is_validation_error_in_both_modes() {
        let table = table_from(&[("a", 1)]);
        assert!(matches!(
            generate_auto_spelling("", &table),
            Err(EngineError::ValidationError(_))
        ));
        assert!(matches!(
            preview_auto_spelling("", &table),
            Err(EngineError::ValidationError(_))
        ));
    }

    #[test]
    fn strict_no_coverage_reports_entire_input_when_table_empty() {
        let table = PhonemeTable::default();
        match generate_auto_spelling("abc", &table) {
            Err(EngineError::NoCoverage { unmatched }) => assert_eq!(unmatched, "abc"),
            other => panic!("expected NoCoverage, got {other:?}"),
        }
    }

    #[test]
    fn fallback_produces_all_virtual_output_when_table_empty() {
        let table = PhonemeTable::default();
        let result = preview_auto_spelling("abc", &table).unwrap();
        assert_eq!(result.coverage, 0);
        assert_eq!(result.count, 3);
        assert!(result
            .entries
            .iter()
            .all(|e| matches!(e, MatchEntry::Virtual { .. })));
    }

    /// Scenario D: greedy longest-match would pick "ABC" then fail on "D"; the
    /// optimal segmentation is "AB" + "CD", covering the full input with 2 entries.
    #[test]
    fn optimal_beats_greedy_longest_match() {
        let table = table_from(&[("ABC", 1), ("AB", 2), ("CD", 3)]);
        let result = generate_auto_spelling("ABCD", &table).unwrap();
        assert_eq!(result.coverage, 4);
        assert_eq!(result.count, 2);
        assert_eq!(
            result.entries,
            vec![
                MatchEntry::GraphemeRef {
                    grapheme_id: 2,
                    matched: "AB".to_string()
                },
                MatchEntry::GraphemeRef {
                    grapheme_id: 3,
                    matched: "CD".to_string()
                },
            ]
        );
    }

    #[test]
    fn determinism_across_repeated_runs() {
        let table = table_from(&[("k", 1), ("a", 2), ("t", 3)]);
        let first = generate_auto_spelling("kat", &table).unwrap();
        let second = generate_auto_spelling("kat", &table).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn virtual_id_is_stable_and_negative() {
        let a = virtual_id("x");
        let b = virtual_id("x");
        assert_eq!(a, b);
        assert!(a < 0);
    }

    #[test]
    fn strict_reports_longest_reachable_prefix_on_partial_match() {
        let table = table_from(&[("k", 1), ("a", 2)]);
        match generate_auto_spelling("katz", &table) {
            Err(EngineError::NoCoverage { unmatched }) => assert_eq!(unmatched, "tz"),
            other => panic!("expected NoCoverage, got {other:?}"),
        }
    }
}
