//! Phrase-pair extraction from sampled occurrences
//!
//! For a source phrase:
//! 1. Find every occurrence through the base + delta indexes
//! 2. Take a deterministic stratified sample of at most the configured cap
//! 3. Pull the aligned target span out of each sampled sentence
//! 4. Group identical target phrases and score each group
//!
//! Rules come back in decoder order (see [`Rule::rank_cmp`]).

use super::features::{FeatureSet, RuleStats};
use super::rule::{Rule, RuleScores, rank_rules};
use super::scorer::{OrientationCounts, internal_alignment, lexical_weights, orientation};
use crate::error::{Result, TmError};
use crate::index::cooc::LexicalCounts;
use crate::index::corpus::{Corpus, SentencePair};
use crate::index::delta::DeltaIndex;
use crate::index::types::{Link, SentenceId, Span, TokenId};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

/// Extraction limits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Occurrences examined per query
    pub max_occurrences_sampled: usize,
    /// Aligned target spans longer than this are dropped
    pub longest_target_phrase: usize,
    /// Lexical probability assumed for unaligned words
    pub lex_floor: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_occurrences_sampled: 100,
            longest_target_phrase: 7,
            lex_floor: super::scorer::DEFAULT_LEX_FLOOR,
        }
    }
}

/// Running totals for one distinct target phrase
struct Group<'c> {
    target: &'c [TokenId],
    count: u32,
    /// Distinct internal alignments with their counts, in first-seen order
    alignments: Vec<(Vec<Link>, u32)>,
    orientation: OrientationCounts,
}

impl Group<'_> {
    /// The most frequent internal alignment; the first seen wins ties
    fn best_alignment(&self) -> &[Link] {
        let mut best: Option<&(Vec<Link>, u32)> = None;
        for entry in &self.alignments {
            if best.is_none_or(|b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|(links, _)| links.as_slice()).unwrap_or(&[])
    }
}

/// Extracts and scores translation options for source phrases
#[derive(Debug)]
pub struct RuleExtractor {
    config: ExtractorConfig,
    features: FeatureSet,
}

impl RuleExtractor {
    pub fn new(config: ExtractorConfig, features: FeatureSet) -> Self {
        Self { config, features }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Extract ranked rules for `phrase`
    ///
    /// `corpus`, `index` and `cooc` must describe the same corpus state. An
    /// occurrence that does not resolve to a sentence is an index/corpus
    /// desync and fails with `OutOfRange`. No occurrences is not an error.
    pub fn extract(
        &self,
        corpus: &Corpus,
        index: &DeltaIndex,
        cooc: &impl LexicalCounts,
        phrase: &[TokenId],
    ) -> Result<Vec<Rule>> {
        let occurrences = index.merge(phrase);
        if occurrences.is_empty() {
            return Ok(Vec::new());
        }

        let mut num_sampled = 0u32;
        // Distinct sampled sentences, in first-seen order
        let mut sentences: Vec<&SentencePair> = Vec::new();
        let mut seen: AHashSet<SentenceId> = AHashSet::new();
        let mut groups: Vec<Group<'_>> = Vec::new();
        let mut by_target: AHashMap<&[TokenId], usize> = AHashMap::new();

        for position in occurrences.sample(self.config.max_occurrences_sampled) {
            let (sentence, offset) = corpus.resolve(position)?;
            let pair = corpus.sentence(sentence).ok_or(TmError::OutOfRange {
                position,
                len: corpus.flat_len(),
            })?;
            let source_span = Span::new(offset, offset + phrase.len());
            if source_span.end > pair.source_len() {
                return Err(TmError::OutOfRange {
                    position: position + phrase.len(),
                    len: corpus.flat_len(),
                });
            }
            num_sampled += 1;
            if seen.insert(sentence) {
                sentences.push(pair);
            }

            let Some(target_span) = pair.aligned_target_span(source_span) else {
                continue;
            };
            if target_span.len() > self.config.longest_target_phrase {
                continue;
            }

            let target = &pair.target()[target_span.start..target_span.end];
            let idx = *by_target.entry(target).or_insert_with(|| {
                groups.push(Group {
                    target,
                    count: 0,
                    alignments: Vec::new(),
                    orientation: OrientationCounts::default(),
                });
                groups.len() - 1
            });
            let group = &mut groups[idx];
            group.count += 1;

            let links = internal_alignment(pair, source_span, target_span);
            match group.alignments.iter_mut().find(|(l, _)| *l == links) {
                Some(entry) => entry.1 += 1,
                None => group.alignments.push((links, 1)),
            }

            let (fwd, bwd) = orientation(pair, source_span, target_span);
            group.orientation.record(fwd, bwd);
        }

        let mut rules: Vec<Rule> = groups
            .iter()
            .map(|group| {
                // Occurrences of the target phrase in the sampled sentences,
                // each sentence counted once
                let target_total: usize =
                    sentences.iter().map(|p| p.count_target(group.target)).sum();
                let alignment = group.best_alignment();
                let (lex_fwd, lex_bwd) =
                    lexical_weights(phrase, group.target, alignment, cooc, self.config.lex_floor);

                let scores = RuleScores {
                    phrase_fwd: group.count as f64 / num_sampled as f64,
                    phrase_bwd: group.count as f64 / target_total.max(1) as f64,
                    lex_fwd,
                    lex_bwd,
                };
                let stats = RuleStats {
                    source: phrase,
                    target: group.target,
                    count: group.count,
                    sampled: num_sampled,
                    scores,
                    orientation: group.orientation,
                };
                Rule {
                    source: phrase.to_vec(),
                    target: group.target.to_vec(),
                    features: self.features.featurize(&stats),
                    count: group.count,
                    scores,
                    alignment: alignment.to_vec(),
                }
            })
            .collect();

        rank_rules(&mut rules);
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::cooc::CoocLayers;
    use crate::index::suffix_array::SuffixArrayConfig;
    use crate::query::features::{FeatureTemplate, PHRASE_FWD};

    fn pair(src: &[u32], tgt: &[u32], links: &[(u32, u32)]) -> SentencePair {
        SentencePair::new(src.to_vec(), tgt.to_vec(), links.iter().copied()).unwrap()
    }

    fn extract_with(pairs: Vec<SentencePair>, config: ExtractorConfig, phrase: &[TokenId]) -> Vec<Rule> {
        let corpus = Corpus::from_pairs(pairs);
        let index = DeltaIndex::build(&corpus, SuffixArrayConfig::default()).unwrap();
        let cooc = CoocLayers::from_corpus(&corpus);
        let extractor = RuleExtractor::new(config, FeatureSet::new(FeatureTemplate::Dense));
        extractor.extract(&corpus, &index, &cooc, phrase).unwrap()
    }

    fn extract(pairs: Vec<SentencePair>, phrase: &[TokenId]) -> Vec<Rule> {
        extract_with(pairs, ExtractorConfig::default(), phrase)
    }

    #[test]
    fn test_single_pair_scenario() {
        // a b c -> x y, links 0-0 1-1 2-1; query "b c"
        let rules = extract(vec![pair(&[0, 1, 2], &[10, 11], &[(0, 0), (1, 1), (2, 1)])], &[1, 2]);
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.target, vec![11]);
        assert_eq!(rule.count, 1);
        assert_eq!(rule.scores.phrase_fwd, 1.0);
        assert_eq!(rule.scores.phrase_bwd, 1.0);
        assert_eq!(rule.features.get(PHRASE_FWD), Some(0.0));
        assert_eq!(rule.alignment, vec![Link::new(0, 0), Link::new(1, 0)]);
    }

    #[test]
    fn test_no_occurrences_is_empty() {
        let rules = extract(vec![pair(&[0, 1], &[10], &[(0, 0)])], &[5]);
        assert!(rules.is_empty());
    }

    #[test]
    fn test_unaligned_occurrences_count_in_denominator() {
        let rules = extract(
            vec![
                pair(&[0, 1], &[10, 11], &[(0, 0), (1, 1)]),
                pair(&[0, 2], &[12, 13], &[(1, 1)]),
            ],
            &[0],
        );
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].target, vec![10]);
        assert_eq!(rules[0].scores.phrase_fwd, 0.5);
    }

    #[test]
    fn test_ranking_and_backward_normalization() {
        let rules = extract(
            vec![
                pair(&[0], &[10], &[(0, 0)]),
                pair(&[0], &[10], &[(0, 0)]),
                pair(&[0, 1], &[11, 10], &[(0, 0), (1, 1)]),
            ],
            &[0],
        );
        let targets: Vec<_> = rules.iter().map(|r| r.target.clone()).collect();
        assert_eq!(targets, vec![vec![10], vec![11]]);
        // "10" appears in all three sampled sentences but is extracted twice
        assert!((rules[0].scores.phrase_bwd - 2.0 / 3.0).abs() < 1e-12);
        assert!((rules[0].scores.phrase_fwd - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(rules[1].scores.phrase_bwd, 1.0);
    }

    #[test]
    fn test_repeated_phrase_counts_sentence_once() {
        // a b a -> x y x, diagonal links: both occurrences of "a" give "x"
        let rules = extract(vec![pair(&[0, 5, 0], &[10, 11, 10], &[(0, 0), (1, 1), (2, 2)])], &[0]);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].target, vec![10]);
        assert_eq!(rules[0].count, 2);
        assert_eq!(rules[0].scores.phrase_fwd, 1.0);
        assert_eq!(rules[0].scores.phrase_bwd, 1.0);
    }

    #[test]
    fn test_repeated_phrase_with_other_sentences() {
        let rules = extract(
            vec![
                pair(&[0, 5, 0], &[10, 11, 10], &[(0, 0), (1, 1), (2, 2)]),
                pair(&[0], &[12], &[(0, 0)]),
                pair(&[6], &[10], &[(0, 0)]),
            ],
            &[0],
        );
        let targets: Vec<_> = rules.iter().map(|r| r.target.clone()).collect();
        assert_eq!(targets, vec![vec![10], vec![12]]);
        // "10" occurs twice in the only sampled sentence containing it
        assert_eq!(rules[0].scores.phrase_bwd, 1.0);
        assert!((rules[0].scores.phrase_fwd - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_equal_probabilities_break_ties_by_target() {
        let rules = extract(
            vec![pair(&[0], &[12], &[(0, 0)]), pair(&[0], &[11], &[(0, 0)])],
            &[0],
        );
        let targets: Vec<_> = rules.iter().map(|r| r.target[0]).collect();
        assert_eq!(targets, vec![11, 12]);
    }

    #[test]
    fn test_long_target_span_dropped() {
        let config = ExtractorConfig {
            longest_target_phrase: 2,
            ..Default::default()
        };
        // Source 0 links to target positions 0 and 3: span of length 4
        let rules = extract_with(
            vec![pair(&[0], &[10, 11, 12, 13], &[(0, 0), (0, 3)])],
            config,
            &[0],
        );
        assert!(rules.is_empty());
    }

    #[test]
    fn test_sampling_cap_bounds_counts() {
        let pairs: Vec<_> = (0..50).map(|_| pair(&[0], &[10], &[(0, 0)])).collect();
        let config = ExtractorConfig {
            max_occurrences_sampled: 7,
            ..Default::default()
        };
        let first = extract_with(pairs.clone(), config, &[0]);
        let second = extract_with(pairs, config, &[0]);
        assert_eq!(first[0].count, 7);
        assert_eq!(first, second);
    }

    #[test]
    fn test_most_frequent_alignment() {
        let rules = extract(
            vec![
                pair(&[0, 1], &[10, 11], &[(0, 0), (1, 1)]),
                pair(&[0, 1], &[10, 11], &[(0, 1), (1, 0)]),
                pair(&[0, 1], &[10, 11], &[(0, 1), (1, 0)]),
            ],
            &[0, 1],
        );
        assert_eq!(rules[0].count, 3);
        assert_eq!(rules[0].alignment, vec![Link::new(0, 1), Link::new(1, 0)]);
    }
}
