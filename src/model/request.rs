//! Per-request rule caching
//!
//! A decoder asks for the same phrases many times while translating one
//! sentence. [`DecodingRequest`] memoizes them in an LRU cache private to
//! the request. Cached rules are tagged with the snapshot version they came
//! from and dropped as soon as a different snapshot is published.

use super::{Snapshot, TranslationModel};
use crate::error::Result;
use crate::index::types::{Span, TokenId};
use crate::query::rule::Rule;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// Translation options for one source span of a sentence
#[derive(Debug, Clone)]
pub struct GridCell {
    pub span: Span,
    pub rules: Arc<[Rule]>,
}

/// Every span of a sentence that has translation options
#[derive(Debug, Clone, Default)]
pub struct RuleGrid {
    sentence_len: usize,
    cells: Vec<GridCell>,
}

impl RuleGrid {
    pub fn sentence_len(&self) -> usize {
        self.sentence_len
    }

    /// Rules for the span `[start, end)`, if any were found
    pub fn get(&self, start: usize, end: usize) -> Option<&[Rule]> {
        self.cells
            .iter()
            .find(|c| c.span == Span::new(start, end))
            .map(|c| &*c.rules)
    }

    /// Cells ordered by span length, then start
    pub fn iter(&self) -> impl Iterator<Item = &GridCell> + '_ {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Rule lookups for one decoding request, cached per distinct phrase
pub struct DecodingRequest<'m> {
    model: &'m TranslationModel,
    cache: LruCache<Vec<TokenId>, Arc<[Rule]>>,
    /// Snapshot version the cached entries belong to
    version: Option<u64>,
    hits: u64,
    misses: u64,
}

impl<'m> DecodingRequest<'m> {
    pub(crate) fn new(model: &'m TranslationModel, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            model,
            cache: LruCache::new(capacity),
            version: None,
            hits: 0,
            misses: 0,
        }
    }

    /// Ranked rules for `phrase`; repeated calls on an unchanged snapshot
    /// return the same shared result
    pub fn query(&mut self, phrase: &[TokenId]) -> Result<Arc<[Rule]>> {
        let snapshot = self.model.snapshot();
        self.query_in(&snapshot, phrase)
    }

    /// Rules for every span of `sentence` up to the longest source phrase
    ///
    /// A span is only looked up when both of its one-shorter sub-spans
    /// occur in the corpus. The whole grid is built against one snapshot.
    pub fn rule_grid(&mut self, sentence: &[TokenId]) -> Result<RuleGrid> {
        let snapshot = self.model.snapshot();
        let longest = self.model.config().longest_source_phrase.min(sentence.len());
        let n = sentence.len();
        // occurs[start][len]
        let mut occurs = vec![vec![false; longest + 1]; n];
        let mut cells = Vec::new();

        for len in 1..=longest {
            for start in 0..=n - len {
                if len > 1 && !(occurs[start][len - 1] && occurs[start + 1][len - 1]) {
                    continue;
                }
                let phrase = &sentence[start..start + len];
                if snapshot.index().count(phrase) == 0 {
                    continue;
                }
                occurs[start][len] = true;

                let rules = self.query_in(&snapshot, phrase)?;
                if !rules.is_empty() {
                    cells.push(GridCell {
                        span: Span::new(start, start + len),
                        rules,
                    });
                }
            }
        }

        Ok(RuleGrid {
            sentence_len: n,
            cells,
        })
    }

    fn query_in(&mut self, snapshot: &Snapshot, phrase: &[TokenId]) -> Result<Arc<[Rule]>> {
        if self.version != Some(snapshot.version()) {
            if !self.cache.is_empty() {
                debug!(
                    entries = self.cache.len(),
                    version = snapshot.version(),
                    "snapshot changed, clearing rule cache"
                );
            }
            self.cache.clear();
            self.version = Some(snapshot.version());
        }

        if let Some(rules) = self.cache.get(phrase) {
            self.hits += 1;
            return Ok(Arc::clone(rules));
        }

        self.misses += 1;
        let rules: Arc<[Rule]> = self.model.extract(snapshot, phrase)?.into();
        debug!(
            phrase_len = phrase.len(),
            rules = rules.len(),
            "rule cache miss"
        );
        self.cache.put(phrase.to_vec(), Arc::clone(&rules));
        Ok(rules)
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Phrases currently cached
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::corpus::SentencePair;
    use crate::model::ModelConfig;

    fn model() -> TranslationModel {
        let pairs = [
            SentencePair::new(vec![0, 1, 2], vec![10, 11, 12], [(0u32, 0u32), (1, 1), (2, 2)]).unwrap(),
            SentencePair::new(vec![1, 2], vec![11, 12], [(0u32, 0u32), (1, 1)]).unwrap(),
        ];
        TranslationModel::from_pairs(ModelConfig::default(), pairs).unwrap()
    }

    #[test]
    fn test_cache_hit_returns_same_result() {
        let model = model();
        let mut request = model.request();
        let first = request.query(&[1, 2]).unwrap();
        let second = request.query(&[1, 2]).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(request.hits(), 1);
        assert_eq!(request.misses(), 1);
        assert_eq!(&*first, model.query(&[1, 2]).unwrap().as_slice());
    }

    #[test]
    fn test_cache_cleared_on_publish() {
        let model = model();
        let mut request = model.request();
        let before = request.query(&[1]).unwrap();
        assert_eq!(before.len(), 1);

        model.append_pair(vec![1], vec![13], [(0u32, 0u32)]).unwrap();
        let after = request.query(&[1]).unwrap();
        assert_eq!(request.misses(), 2);
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_rule_grid_skips_missing_spans() {
        let model = model();
        let mut request = model.request();
        // 7 never occurs, so no span containing it is looked up
        let grid = request.rule_grid(&[0, 1, 7, 2]).unwrap();
        assert_eq!(grid.sentence_len(), 4);
        assert!(grid.get(0, 1).is_some());
        assert!(grid.get(0, 2).is_some());
        assert!(grid.get(3, 4).is_some());
        assert!(grid.get(2, 3).is_none());
        assert!(grid.get(1, 3).is_none());
        // Looked up: [0] [1] [2] and [0 1]
        assert_eq!(request.misses(), 4);
        assert_eq!(grid.len(), 4);
    }

    #[test]
    fn test_rule_grid_empty_sentence() {
        let model = model();
        let grid = model.request().rule_grid(&[]).unwrap();
        assert!(grid.is_empty());
    }
}
