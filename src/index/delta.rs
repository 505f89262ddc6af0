//! Base + delta suffix indexes
//!
//! The base index covers the corpus as of the last fold; the delta index
//! covers every pair appended since. Appends rebuild only the (small) delta
//! index. Once the delta grows past a fraction of the base, the corpus is
//! folded and both are rebuilt from scratch.

use crate::error::Result;
use crate::index::corpus::Corpus;
use crate::index::suffix_array::{Positions, SuffixArrayBuilder, SuffixArrayConfig, SuffixIndex};
use crate::index::types::{FlatPosition, TokenId};
use std::iter::Chain;
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// Suffix indexes over the base and delta segments of one corpus
#[derive(Clone)]
pub struct DeltaIndex {
    base: Arc<SuffixIndex>,
    delta: Arc<SuffixIndex>,
}

impl DeltaIndex {
    /// Build both indexes for `corpus`
    pub fn build(corpus: &Corpus, config: SuffixArrayConfig) -> Result<Self> {
        let builder = SuffixArrayBuilder::new(config);
        let base = builder.build(Arc::clone(corpus.base()))?;
        let delta = builder.build(Arc::clone(corpus.delta()))?;
        Ok(Self {
            base: Arc::new(base),
            delta: Arc::new(delta),
        })
    }

    /// Rebuild only the delta index, sharing this base index
    ///
    /// `corpus` must have the same base segment this index was built from.
    pub fn rebuild_delta(&self, corpus: &Corpus, config: SuffixArrayConfig) -> Result<Self> {
        debug_assert!(Arc::ptr_eq(self.base.segment(), corpus.base()));
        let delta = SuffixArrayBuilder::new(config).build(Arc::clone(corpus.delta()))?;
        debug!(
            delta_tokens = delta.len(),
            delta_sentences = delta.stats().sentences,
            "rebuilt delta index"
        );
        Ok(Self {
            base: Arc::clone(&self.base),
            delta: Arc::new(delta),
        })
    }

    pub fn base(&self) -> &SuffixIndex {
        &self.base
    }

    pub fn delta(&self) -> &SuffixIndex {
        &self.delta
    }

    /// All occurrences of `query`: base positions followed by delta positions
    pub fn merge(&self, query: &[TokenId]) -> Occurrences<'_> {
        Occurrences {
            base: &self.base,
            base_range: self.base.range_for(query),
            delta: &self.delta,
            delta_range: self.delta.range_for(query),
        }
    }

    /// Number of occurrences of `query` across both indexes
    pub fn count(&self, query: &[TokenId]) -> usize {
        self.base.count(query) + self.delta.count(query)
    }

    /// Whether the delta has reached `threshold` times the base size
    pub fn needs_fold(&self, threshold: f64) -> bool {
        fold_due(self.base.len(), self.delta.len(), threshold)
    }

    /// Whether the two indexes cover exactly the flattened `corpus`
    pub fn covers(&self, corpus: &Corpus) -> bool {
        self.base.offset() == 0
            && self.base.len() == corpus.base().len()
            && self.delta.offset() == self.base.len()
            && self.base.len() + self.delta.len() == corpus.flat_len()
    }

    /// Total indexed tokens, sentinels included
    pub fn len(&self) -> usize {
        self.base.len() + self.delta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fold rule: a non-empty delta of at least `threshold` times the base tokens
pub fn fold_due(base_tokens: usize, delta_tokens: usize, threshold: f64) -> bool {
    delta_tokens > 0 && delta_tokens as f64 >= threshold * base_tokens as f64
}

/// The occurrence set of one phrase, with random access
///
/// Positions are global, so the base and delta halves never overlap.
#[derive(Clone)]
pub struct Occurrences<'a> {
    base: &'a SuffixIndex,
    base_range: Range<usize>,
    delta: &'a SuffixIndex,
    delta_range: Range<usize>,
}

impl<'a> Occurrences<'a> {
    pub fn len(&self) -> usize {
        self.base_range.len() + self.delta_range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `i`-th occurrence: base ranks first, then delta ranks
    pub fn get(&self, i: usize) -> Option<FlatPosition> {
        let in_base = self.base_range.len();
        if i < in_base {
            Some(self.base.suffix(self.base_range.start + i))
        } else if i - in_base < self.delta_range.len() {
            Some(self.delta.suffix(self.delta_range.start + i - in_base))
        } else {
            None
        }
    }

    pub fn iter(&self) -> Chain<Positions<'a>, Positions<'a>> {
        self.base
            .positions_in(self.base_range.clone())
            .chain(self.delta.positions_in(self.delta_range.clone()))
    }

    /// Deterministic stratified sample of at most `cap` occurrences
    ///
    /// With `n` occurrences and `n > cap`, takes every `n / cap`-th one
    /// starting at the first, stopping after `cap`. Otherwise yields all.
    pub fn sample(&self, cap: usize) -> impl Iterator<Item = FlatPosition> + '_ {
        let n = self.len();
        let step = (n / cap.max(1)).max(1);
        (0..n)
            .step_by(step)
            .take(cap)
            .filter_map(move |i| self.get(i))
    }
}
