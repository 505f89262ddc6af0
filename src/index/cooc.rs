//! Word cooccurrence counts for lexical weighting
//!
//! Every alignment link (s, t) bumps the joint count of the pair and the
//! marginals of both words. Three containers share that bookkeeping:
//! - [`CoocCounts`]: plain tables, owned by one thread
//! - [`CoocLayers`]: a shared base plus a copy-on-write delta, versioned
//!   together with a model snapshot
//! - [`CoocTable`]: a standalone table sharded by source word for
//!   concurrent observers
//!
//! In each of them `src_marginal(s) == Σ_t joint(s, t)` (and the target-side
//! equivalent) holds for every consistent view.

use crate::index::corpus::{Corpus, SentencePair};
use crate::index::types::TokenId;
use parking_lot::{RwLock, RwLockReadGuard};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Sentence pairs counted per rayon task during bulk builds
const BULK_CHUNK: usize = 4096;

/// Lock shards of a [`CoocTable`]
const SHARDS: usize = 16;

/// Read access to joint and marginal counts
pub trait LexicalCounts {
    fn joint_count(&self, s: TokenId, t: TokenId) -> u64;

    fn src_marginal(&self, s: TokenId) -> u64;

    fn tgt_marginal(&self, t: TokenId) -> u64;

    /// p(t | s) = joint(s, t) / marginal(s), with 0/0 = 0
    fn forward_lex(&self, s: TokenId, t: TokenId) -> f64 {
        ratio(self.joint_count(s, t), self.src_marginal(s))
    }

    /// p(s | t) = joint(s, t) / marginal(t), with 0/0 = 0
    fn backward_lex(&self, s: TokenId, t: TokenId) -> f64 {
        ratio(self.joint_count(s, t), self.tgt_marginal(t))
    }
}

#[inline]
fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Plain count tables
#[derive(Debug, Clone, Default)]
pub struct CoocCounts {
    joint: FxHashMap<(TokenId, TokenId), u64>,
    source: FxHashMap<TokenId, u64>,
    target: FxHashMap<TokenId, u64>,
}

impl CoocCounts {
    /// Count every link in `corpus`, in parallel
    pub fn from_corpus(corpus: &Corpus) -> Self {
        let pairs: Vec<&SentencePair> = corpus.iter().collect();
        pairs
            .par_chunks(BULK_CHUNK)
            .map(|chunk| {
                let mut counts = CoocCounts::default();
                for pair in chunk {
                    counts.observe_pair(pair);
                }
                counts
            })
            .reduce(CoocCounts::default, |mut a, b| {
                a.absorb(b);
                a
            })
    }

    /// Count one cooccurrence of `s` with `t`
    pub fn observe(&mut self, s: TokenId, t: TokenId) {
        *self.joint.entry((s, t)).or_insert(0) += 1;
        *self.source.entry(s).or_insert(0) += 1;
        *self.target.entry(t).or_insert(0) += 1;
    }

    /// Count every alignment link of `pair`
    pub fn observe_pair(&mut self, pair: &SentencePair) {
        for (s, t) in linked_words(pair) {
            self.observe(s, t);
        }
    }

    /// Add all counts of `other` into `self`
    pub fn absorb(&mut self, other: CoocCounts) {
        for (key, n) in other.joint {
            *self.joint.entry(key).or_insert(0) += n;
        }
        for (key, n) in other.source {
            *self.source.entry(key).or_insert(0) += n;
        }
        for (key, n) in other.target {
            *self.target.entry(key).or_insert(0) += n;
        }
    }

    /// Number of distinct (source, target) pairs
    pub fn len(&self) -> usize {
        self.joint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joint.is_empty()
    }

    /// Iterate (source, target, joint count) in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, TokenId, u64)> + '_ {
        self.joint.iter().map(|(&(s, t), &n)| (s, t, n))
    }

    fn contains(&self, s: TokenId, t: TokenId) -> bool {
        self.joint.contains_key(&(s, t))
    }
}

impl LexicalCounts for CoocCounts {
    fn joint_count(&self, s: TokenId, t: TokenId) -> u64 {
        self.joint.get(&(s, t)).copied().unwrap_or(0)
    }

    fn src_marginal(&self, s: TokenId) -> u64 {
        self.source.get(&s).copied().unwrap_or(0)
    }

    fn tgt_marginal(&self, t: TokenId) -> u64 {
        self.target.get(&t).copied().unwrap_or(0)
    }
}

/// (source word, target word) of every link in `pair`
fn linked_words(pair: &SentencePair) -> impl Iterator<Item = (TokenId, TokenId)> + '_ {
    let (source, target) = (pair.source(), pair.target());
    pair.alignment()
        .links()
        .iter()
        .map(move |link| (source[link.source as usize], target[link.target as usize]))
}

/// Counts split like the corpus: a shared base and a small delta
///
/// Cloning is two reference count bumps. Observing copies the delta if
/// another clone still holds it, so a published clone never changes.
#[derive(Debug, Clone, Default)]
pub struct CoocLayers {
    base: Arc<CoocCounts>,
    delta: Arc<CoocCounts>,
}

impl CoocLayers {
    /// Count every link in `corpus` into the base layer
    pub fn from_corpus(corpus: &Corpus) -> Self {
        Self {
            base: Arc::new(CoocCounts::from_corpus(corpus)),
            delta: Arc::default(),
        }
    }

    /// Count every link of `pair` into the delta layer
    pub fn observe_pair(&mut self, pair: &SentencePair) {
        Arc::make_mut(&mut self.delta).observe_pair(pair);
    }

    /// Move the delta counts into the base layer
    pub fn fold(&mut self) {
        let delta = Arc::unwrap_or_clone(std::mem::take(&mut self.delta));
        if !delta.is_empty() {
            Arc::make_mut(&mut self.base).absorb(delta);
        }
    }

    /// Distinct (source, target) pairs across both layers
    pub fn len(&self) -> usize {
        let delta_only = self
            .delta
            .iter()
            .filter(|&(s, t, _)| !self.base.contains(s, t))
            .count();
        self.base.len() + delta_only
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.delta.is_empty()
    }

    /// Distinct pairs counted in the delta layer
    pub fn delta_len(&self) -> usize {
        self.delta.len()
    }

    /// Iterate (source, target, joint count) with both layers summed
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, TokenId, u64)> + '_ {
        let base = self
            .base
            .iter()
            .map(|(s, t, n)| (s, t, n + self.delta.joint_count(s, t)));
        let delta_only = self.delta.iter().filter(|&(s, t, _)| !self.base.contains(s, t));
        base.chain(delta_only)
    }
}

impl LexicalCounts for CoocLayers {
    fn joint_count(&self, s: TokenId, t: TokenId) -> u64 {
        self.base.joint_count(s, t) + self.delta.joint_count(s, t)
    }

    fn src_marginal(&self, s: TokenId) -> u64 {
        self.base.src_marginal(s) + self.delta.src_marginal(s)
    }

    fn tgt_marginal(&self, t: TokenId) -> u64 {
        self.base.tgt_marginal(t) + self.delta.tgt_marginal(t)
    }
}

/// Cooccurrence table shared between threads
///
/// Shard `i` owns every joint count whose source word maps to `i`, that
/// word's marginal, and the target marginal contributions of those joints.
/// Observers on different source words take different locks.
#[derive(Debug)]
pub struct CoocTable {
    shards: Box<[RwLock<CoocCounts>]>,
}

impl Default for CoocTable {
    fn default() -> Self {
        Self::from_shards((0..SHARDS).map(|_| CoocCounts::default()).collect())
    }
}

#[inline]
fn shard_of(s: TokenId) -> usize {
    // Ids are dense, so a modulus spreads them evenly
    s as usize % SHARDS
}

impl CoocTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_shards(shards: Vec<CoocCounts>) -> Self {
        Self {
            shards: shards.into_iter().map(RwLock::new).collect(),
        }
    }

    /// Count every link in `corpus`, in parallel
    pub fn from_corpus(corpus: &Corpus) -> Self {
        let empty = || (0..SHARDS).map(|_| CoocCounts::default()).collect::<Vec<_>>();
        let pairs: Vec<&SentencePair> = corpus.iter().collect();
        let shards = pairs
            .par_chunks(BULK_CHUNK)
            .map(|chunk| {
                let mut shards = empty();
                for (s, t) in chunk.iter().flat_map(|pair| linked_words(pair)) {
                    shards[shard_of(s)].observe(s, t);
                }
                shards
            })
            .reduce(empty, |mut a, b| {
                for (into, from) in a.iter_mut().zip(b) {
                    into.absorb(from);
                }
                a
            });
        Self::from_shards(shards)
    }

    /// Increment joint(s, t) and both marginals together
    pub fn observe(&self, s: TokenId, t: TokenId) {
        self.shards[shard_of(s)].write().observe(s, t);
    }

    /// Count every link of `pair`
    ///
    /// The shards the pair touches are locked in ascending order and held
    /// until every link is counted, so a [`CoocView`] sees all of the pair
    /// or none of it.
    pub fn observe_pair(&self, pair: &SentencePair) {
        let mut touched = [false; SHARDS];
        for (s, _) in linked_words(pair) {
            touched[shard_of(s)] = true;
        }
        let mut guards: [_; SHARDS] =
            std::array::from_fn(|i| touched[i].then(|| self.shards[i].write()));
        for (s, t) in linked_words(pair) {
            if let Some(shard) = guards[shard_of(s)].as_mut() {
                shard.observe(s, t);
            }
        }
    }

    /// Shared guard over every shard: lookups through it see one state
    pub fn read(&self) -> CoocView<'_> {
        CoocView {
            shards: self.shards.iter().map(|shard| shard.read()).collect(),
        }
    }

    pub fn joint_count(&self, s: TokenId, t: TokenId) -> u64 {
        self.shards[shard_of(s)].read().joint_count(s, t)
    }

    pub fn src_marginal(&self, s: TokenId) -> u64 {
        self.shards[shard_of(s)].read().src_marginal(s)
    }

    pub fn tgt_marginal(&self, t: TokenId) -> u64 {
        self.read().tgt_marginal(t)
    }

    pub fn forward_lex(&self, s: TokenId, t: TokenId) -> f64 {
        self.shards[shard_of(s)].read().forward_lex(s, t)
    }

    pub fn backward_lex(&self, s: TokenId, t: TokenId) -> f64 {
        self.read().backward_lex(s, t)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

/// Read guards on every shard of a [`CoocTable`]
pub struct CoocView<'a> {
    shards: Vec<RwLockReadGuard<'a, CoocCounts>>,
}

impl CoocView<'_> {
    /// Source words are disjoint across shards, so joint pairs are too
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (TokenId, TokenId, u64)> + '_ {
        self.shards.iter().flat_map(|shard| shard.iter())
    }
}

impl LexicalCounts for CoocView<'_> {
    fn joint_count(&self, s: TokenId, t: TokenId) -> u64 {
        self.shards[shard_of(s)].joint_count(s, t)
    }

    fn src_marginal(&self, s: TokenId) -> u64 {
        self.shards[shard_of(s)].src_marginal(s)
    }

    fn tgt_marginal(&self, t: TokenId) -> u64 {
        self.shards.iter().map(|shard| shard.tgt_marginal(t)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Barrier;

    fn assert_marginals_consistent<C: LexicalCounts>(
        counts: &C,
        joints: impl Iterator<Item = (TokenId, TokenId, u64)>,
    ) {
        let mut src: HashMap<TokenId, u64> = HashMap::new();
        let mut tgt: HashMap<TokenId, u64> = HashMap::new();
        for (s, t, n) in joints {
            assert_eq!(counts.joint_count(s, t), n);
            *src.entry(s).or_default() += n;
            *tgt.entry(t).or_default() += n;
        }
        for (s, n) in src {
            assert_eq!(counts.src_marginal(s), n);
        }
        for (t, n) in tgt {
            assert_eq!(counts.tgt_marginal(t), n);
        }
    }

    fn sample_pairs() -> Vec<SentencePair> {
        vec![
            SentencePair::new(vec![1, 2, 3], vec![7, 8], [(0u32, 0u32), (1, 1), (2, 1)]).unwrap(),
            SentencePair::new(vec![2, 2], vec![8], [(0u32, 0u32), (1, 0)]).unwrap(),
            SentencePair::new(vec![4], vec![9], Vec::<(u32, u32)>::new()).unwrap(),
            SentencePair::new(vec![19, 3], vec![8, 7], [(0u32, 0u32), (1, 1)]).unwrap(),
        ]
    }

    #[test]
    fn test_add_cooc() {
        let table = CoocTable::new();
        table.observe(1, 2);
        table.observe(3, 2);

        assert_eq!(table.joint_count(1, 2), 1);
        assert_eq!(table.joint_count(0, 2), 0);
        assert_eq!(table.src_marginal(1), 1);
        assert_eq!(table.tgt_marginal(2), 2);
    }

    #[test]
    fn test_unseen_keys_are_zero() {
        let table = CoocTable::new();
        assert_eq!(table.joint_count(9, 9), 0);
        assert_eq!(table.src_marginal(9), 0);
        assert_eq!(table.tgt_marginal(9), 0);
        assert_eq!(table.forward_lex(9, 9), 0.0);
        assert_eq!(table.backward_lex(9, 9), 0.0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_lexical_ratios() {
        let table = CoocTable::new();
        table.observe(1, 10);
        table.observe(1, 10);
        table.observe(1, 11);
        table.observe(2, 10);

        assert!((table.forward_lex(1, 10) - 2.0 / 3.0).abs() < 1e-12);
        assert!((table.backward_lex(1, 10) - 2.0 / 3.0).abs() < 1e-12);
        assert!((table.backward_lex(2, 10) - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(table.forward_lex(2, 11), 0.0);
    }

    #[test]
    fn test_target_marginal_spans_shards() {
        let table = CoocTable::new();
        // 3 and 19 land in different shards
        table.observe(3, 7);
        table.observe(19, 7);
        assert_eq!(table.tgt_marginal(7), 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_observe_pair_and_bulk_build_agree() {
        let pairs = sample_pairs();
        let incremental = CoocTable::new();
        for pair in &pairs {
            incremental.observe_pair(pair);
        }
        let corpus = Corpus::from_pairs(pairs);
        let bulk = CoocTable::from_corpus(&corpus);
        let plain = CoocCounts::from_corpus(&corpus);

        for s in 0..20 {
            for t in 6..10 {
                assert_eq!(incremental.joint_count(s, t), bulk.joint_count(s, t));
                assert_eq!(plain.joint_count(s, t), bulk.joint_count(s, t));
            }
        }
        assert_eq!(bulk.joint_count(2, 8), 3);
        assert_eq!(bulk.len(), plain.len());
        let view = bulk.read();
        assert_marginals_consistent(&view, view.iter());
    }

    #[test]
    fn test_layers_sum_base_and_delta() {
        let mut pairs = sample_pairs();
        let last = pairs.pop().unwrap();
        let mut layers = CoocLayers::from_corpus(&Corpus::from_pairs(pairs));
        let published = layers.clone();

        layers.observe_pair(&last);
        assert_eq!(layers.joint_count(3, 7), 1);
        assert_eq!(layers.tgt_marginal(8), 5);
        assert_eq!(layers.delta_len(), 2);
        // (19, 8) and (3, 7) are both new
        assert_eq!(layers.len(), published.len() + 2);
        assert_marginals_consistent(&layers, layers.iter());

        // A clone taken before the observation is unchanged
        assert_eq!(published.joint_count(3, 7), 0);
        assert_eq!(published.tgt_marginal(8), 4);
    }

    #[test]
    fn test_layers_fold_keeps_counts() {
        let pairs = sample_pairs();
        let bulk = CoocCounts::from_corpus(&Corpus::from_pairs(pairs.clone()));
        let mut layers = CoocLayers::default();
        for pair in &pairs {
            layers.observe_pair(pair);
        }
        let before: Vec<_> = {
            let mut v: Vec<_> = layers.iter().collect();
            v.sort_unstable();
            v
        };
        layers.fold();
        assert_eq!(layers.delta_len(), 0);

        let mut after: Vec<_> = layers.iter().collect();
        after.sort_unstable();
        assert_eq!(before, after);
        assert_eq!(layers.len(), bulk.len());
        assert_marginals_consistent(&layers, bulk.iter());
    }

    #[test]
    fn test_concurrent_observers() {
        let table = Arc::new(CoocTable::new());
        let handles: Vec<_> = (0..8u32)
            .map(|thread| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    for i in 0..500u32 {
                        table.observe(i % 7, thread % 3);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let view = table.read();
        let total: u64 = view.iter().map(|(_, _, n)| n).sum();
        assert_eq!(total, 8 * 500);
        assert_marginals_consistent(&view, view.iter());
    }

    #[test]
    fn test_observers_on_other_shards_do_not_wait() {
        let table = Arc::new(CoocTable::new());
        let barrier = Arc::new(Barrier::new(2));

        // Hold shard 0 for writing while another thread observes shard 1
        let held = table.shards[shard_of(0)].write();
        let observer = {
            let table = Arc::clone(&table);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                table.observe(1, 5);
                barrier.wait();
            })
        };
        barrier.wait();
        drop(held);
        observer.join().unwrap();

        assert_eq!(table.joint_count(1, 5), 1);
    }
}
