//! Scoring for extracted phrase pairs
//!
//! Implements the two per-occurrence measurements the featurizers consume:
//! - lexical weighting from word cooccurrence probabilities
//! - word-based lexicalized reordering (msd-bidirectional-fe)

use crate::index::cooc::LexicalCounts;
use crate::index::corpus::SentencePair;
use crate::index::types::{Link, Span, TokenId};
use serde::{Deserialize, Serialize};

/// Default probability for a word with no rule-internal link
pub const DEFAULT_LEX_FLOOR: f64 = 1e-5;

/// Lexical weights of a phrase pair under one internal alignment
///
/// Each word's value is the mean cooccurrence probability over its links
/// (the floor when it has none); the phrase value is the geometric mean over
/// words. `alignment` positions are relative to `source` and `target`.
pub fn lexical_weights(
    source: &[TokenId],
    target: &[TokenId],
    alignment: &[Link],
    cooc: &impl LexicalCounts,
    floor: f64,
) -> (f64, f64) {
    let target_word = |j: usize| {
        let values = alignment
            .iter()
            .filter(|l| l.target as usize == j)
            .map(|l| cooc.forward_lex(source[l.source as usize], target[j]));
        mean_or(values, floor)
    };
    let source_word = |i: usize| {
        let values = alignment
            .iter()
            .filter(|l| l.source as usize == i)
            .map(|l| cooc.backward_lex(source[i], target[l.target as usize]));
        mean_or(values, floor)
    };

    let forward = geometric_mean(target.len(), target_word, floor);
    let backward = geometric_mean(source.len(), source_word, floor);

    (forward, backward)
}

fn mean_or(values: impl Iterator<Item = f64>, floor: f64) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { floor } else { sum / n as f64 }
}

fn geometric_mean(len: usize, word: impl Fn(usize) -> f64, floor: f64) -> f64 {
    if len == 0 {
        return floor;
    }
    let log_sum: f64 = (0..len).map(|k| word(k).max(floor).ln()).sum();
    (log_sum / len as f64).exp()
}

/// Alignment links inside the box `source_span` x `target_span`,
/// shifted to be relative to the spans
pub fn internal_alignment(pair: &SentencePair, source_span: Span, target_span: Span) -> Vec<Link> {
    let mut links = Vec::new();
    for i in source_span.start..source_span.end {
        for j in pair.alignment().targets_of(i) {
            if target_span.contains(j) {
                links.push(Link::new(
                    (i - source_span.start) as u32,
                    (j - target_span.start) as u32,
                ));
            }
        }
    }
    links
}

/// Lexicalized reordering class of a phrase pair relative to a neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Monotone,
    Swap,
    Discontinuous,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Monotone,
        Orientation::Swap,
        Orientation::Discontinuous,
    ];

    /// One-letter tag used in feature names
    pub fn tag(self) -> &'static str {
        match self {
            Orientation::Monotone => "M",
            Orientation::Swap => "S",
            Orientation::Discontinuous => "D",
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    fn classify(monotone: bool, swap: bool) -> Self {
        match (monotone, swap) {
            (true, false) => Orientation::Monotone,
            (false, true) => Orientation::Swap,
            _ => Orientation::Discontinuous,
        }
    }
}

/// Forward (with the previous phrase) and backward (with the next phrase)
/// orientation of the phrase pair at `source_span` / `target_span`
pub fn orientation(pair: &SentencePair, source_span: Span, target_span: Span) -> (Orientation, Orientation) {
    let f1 = source_span.start as isize - 1;
    let f2 = source_span.end as isize;
    let e1 = target_span.start as isize - 1;
    let e2 = target_span.end as isize;

    let forward = Orientation::classify(
        is_phrase_aligned(pair, e1, f1),
        is_phrase_aligned(pair, e1, f2),
    );
    let backward = Orientation::classify(
        is_phrase_aligned(pair, e2, f2),
        is_phrase_aligned(pair, e2, f1),
    );
    (forward, backward)
}

/// Whether source word `f` links to target word `e`, treating the virtual
/// positions before the start and after the end of both sentences as aligned
/// to each other
fn is_phrase_aligned(pair: &SentencePair, e: isize, f: isize) -> bool {
    let (src_len, tgt_len) = (pair.source_len() as isize, pair.target_len() as isize);
    if e == -1 || f == -1 {
        return e == -1 && f == -1;
    }
    if e == tgt_len || f == src_len {
        return e == tgt_len && f == src_len;
    }
    pair.alignment().is_linked(f as usize, e as usize)
}

/// Orientation tallies for one phrase pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrientationCounts {
    pub forward: [u32; 3],
    pub backward: [u32; 3],
}

impl OrientationCounts {
    pub fn record(&mut self, forward: Orientation, backward: Orientation) {
        self.forward[forward.index()] += 1;
        self.backward[backward.index()] += 1;
    }

    pub fn forward(&self, o: Orientation) -> u32 {
        self.forward[o.index()]
    }

    pub fn backward(&self, o: Orientation) -> u32 {
        self.backward[o.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::cooc::CoocCounts;

    fn pair(src: &[u32], tgt: &[u32], links: &[(u32, u32)]) -> SentencePair {
        SentencePair::new(src.to_vec(), tgt.to_vec(), links.iter().copied()).unwrap()
    }

    #[test]
    fn test_lexical_weights_full_alignment() {
        let mut cooc = CoocCounts::default();
        cooc.observe(1, 10);
        cooc.observe(1, 11);
        cooc.observe(2, 11);

        let links = [Link::new(0, 0), Link::new(1, 0)];
        let (fwd, bwd) = lexical_weights(&[1, 2], &[11], &links, &cooc, DEFAULT_LEX_FLOOR);
        // Target word 11: mean(p(11|1) = 0.5, p(11|2) = 1.0)
        assert!((fwd - 0.75).abs() < 1e-12);
        // Source words: p(1|11) = 0.5, p(2|11) = 0.5
        assert!((bwd - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_lexical_weights_unaligned_word_floor() {
        let mut cooc = CoocCounts::default();
        cooc.observe(1, 10);

        let links = [Link::new(0, 0)];
        let (fwd, bwd) = lexical_weights(&[1, 2], &[10], &links, &cooc, 1e-4);
        assert!((fwd - 1.0).abs() < 1e-12);
        // sqrt(1.0 * 1e-4)
        assert!((bwd - 1e-2).abs() < 1e-12);
    }

    #[test]
    fn test_internal_alignment_drops_outside_links() {
        // Target 1 also links to source 0, which is outside the phrase
        let p = pair(&[1, 2, 3], &[4, 5], &[(0, 1), (1, 1), (2, 0)]);
        let links = internal_alignment(&p, Span::new(1, 3), Span::new(0, 2));
        assert_eq!(links, vec![Link::new(0, 1), Link::new(1, 0)]);
    }

    #[test]
    fn test_orientation_monotone_diagonal() {
        let p = pair(&[1, 2, 3], &[4, 5, 6], &[(0, 0), (1, 1), (2, 2)]);
        let (fwd, bwd) = orientation(&p, Span::new(1, 2), Span::new(1, 2));
        assert_eq!(fwd, Orientation::Monotone);
        assert_eq!(bwd, Orientation::Monotone);
    }

    #[test]
    fn test_orientation_swap() {
        // a b -> y x
        let p = pair(&[1, 2], &[4, 5], &[(0, 1), (1, 0)]);

        // b -> y starts the target but not the source
        let (fwd, bwd) = orientation(&p, Span::new(1, 2), Span::new(0, 1));
        assert_eq!(fwd, Orientation::Discontinuous);
        assert_eq!(bwd, Orientation::Swap);

        let (fwd, bwd) = orientation(&p, Span::new(0, 1), Span::new(1, 2));
        assert_eq!(fwd, Orientation::Swap);
        assert_eq!(bwd, Orientation::Discontinuous);
    }

    #[test]
    fn test_orientation_discontinuous() {
        let p = pair(&[1, 2, 3, 4], &[5, 6, 7, 8], &[(0, 2), (1, 0), (2, 3), (3, 1)]);
        let (fwd, _) = orientation(&p, Span::new(2, 3), Span::new(3, 4));
        assert_eq!(fwd, Orientation::Discontinuous);
    }

    #[test]
    fn test_orientation_sentence_edges() {
        let p = pair(&[1, 2], &[3, 4], &[(0, 0), (1, 1)]);
        let (fwd, bwd) = orientation(&p, Span::new(0, 2), Span::new(0, 2));
        assert_eq!(fwd, Orientation::Monotone);
        assert_eq!(bwd, Orientation::Monotone);
    }

    #[test]
    fn test_orientation_counts() {
        let mut counts = OrientationCounts::default();
        counts.record(Orientation::Monotone, Orientation::Swap);
        counts.record(Orientation::Monotone, Orientation::Discontinuous);
        assert_eq!(counts.forward(Orientation::Monotone), 2);
        assert_eq!(counts.backward(Orientation::Swap), 1);
        assert_eq!(counts.backward(Orientation::Monotone), 0);
    }
}
