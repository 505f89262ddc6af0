//! Suffix index queries
//!
//! Provides O(m log n) range search over one corpus segment. Every position
//! returned is global: the segment's first flat position is added back.

use super::builder::SuffixArrayBuilder;
use super::types::*;
use crate::error::Result;
use crate::index::corpus::CorpusSegment;
use crate::index::types::{FlatPosition, SENTINEL, TokenId};
use std::cmp::Ordering;
use std::iter::FusedIterator;
use std::ops::Range;
use std::sync::Arc;

/// Immutable suffix, rank and LCP arrays over one corpus segment
pub struct SuffixIndex {
    segment: Arc<CorpusSegment>,
    suffixes: Vec<SuffixEntry>,
    rank: Vec<SuffixEntry>,
    lcp: Vec<SuffixEntry>,
}

impl SuffixIndex {
    pub(super) fn from_parts(
        segment: Arc<CorpusSegment>,
        suffixes: Vec<SuffixEntry>,
        rank: Vec<SuffixEntry>,
        lcp: Vec<SuffixEntry>,
    ) -> Self {
        debug_assert_eq!(suffixes.len(), segment.len());
        Self {
            segment,
            suffixes,
            rank,
            lcp,
        }
    }

    /// Build an index over `segment`
    pub fn build(segment: Arc<CorpusSegment>, config: SuffixArrayConfig) -> Result<Self> {
        SuffixArrayBuilder::new(config).build(segment)
    }

    /// The segment this index was built from
    pub fn segment(&self) -> &Arc<CorpusSegment> {
        &self.segment
    }

    #[inline]
    fn text(&self) -> &[TokenId] {
        self.segment.tokens()
    }

    /// Number of suffixes (equals the flattened token count)
    pub fn len(&self) -> usize {
        self.suffixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    /// Global flat position of the first indexed token
    pub fn offset(&self) -> FlatPosition {
        self.segment.first_position()
    }

    /// Global start position of the suffix at `rank`
    #[inline]
    pub fn suffix(&self, rank: usize) -> FlatPosition {
        self.offset() + self.suffixes[rank] as usize
    }

    /// Rank of the suffix starting at global `position`, if it is indexed here
    pub fn rank(&self, position: FlatPosition) -> Option<usize> {
        let local = position.checked_sub(self.offset())?;
        self.rank.get(local).map(|&r| r as usize)
    }

    /// Common prefix length between the suffixes at `rank - 1` and `rank`
    pub fn lcp(&self, rank: usize) -> usize {
        self.lcp[rank] as usize
    }

    /// Rank interval `[lo, hi)` of all suffixes that begin with `query`
    ///
    /// Empty when nothing matches. Empty queries and queries containing the
    /// sentinel match nothing.
    pub fn range_for(&self, query: &[TokenId]) -> Range<usize> {
        if query.is_empty() || query.contains(&SENTINEL) || self.is_empty() {
            return 0..0;
        }

        let lo = self.lower_bound(query);
        if lo == self.len() || self.compare_at(lo, query, 0).0 != Ordering::Equal {
            return lo..lo;
        }
        let hi = self.upper_bound(query, lo);
        lo..hi
    }

    /// First rank whose suffix does not sort before `query`
    ///
    /// Tracks how much of the query is already known to match at both search
    /// bounds; every suffix between them shares at least the smaller of the
    /// two, so comparisons resume from there.
    fn lower_bound(&self, query: &[TokenId]) -> usize {
        let (mut lo, mut hi) = (0, self.len());
        let (mut llcp, mut rlcp) = (0, 0);

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (ord, matched) = self.compare_at(mid, query, llcp.min(rlcp));
            if ord == Ordering::Less {
                lo = mid + 1;
                llcp = matched;
            } else {
                hi = mid;
                rlcp = matched;
            }
        }

        lo
    }

    /// First rank at or after `lo` whose suffix does not begin with `query`
    ///
    /// `lo` must match. Short ranges are walked through the LCP array; longer
    /// ones fall back to the same bounded binary search as `lower_bound`.
    fn upper_bound(&self, query: &[TokenId], lo: usize) -> usize {
        let m = query.len();
        let n = self.len();

        let mut r = lo + 1;
        for _ in 0..LCP_LINEAR_PROBE {
            if r >= n || self.lcp(r) < m {
                return r;
            }
            r += 1;
        }

        let (mut lo, mut hi) = (r, n);
        let (mut llcp, mut rlcp) = (m, 0);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (ord, matched) = self.compare_at(mid, query, llcp.min(rlcp));
            if ord == Ordering::Greater {
                hi = mid;
                rlcp = matched;
            } else {
                lo = mid + 1;
                llcp = matched;
            }
        }

        lo
    }

    /// Compare the suffix at `rank`, truncated to the query length, with `query`
    ///
    /// The first `skip` tokens are known to match. Returns the ordering and
    /// the number of leading tokens that matched.
    #[inline]
    fn compare_at(&self, rank: usize, query: &[TokenId], skip: usize) -> (Ordering, usize) {
        let text = self.text();
        let pos = self.suffixes[rank] as usize;
        for (k, &q) in query.iter().enumerate().skip(skip) {
            // A sentinel never equals a query token and sorts after all of them
            let t = text[pos + k];
            if t != q {
                return (t.cmp(&q), k);
            }
        }
        (Ordering::Equal, query.len())
    }

    /// Lazy global start positions for the ranks in `range`
    ///
    /// The iterator is `Clone`, so it can be replayed without touching the index.
    pub fn positions_in(&self, range: Range<usize>) -> Positions<'_> {
        let end = range.end.min(self.len());
        Positions {
            suffixes: &self.suffixes,
            offset: self.offset(),
            next: range.start.min(end),
            end,
        }
    }

    /// Number of occurrences of `query`
    pub fn count(&self, query: &[TokenId]) -> usize {
        self.range_for(query).len()
    }

    /// Check if `query` occurs in this segment
    pub fn contains(&self, query: &[TokenId]) -> bool {
        !self.range_for(query).is_empty()
    }

    /// Get statistics about this suffix index
    pub fn stats(&self) -> SuffixIndexStats {
        SuffixIndexStats {
            tokens: self.len(),
            sentences: self.segment.num_sentences(),
            first_position: self.offset(),
        }
    }
}

/// Iterator over global positions for a rank interval
#[derive(Debug, Clone)]
pub struct Positions<'a> {
    suffixes: &'a [SuffixEntry],
    offset: FlatPosition,
    next: usize,
    end: usize,
}

impl Iterator for Positions<'_> {
    type Item = FlatPosition;

    fn next(&mut self) -> Option<FlatPosition> {
        if self.next >= self.end {
            return None;
        }
        let pos = self.offset + self.suffixes[self.next] as usize;
        self.next += 1;
        Some(pos)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Positions<'_> {}

impl FusedIterator for Positions<'_> {}
