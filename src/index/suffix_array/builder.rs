//! Suffix array builder
//!
//! Builds the suffix, rank and LCP arrays for one corpus segment:
//! 1. Sort all positions of the flattened token array by the suffix starting there
//! 2. Invert the permutation into the rank array
//! 3. Derive LCP values with Kasai's linear scan
//!
//! Suffix comparison stops at the first sentinel, so no ordering (and no
//! common prefix) ever reaches across a sentence boundary.

use super::reader::SuffixIndex;
use super::types::*;
use crate::error::{Result, TmError};
use crate::index::corpus::CorpusSegment;
use crate::index::types::{SENTINEL, TokenId};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Builder for suffix indexes over corpus segments
#[derive(Debug, Clone, Copy, Default)]
pub struct SuffixArrayBuilder {
    config: SuffixArrayConfig,
}

impl SuffixArrayBuilder {
    /// Create a new suffix array builder with the given configuration
    pub fn new(config: SuffixArrayConfig) -> Self {
        Self { config }
    }

    /// Create a builder with default configuration
    pub fn with_defaults() -> Self {
        Self::new(SuffixArrayConfig::default())
    }

    /// Build the index over a segment's flattened source tokens
    ///
    /// Fails with `ResourceExhausted` if the arrays cannot be allocated.
    pub fn build(&self, segment: Arc<CorpusSegment>) -> Result<SuffixIndex> {
        let started = Instant::now();
        let text = segment.tokens();
        let suffixes = build_suffix_array(text, self.config.parallel_sort_cutoff)?;
        let rank = build_rank(&suffixes)?;
        let lcp = build_lcp(text, &suffixes, &rank)?;

        debug!(
            tokens = text.len(),
            sentences = segment.num_sentences(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built suffix index"
        );

        Ok(SuffixIndex::from_parts(segment, suffixes, rank, lcp))
    }
}

fn alloc<T>(len: usize, tokens: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| TmError::ResourceExhausted { tokens })?;
    Ok(v)
}

/// Sort all positions of `text` by the suffix that starts there
///
/// Time: O(n log n) comparisons, each bounded by the sentence length
fn build_suffix_array(text: &[TokenId], parallel_cutoff: usize) -> Result<Vec<SuffixEntry>> {
    let n = text.len();
    if n > SuffixEntry::MAX as usize {
        return Err(TmError::ResourceExhausted { tokens: n });
    }

    let mut sa = alloc::<SuffixEntry>(n, n)?;
    sa.extend(0..n as SuffixEntry);

    if n > parallel_cutoff {
        sa.par_sort_unstable_by(|&a, &b| compare_suffixes(text, a as usize, b as usize));
    } else {
        sa.sort_unstable_by(|&a, &b| compare_suffixes(text, a as usize, b as usize));
    }

    Ok(sa)
}

/// Compare two suffixes token by token
///
/// The sentinel orders after every real token. Suffixes that agree up to and
/// including a sentinel are ordered by position, which makes this a total
/// order. `text` always ends with a sentinel, so indexing never runs past it.
#[inline]
fn compare_suffixes(text: &[TokenId], a: usize, b: usize) -> Ordering {
    let mut i = 0;
    loop {
        let (x, y) = (text[a + i], text[b + i]);
        if x != y {
            return x.cmp(&y);
        }
        if x == SENTINEL {
            return a.cmp(&b);
        }
        i += 1;
    }
}

/// Inverse permutation: rank[position] = index of position in the suffix array
fn build_rank(sa: &[SuffixEntry]) -> Result<Vec<SuffixEntry>> {
    let mut rank = alloc::<SuffixEntry>(sa.len(), sa.len())?;
    rank.resize(sa.len(), 0);
    for (r, &pos) in sa.iter().enumerate() {
        rank[pos as usize] = r as SuffixEntry;
    }
    Ok(rank)
}

/// Kasai et al. LCP construction, never counting sentinels as shared tokens
///
/// lcp[r] is the common prefix length of the suffixes at ranks r-1 and r;
/// lcp[0] is 0.
fn build_lcp(text: &[TokenId], sa: &[SuffixEntry], rank: &[SuffixEntry]) -> Result<Vec<SuffixEntry>> {
    let n = sa.len();
    let mut lcp = alloc::<SuffixEntry>(n, n)?;
    lcp.resize(n, 0);

    let mut h = 0usize;
    for p in 0..n {
        let r = rank[p] as usize;
        if r == 0 {
            h = 0;
            continue;
        }
        let q = sa[r - 1] as usize;
        while p + h < n && q + h < n && text[p + h] == text[q + h] && text[p + h] != SENTINEL {
            h += 1;
        }
        lcp[r] = h as SuffixEntry;
        h = h.saturating_sub(1);
    }

    Ok(lcp)
}
