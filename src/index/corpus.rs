//! Append-only parallel corpus
//!
//! Sentence pairs live in two generational segments:
//! - `base`: everything covered by the last full suffix-array build
//! - `delta`: pairs appended since then
//!
//! Both segments are reference counted so a published snapshot shares them
//! with the writer. Appending copies at most the delta segment, and
//! [`Corpus::fold`] merges delta into a fresh base.
//!
//! Each segment keeps its source tokens flattened with a [`SENTINEL`] after
//! every sentence. Flat positions are global: the delta segment starts where
//! the base segment ends.

use crate::error::{Result, TmError};
use crate::index::types::{FlatPosition, Link, SENTINEL, SentenceId, Span, TokenId};
use std::sync::Arc;

/// Word alignment of one sentence pair
///
/// Links are deduplicated and kept sorted twice: by source position for
/// source-to-target lookups and by target position for the reverse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alignment {
    by_source: Vec<Link>,
    by_target: Vec<Link>,
}

impl Alignment {
    /// Validate `links` against the sentence lengths and index them
    pub fn new<I, L>(links: I, source_len: usize, target_len: usize) -> Result<Self>
    where
        I: IntoIterator<Item = L>,
        L: Into<Link>,
    {
        let mut by_source: Vec<Link> = Vec::new();
        for link in links {
            let link = link.into();
            if link.source as usize >= source_len || link.target as usize >= target_len {
                return Err(TmError::InvalidAlignment {
                    source_pos: link.source as usize,
                    target_pos: link.target as usize,
                    source_len,
                    target_len,
                });
            }
            by_source.push(link);
        }
        by_source.sort_unstable();
        by_source.dedup();

        let mut by_target = by_source.clone();
        by_target.sort_unstable_by_key(|l| (l.target, l.source));

        Ok(Self {
            by_source,
            by_target,
        })
    }

    /// Links in (source, target) order
    pub fn links(&self) -> &[Link] {
        &self.by_source
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }

    /// Target positions linked to source position `i`, ascending
    pub fn targets_of(&self, i: usize) -> impl Iterator<Item = usize> + '_ {
        let i = i as u32;
        let lo = self.by_source.partition_point(|l| l.source < i);
        let hi = self.by_source.partition_point(|l| l.source <= i);
        self.by_source[lo..hi].iter().map(|l| l.target as usize)
    }

    /// Source positions linked to target position `j`, ascending
    pub fn sources_of(&self, j: usize) -> impl Iterator<Item = usize> + '_ {
        let j = j as u32;
        let lo = self.by_target.partition_point(|l| l.target < j);
        let hi = self.by_target.partition_point(|l| l.target <= j);
        self.by_target[lo..hi].iter().map(|l| l.source as usize)
    }

    pub fn is_linked(&self, i: usize, j: usize) -> bool {
        self.by_source
            .binary_search(&Link::new(i as u32, j as u32))
            .is_ok()
    }
}

/// One aligned sentence pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentencePair {
    source: Vec<TokenId>,
    target: Vec<TokenId>,
    alignment: Alignment,
}

impl SentencePair {
    /// Validate and build a sentence pair
    ///
    /// Fails with `InvalidAlignment` for out-of-bounds links and with
    /// `InvalidSentencePair` for empty sides or reserved token ids.
    pub fn new<I, L>(source: Vec<TokenId>, target: Vec<TokenId>, links: I) -> Result<Self>
    where
        I: IntoIterator<Item = L>,
        L: Into<Link>,
    {
        if source.is_empty() || target.is_empty() {
            return Err(TmError::InvalidSentencePair {
                reason: format!(
                    "empty side (source {} tokens, target {} tokens)",
                    source.len(),
                    target.len()
                ),
            });
        }
        if source.contains(&SENTINEL) || target.contains(&SENTINEL) {
            return Err(TmError::InvalidSentencePair {
                reason: "reserved sentinel token id".to_string(),
            });
        }
        let alignment = Alignment::new(links, source.len(), target.len())?;
        Ok(Self {
            source,
            target,
            alignment,
        })
    }

    pub fn source(&self) -> &[TokenId] {
        &self.source
    }

    pub fn target(&self) -> &[TokenId] {
        &self.target
    }

    pub fn alignment(&self) -> &Alignment {
        &self.alignment
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn target_len(&self) -> usize {
        self.target.len()
    }

    /// Closed target span covering every target position linked to `span`
    ///
    /// Runs from the minimum to the maximum linked target position, gaps
    /// included. `None` when no source position in `span` has a link.
    pub fn aligned_target_span(&self, span: Span) -> Option<Span> {
        let mut bounds: Option<(usize, usize)> = None;
        for i in span.start..span.end.min(self.source.len()) {
            for j in self.alignment.targets_of(i) {
                bounds = Some(match bounds {
                    Some((lo, hi)) => (lo.min(j), hi.max(j)),
                    None => (j, j),
                });
            }
        }
        bounds.map(|(lo, hi)| Span::new(lo, hi + 1))
    }

    /// Number of times `phrase` occurs in the target side
    pub fn count_target(&self, phrase: &[TokenId]) -> usize {
        if phrase.is_empty() || phrase.len() > self.target.len() {
            return 0;
        }
        self.target.windows(phrase.len()).filter(|w| *w == phrase).count()
    }
}

/// A contiguous run of sentence pairs with their flattened source tokens
#[derive(Debug, Clone, Default)]
pub struct CorpusSegment {
    first_sentence: SentenceId,
    first_position: FlatPosition,
    sentences: Vec<Arc<SentencePair>>,
    /// Source tokens with a sentinel after every sentence
    tokens: Vec<TokenId>,
    /// Local flat offset of each sentence's first token
    starts: Vec<usize>,
}

impl CorpusSegment {
    fn empty_at(first_sentence: SentenceId, first_position: FlatPosition) -> Self {
        Self {
            first_sentence,
            first_position,
            ..Default::default()
        }
    }

    fn push(&mut self, pair: Arc<SentencePair>) {
        self.starts.push(self.tokens.len());
        self.tokens.extend_from_slice(pair.source());
        self.tokens.push(SENTINEL);
        self.sentences.push(pair);
    }

    /// Global flat position of this segment's first token
    pub fn first_position(&self) -> FlatPosition {
        self.first_position
    }

    /// Corpus-wide id of this segment's first sentence
    pub fn first_sentence(&self) -> SentenceId {
        self.first_sentence
    }

    /// Flattened source tokens, sentinels included
    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    pub fn num_sentences(&self) -> usize {
        self.sentences.len()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn resolve_local(&self, local: usize) -> Option<(SentenceId, usize)> {
        if local >= self.tokens.len() {
            return None;
        }
        let idx = self.starts.partition_point(|&s| s <= local).checked_sub(1)?;
        let offset = local - self.starts[idx];
        if offset >= self.sentences[idx].source_len() {
            // Sentinel
            return None;
        }
        Some((self.first_sentence + idx, offset))
    }
}

/// The parallel corpus, split into base and delta generations
#[derive(Debug, Clone)]
pub struct Corpus {
    base: Arc<CorpusSegment>,
    delta: Arc<CorpusSegment>,
}

impl Default for Corpus {
    fn default() -> Self {
        Self::new()
    }
}

impl Corpus {
    pub fn new() -> Self {
        Self {
            base: Arc::new(CorpusSegment::empty_at(0, 0)),
            delta: Arc::new(CorpusSegment::empty_at(0, 0)),
        }
    }

    /// Build a corpus whose pairs all live in the base segment
    pub fn from_pairs<I: IntoIterator<Item = SentencePair>>(pairs: I) -> Self {
        let mut base = CorpusSegment::empty_at(0, 0);
        for pair in pairs {
            base.push(Arc::new(pair));
        }
        let delta = CorpusSegment::empty_at(base.num_sentences(), base.len());
        Self {
            base: Arc::new(base),
            delta: Arc::new(delta),
        }
    }

    /// Validate and append one sentence pair to the delta segment
    ///
    /// Nothing is mutated when validation fails.
    pub fn append_pair<I, L>(
        &mut self,
        source: Vec<TokenId>,
        target: Vec<TokenId>,
        alignment: I,
    ) -> Result<SentenceId>
    where
        I: IntoIterator<Item = L>,
        L: Into<Link>,
    {
        let pair = SentencePair::new(source, target, alignment)?;
        Ok(self.push(pair))
    }

    /// Append an already validated pair
    pub fn push(&mut self, pair: SentencePair) -> SentenceId {
        let id = self.num_sentences();
        Arc::make_mut(&mut self.delta).push(Arc::new(pair));
        id
    }

    /// Merge the delta segment into a new base and start an empty delta
    pub fn fold(&mut self) {
        if self.delta.num_sentences() == 0 {
            return;
        }
        let mut base = CorpusSegment {
            first_sentence: 0,
            first_position: 0,
            sentences: Vec::with_capacity(self.num_sentences()),
            tokens: Vec::with_capacity(self.flat_len()),
            starts: Vec::with_capacity(self.num_sentences()),
        };
        for pair in self.base.sentences.iter().chain(&self.delta.sentences) {
            base.push(Arc::clone(pair));
        }
        let delta = CorpusSegment::empty_at(base.num_sentences(), base.len());
        self.base = Arc::new(base);
        self.delta = Arc::new(delta);
    }

    /// Map a global flat position to (sentence id, offset in the source side)
    pub fn resolve(&self, position: FlatPosition) -> Result<(SentenceId, usize)> {
        let segment = if position >= self.delta.first_position {
            &self.delta
        } else {
            &self.base
        };
        segment
            .resolve_local(position - segment.first_position)
            .ok_or(TmError::OutOfRange {
                position,
                len: self.flat_len(),
            })
    }

    pub fn sentence(&self, id: SentenceId) -> Option<&SentencePair> {
        let pair = if id >= self.delta.first_sentence {
            self.delta.sentences.get(id - self.delta.first_sentence)
        } else {
            self.base.sentences.get(id)
        };
        pair.map(|p| &**p)
    }

    /// See [`SentencePair::aligned_target_span`]
    pub fn aligned_target_span(&self, id: SentenceId, source_span: Span) -> Result<Option<Span>> {
        let pair = self.sentence(id).ok_or(TmError::OutOfRange {
            position: id,
            len: self.num_sentences(),
        })?;
        if source_span.end > pair.source_len() {
            return Err(TmError::OutOfRange {
                position: source_span.end,
                len: pair.source_len(),
            });
        }
        Ok(pair.aligned_target_span(source_span))
    }

    /// All sentence pairs in corpus order
    pub fn iter(&self) -> impl Iterator<Item = &SentencePair> + '_ {
        self.base
            .sentences
            .iter()
            .chain(&self.delta.sentences)
            .map(|p| &**p)
    }

    pub fn base(&self) -> &Arc<CorpusSegment> {
        &self.base
    }

    pub fn delta(&self) -> &Arc<CorpusSegment> {
        &self.delta
    }

    pub fn base_tokens(&self) -> &[TokenId] {
        self.base.tokens()
    }

    pub fn delta_tokens(&self) -> &[TokenId] {
        self.delta.tokens()
    }

    pub fn num_sentences(&self) -> usize {
        self.base.num_sentences() + self.delta.num_sentences()
    }

    /// Flattened length: all source tokens plus one sentinel per sentence
    pub fn flat_len(&self) -> usize {
        self.base.len() + self.delta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_sentences() == 0
    }
}
