use serde::{Deserialize, Serialize};

/// Dense vocabulary id of a source or target token
pub type TokenId = u32;

/// Position in the flattened source token array (global across generations)
pub type FlatPosition = usize;

/// Index of a sentence pair in the corpus
pub type SentenceId = usize;

/// Sentinel token separating sentences in the flattened array
///
/// Orders after every real token and is never handed out by a vocabulary.
pub const SENTINEL: TokenId = TokenId::MAX;

/// One word-alignment link: (source position, target position), sentence-local
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    pub source: u32,
    pub target: u32,
}

impl Link {
    pub fn new(source: u32, target: u32) -> Self {
        Self { source, target }
    }
}

impl From<(u32, u32)> for Link {
    fn from((source, target): (u32, u32)) -> Self {
        Self { source, target }
    }
}

/// Half-open token span `[start, end)` within one sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }
}

// On-disk store format

/// Magic number for corpus.bin ("DTMC" in little-endian)
pub const CORPUS_MAGIC: u32 = 0x434D5444;

/// Current corpus.bin format version
pub const CORPUS_VERSION: u32 = 1;

/// Header of corpus.bin: magic, version, sentence count, flags, reserved
pub const CORPUS_HEADER_SIZE: usize = 24;

/// Store metadata, written as meta.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub version: u32,
    pub sentences: u64,
    pub source_tokens: u64,
    pub target_tokens: u64,
    pub links: u64,
    pub source_vocab: usize,
    pub target_vocab: usize,
    pub created_at: u64,
}

/// Both vocabularies in id order, written as vocab.json
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabFile {
    pub source: Vec<String>,
    pub target: Vec<String>,
}
