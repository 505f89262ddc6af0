//! Token vocabularies
//!
//! Maps token strings to dense ids and back. Ids are assigned in insertion
//! order and never recycled, so a string keeps its id for the lifetime of the
//! vocabulary. Lookups take a shared lock; only new strings take the
//! exclusive one.

use crate::error::{Result, TmError};
use crate::index::types::{SENTINEL, TokenId};
use ahash::AHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Default)]
struct VocabInner {
    ids: AHashMap<Arc<str>, TokenId>,
    tokens: Vec<Arc<str>>,
}

/// Bidirectional string <-> id map for one side of the bitext
#[derive(Default)]
pub struct Vocabulary {
    inner: RwLock<VocabInner>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a vocabulary from tokens listed in id order
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let vocab = Self::new();
        for token in tokens {
            vocab.get_or_insert(token.as_ref())?;
        }
        Ok(vocab)
    }

    /// Id of `token`, assigning the next free id if it is new
    pub fn get_or_insert(&self, token: &str) -> Result<TokenId> {
        if let Some(&id) = self.inner.read().ids.get(token) {
            return Ok(id);
        }

        let mut inner = self.inner.write();
        // Another writer may have inserted it between the two locks
        if let Some(&id) = inner.ids.get(token) {
            return Ok(id);
        }
        let next = inner.tokens.len();
        if next >= SENTINEL as usize {
            return Err(TmError::VocabularyFull { size: next });
        }
        let id = next as TokenId;
        let key: Arc<str> = Arc::from(token);
        inner.tokens.push(Arc::clone(&key));
        inner.ids.insert(key, id);
        Ok(id)
    }

    /// Id of `token` if it has been seen
    pub fn id(&self, token: &str) -> Option<TokenId> {
        self.inner.read().ids.get(token).copied()
    }

    /// Token string for `id`
    pub fn token(&self, id: TokenId) -> Option<Arc<str>> {
        self.inner.read().tokens.get(id as usize).cloned()
    }

    /// Map a whitespace-tokenized line to ids, growing the vocabulary
    pub fn encode(&self, line: &str) -> Result<Vec<TokenId>> {
        line.split_whitespace()
            .map(|token| self.get_or_insert(token))
            .collect()
    }

    /// Map tokens to ids without growing the vocabulary
    ///
    /// Returns `None` if any token is unknown: such a phrase cannot occur in
    /// the corpus.
    pub fn lookup(&self, line: &str) -> Option<Vec<TokenId>> {
        let inner = self.inner.read();
        line.split_whitespace()
            .map(|token| inner.ids.get(token).copied())
            .collect()
    }

    /// Render ids back to a space-joined string (`<unk>` for unknown ids)
    pub fn decode(&self, ids: &[TokenId]) -> String {
        let inner = self.inner.read();
        ids.iter()
            .map(|&id| inner.tokens.get(id as usize).map(|t| &**t).unwrap_or("<unk>"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// All tokens in id order
    pub fn tokens(&self) -> Vec<String> {
        self.inner.read().tokens.iter().map(|t| t.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source and target vocabularies of one bitext
#[derive(Default)]
pub struct Lexicon {
    pub source: Vocabulary,
    pub target: Vocabulary,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }
}
