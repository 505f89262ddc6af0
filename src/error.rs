//! Error types for the translation model core

use thiserror::Error;

/// Errors raised by the corpus, index and model layers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TmError {
    /// An alignment link points outside the sentence pair it belongs to
    #[error(
        "invalid alignment link {source_pos}-{target_pos} for sentence pair of lengths {source_len}x{target_len}"
    )]
    InvalidAlignment {
        /// Source position of the offending link
        source_pos: usize,
        /// Target position of the offending link
        target_pos: usize,
        /// Source sentence length
        source_len: usize,
        /// Target sentence length
        target_len: usize,
    },

    /// A sentence pair that cannot be indexed (empty side, reserved token id)
    #[error("invalid sentence pair: {reason}")]
    InvalidSentencePair {
        /// Why the pair was rejected
        reason: String,
    },

    /// A flat corpus position does not resolve to a sentence
    ///
    /// This means the index and the corpus disagree and is never recovered from.
    #[error("corpus position {position} out of range (flattened length {len})")]
    OutOfRange {
        /// The position that failed to resolve
        position: usize,
        /// Flattened corpus length at the time of the lookup
        len: usize,
    },

    /// `append_pair` was called on a background (frozen) model
    #[error("model is read-only: appends are only accepted by foreground models")]
    ReadOnlyModel,

    /// Allocation failed while building a suffix array
    #[error("resource exhausted while building suffix array over {tokens} tokens")]
    ResourceExhausted {
        /// Size of the token array being indexed
        tokens: usize,
    },

    /// Configuration rejected at construction
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfig {
        /// The offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// The vocabulary ran out of token ids
    #[error("vocabulary is full ({size} entries)")]
    VocabularyFull {
        /// Number of entries in the vocabulary
        size: usize,
    },
}

/// Result alias for the core
pub type Result<T> = std::result::Result<T, TmError>;
