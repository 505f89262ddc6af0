//! Suffix array indexing module
//!
//! This module provides O(m log n) phrase lookup over the flattened source
//! side of a corpus segment using suffix arrays.
//!
//! ## Architecture
//!
//! - `builder`: Sorts suffixes and derives the rank and LCP arrays
//! - `reader`: Range search and position iteration over a built index
//! - `types`: Core type definitions
//!
//! Indexes are always rebuilt in memory from the corpus; only the corpus
//! itself is persisted (see [`crate::index::writer`]).

pub mod builder;
pub mod reader;
pub mod types;

// Re-exports for convenience
pub use builder::SuffixArrayBuilder;
pub use reader::{Positions, SuffixIndex};
pub use types::{SuffixArrayConfig, SuffixIndexStats};
