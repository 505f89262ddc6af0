//! Types for suffix array indexing
//!
//! This module defines the configuration and statistics types shared by the
//! builder and the query side.

use serde::{Deserialize, Serialize};

/// Suffix array entry - segment-local position in the flattened token array
pub type SuffixEntry = u32;

/// Token arrays above this size are sorted with rayon
pub const DEFAULT_PARALLEL_SORT_CUTOFF: usize = 100_000;

/// Ranks checked through the LCP array before falling back to binary search
/// when locating the end of a match range
pub const LCP_LINEAR_PROBE: usize = 8;

/// Configuration for suffix array building
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SuffixArrayConfig {
    /// Token arrays longer than this are sorted in parallel
    pub parallel_sort_cutoff: usize,
}

impl Default for SuffixArrayConfig {
    fn default() -> Self {
        Self {
            parallel_sort_cutoff: DEFAULT_PARALLEL_SORT_CUTOFF,
        }
    }
}

/// Statistics about one built suffix index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuffixIndexStats {
    /// Flattened tokens indexed, sentinels included
    pub tokens: usize,
    /// Number of sentences covered
    pub sentences: usize,
    /// Global flat position of the first token
    pub first_position: usize,
}
