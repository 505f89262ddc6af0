//! Corpus storage and indexing
//!
//! - [`corpus`]: sentence pairs split into an immutable base and a growing delta
//! - [`suffix_array`]: suffix array over one corpus segment
//! - [`delta`]: base and delta suffix indexes queried as one
//! - [`cooc`]: word cooccurrence counts
//! - [`writer`] / [`reader`]: the on-disk model store
//! - [`build`]: loading a bitext from text files

pub mod build;
pub mod cooc;
pub mod corpus;
pub mod delta;
pub mod reader;
pub mod stats;
pub mod suffix_array;
pub mod types;
pub mod writer;

pub use cooc::{CoocCounts, CoocLayers, CoocTable, LexicalCounts};
pub use corpus::{Alignment, Corpus, SentencePair};
pub use delta::DeltaIndex;
pub use reader::StoreReader;
pub use types::*;
pub use writer::StoreWriter;
