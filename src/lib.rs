//! # dtm - Dynamic Translation Model
//!
//! A phrase translation model for statistical machine translation that is
//! computed on demand from a word-aligned parallel corpus instead of a
//! precomputed phrase table. New sentence pairs can be appended while
//! decoders are querying, and show up in every query issued after the
//! append returns.
//!
//! ## Architecture
//!
//! - [`index`] - Corpus, suffix arrays (base + delta), cooccurrence counts,
//!   the on-disk store and the bitext loader
//! - [`query`] - Rule extraction, scoring and feature templates
//! - [`model`] - The [`TranslationModel`] facade, snapshots and per-request caching
//! - [`vocab`] - String to token id mapping
//!
//! ## Quick Start
//!
//! ```no_run
//! use dtm::{ModelConfig, TranslationModel};
//! use dtm::vocab::Lexicon;
//!
//! let lexicon = Lexicon::new();
//! let model = TranslationModel::new(ModelConfig::default()).unwrap();
//!
//! let source = lexicon.source.encode("das haus").unwrap();
//! let target = lexicon.target.encode("the house").unwrap();
//! model.append_pair(source, target, [(0u32, 0u32), (1, 1)]).unwrap();
//!
//! let phrase = lexicon.source.lookup("haus").unwrap();
//! for rule in model.query(&phrase).unwrap() {
//!     println!("{}", lexicon.target.decode(&rule.target));
//! }
//! ```
//!
//! ## Concurrency
//!
//! Queries run against an immutable snapshot and never block each other.
//! Appends are serialized; each one rebuilds only the small delta suffix
//! array, and the delta is folded into the base once it grows past
//! `rebuild_threshold` of the base size.

pub mod error;
pub mod index;
pub mod model;
pub mod query;
pub mod utils;
pub mod vocab;

pub use error::{Result, TmError};
pub use model::{DecodingRequest, ModelConfig, Role, RuleGrid, TranslationModel};
pub use query::features::FeatureTemplate;
pub use query::rule::Rule;
