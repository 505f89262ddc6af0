//! The translation model facade
//!
//! A [`TranslationModel`] is shared by every decoding thread. Readers work on
//! an immutable [`Snapshot`] (corpus, base/delta indexes and cooccurrence
//! counts); the single writer builds the next snapshot off to the side and
//! publishes it with one pointer swap, so a reader that already holds a
//! snapshot is never affected by appends or folds.
//!
//! The only lock a query takes is the brief read of the snapshot pointer.
//! Extraction itself runs without locks, so a slow query never delays an
//! append and a pending append never delays another query.

pub mod config;
pub mod request;

pub use config::{ModelConfig, Role};
pub use request::{DecodingRequest, RuleGrid};

use crate::error::{Result, TmError};
use crate::index::cooc::{CoocLayers, LexicalCounts};
use crate::index::corpus::{Corpus, SentencePair};
use crate::index::delta::{DeltaIndex, fold_due};
use crate::index::types::{Link, SentenceId, TokenId};
use crate::query::extractor::RuleExtractor;
use crate::query::features::{FeatureSet, FeatureTemplate};
use crate::query::rule::Rule;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// One published state of the corpus and its indexes
pub struct Snapshot {
    version: u64,
    generation: u64,
    corpus: Corpus,
    index: DeltaIndex,
    cooc: CoocLayers,
}

impl Snapshot {
    /// Bumped on every publish (append or fold)
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Bumped on every base rebuild
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn index(&self) -> &DeltaIndex {
        &self.index
    }

    /// Cooccurrence counts of exactly this snapshot's corpus
    pub fn cooc(&self) -> &CoocLayers {
        &self.cooc
    }
}

/// Summary counters for logging and the CLI
#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub template: FeatureTemplate,
    pub role: Role,
    pub sentences: usize,
    pub base_tokens: usize,
    pub delta_tokens: usize,
    pub version: u64,
    pub generation: u64,
    pub cooc_entries: usize,
}

/// Dynamic translation model over an append-only parallel corpus
pub struct TranslationModel {
    config: ModelConfig,
    extractor: RuleExtractor,
    current: RwLock<Arc<Snapshot>>,
    /// Serializes appends
    writer: Mutex<()>,
}

impl TranslationModel {
    /// Create an empty model
    pub fn new(config: ModelConfig) -> Result<Self> {
        Self::from_pairs(config, std::iter::empty())
    }

    /// Bulk-build a model whose initial pairs all go into the base generation
    ///
    /// Works for either role: background models are populated this way.
    pub fn from_pairs<I>(config: ModelConfig, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = SentencePair>,
    {
        config.validate()?;
        let started = Instant::now();

        let corpus = Corpus::from_pairs(pairs);
        let index = DeltaIndex::build(&corpus, config.suffix_array_config())?;
        let cooc = CoocLayers::from_corpus(&corpus);

        info!(
            sentences = corpus.num_sentences(),
            tokens = corpus.flat_len(),
            cooc_entries = cooc.len(),
            role = %config.role,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built translation model"
        );

        let snapshot = Snapshot {
            version: 0,
            generation: 0,
            corpus,
            index,
            cooc,
        };
        Ok(Self {
            extractor: RuleExtractor::new(
                config.extractor_config(),
                FeatureSet::new(config.template),
            ),
            config,
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
        })
    }

    /// Select the feature template and role
    ///
    /// Takes the model by value, so it can only happen before the model is
    /// shared.
    pub fn configure(mut self, template: FeatureTemplate, role: Role) -> Self {
        self.config.template = template;
        self.config.role = role;
        self.extractor =
            RuleExtractor::new(self.config.extractor_config(), FeatureSet::new(template));
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// The currently published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Extract rules for `phrase` against `snapshot`
    pub(crate) fn extract(&self, snapshot: &Snapshot, phrase: &[TokenId]) -> Result<Vec<Rule>> {
        self.extractor
            .extract(&snapshot.corpus, &snapshot.index, &snapshot.cooc, phrase)
    }

    /// Ranked translation options for `phrase`, without caching
    ///
    /// Reflects every append published before the call. Use
    /// [`TranslationModel::request`] to cache across the spans of a sentence.
    pub fn query(&self, phrase: &[TokenId]) -> Result<Vec<Rule>> {
        self.extract(&self.snapshot(), phrase)
    }

    /// Start a decoding request with its own phrase cache
    pub fn request(&self) -> DecodingRequest<'_> {
        DecodingRequest::new(self, self.config.cache_capacity)
    }

    /// Append one sentence pair and publish it
    ///
    /// Fails with `ReadOnlyModel` on background models and with
    /// `InvalidAlignment` / `InvalidSentencePair` on bad input; in every
    /// failure case nothing is published. Folds the delta into a new base
    /// once it reaches the rebuild threshold.
    pub fn append_pair<I, L>(
        &self,
        source: Vec<TokenId>,
        target: Vec<TokenId>,
        alignment: I,
    ) -> Result<SentenceId>
    where
        I: IntoIterator<Item = L>,
        L: Into<Link>,
    {
        if self.config.role == Role::Background {
            return Err(TmError::ReadOnlyModel);
        }
        let pair = SentencePair::new(source, target, alignment)?;

        let _writer = self.writer.lock();
        let current = self.snapshot();

        let mut cooc = current.cooc.clone();
        cooc.observe_pair(&pair);
        let mut corpus = current.corpus.clone();
        let id = corpus.push(pair);

        let sa_config = self.config.suffix_array_config();
        let threshold = self.config.rebuild_threshold;
        let (index, generation) = if fold_due(corpus.base().len(), corpus.delta().len(), threshold) {
            let started = Instant::now();
            corpus.fold();
            cooc.fold();
            let index = DeltaIndex::build(&corpus, sa_config)?;
            info!(
                generation = current.generation + 1,
                sentences = corpus.num_sentences(),
                tokens = corpus.flat_len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "folded delta into new base"
            );
            (index, current.generation + 1)
        } else {
            (current.index.rebuild_delta(&corpus, sa_config)?, current.generation)
        };

        let next = Arc::new(Snapshot {
            version: current.version + 1,
            generation,
            corpus,
            index,
            cooc,
        });
        *self.current.write() = Arc::clone(&next);

        debug!(sentence = id, version = next.version, "appended sentence pair");
        Ok(id)
    }

    pub fn stats(&self) -> ModelStats {
        let snapshot = self.snapshot();
        ModelStats {
            template: self.config.template,
            role: self.config.role,
            sentences: snapshot.corpus.num_sentences(),
            base_tokens: snapshot.index.base().len(),
            delta_tokens: snapshot.index.delta().len(),
            version: snapshot.version,
            generation: snapshot.generation,
            cooc_entries: snapshot.cooc.len(),
        }
    }

    /// Joint count of a source/target word pair in the current snapshot
    pub fn joint_count(&self, s: TokenId, t: TokenId) -> u64 {
        self.snapshot().cooc.joint_count(s, t)
    }

    /// Run `f` with the cooccurrence counts of the current snapshot
    ///
    /// Holds no lock while `f` runs.
    pub fn with_cooc<R>(&self, f: impl FnOnce(&CoocLayers) -> R) -> R {
        f(&self.snapshot().cooc)
    }
}
