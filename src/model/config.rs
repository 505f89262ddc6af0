//! Model configuration

use crate::error::{Result, TmError};
use crate::index::suffix_array::SuffixArrayConfig;
use crate::index::suffix_array::types::DEFAULT_PARALLEL_SORT_CUTOFF;
use crate::query::extractor::ExtractorConfig;
use crate::query::features::FeatureTemplate;
use crate::query::scorer::DEFAULT_LEX_FLOOR;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether a model accepts new sentence pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// In-domain model, extended online
    #[default]
    Foreground,
    /// Frozen model; appends fail with `ReadOnlyModel`
    Background,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Foreground => write!(f, "foreground"),
            Role::Background => write!(f, "background"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "foreground" => Ok(Role::Foreground),
            "background" => Ok(Role::Background),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Everything fixed when a model is constructed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub template: FeatureTemplate,
    pub role: Role,
    /// Fold the delta once it holds this fraction of the base's tokens
    pub rebuild_threshold: f64,
    pub max_occurrences_sampled: usize,
    /// Longest span `DecodingRequest::rule_grid` asks for
    pub longest_source_phrase: usize,
    pub longest_target_phrase: usize,
    pub lex_floor: f64,
    /// Distinct phrases cached per decoding request
    pub cache_capacity: usize,
    pub parallel_sort_cutoff: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            template: FeatureTemplate::Dense,
            role: Role::Foreground,
            rebuild_threshold: 0.05,
            max_occurrences_sampled: 100,
            longest_source_phrase: 7,
            longest_target_phrase: 7,
            lex_floor: DEFAULT_LEX_FLOOR,
            cache_capacity: 1024,
            parallel_sort_cutoff: DEFAULT_PARALLEL_SORT_CUTOFF,
        }
    }
}

impl ModelConfig {
    pub fn with_template(mut self, template: FeatureTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Reject values the model cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.rebuild_threshold.is_finite() && self.rebuild_threshold > 0.0) {
            return Err(invalid("rebuild_threshold", "must be a positive fraction"));
        }
        if self.max_occurrences_sampled == 0 {
            return Err(invalid("max_occurrences_sampled", "must be positive"));
        }
        if self.longest_source_phrase == 0 {
            return Err(invalid("longest_source_phrase", "must be positive"));
        }
        if self.longest_target_phrase == 0 {
            return Err(invalid("longest_target_phrase", "must be positive"));
        }
        if !(self.lex_floor > 0.0 && self.lex_floor <= 1.0) {
            return Err(invalid("lex_floor", "must be in (0, 1]"));
        }
        if self.cache_capacity == 0 {
            return Err(invalid("cache_capacity", "must be positive"));
        }
        Ok(())
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            max_occurrences_sampled: self.max_occurrences_sampled,
            longest_target_phrase: self.longest_target_phrase,
            lex_floor: self.lex_floor,
        }
    }

    pub fn suffix_array_config(&self) -> SuffixArrayConfig {
        SuffixArrayConfig {
            parallel_sort_cutoff: self.parallel_sort_cutoff,
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> TmError {
    TmError::InvalidConfig {
        field,
        reason: reason.to_string(),
    }
}
