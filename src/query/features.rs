//! Feature templates
//!
//! A template is a list of featurizers. Each featurizer is a pure function
//! from aggregated rule statistics to named feature values.

use super::rule::{FeatureVector, RuleScores};
use super::scorer::{Orientation, OrientationCounts};
use crate::index::types::TokenId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PHRASE_FWD: &str = "TM.PhraseFwd";
pub const PHRASE_BWD: &str = "TM.PhraseBwd";
pub const LEX_FWD: &str = "TM.LexFwd";
pub const LEX_BWD: &str = "TM.LexBwd";
pub const PHRASE_PENALTY: &str = "TM.PhrasePenalty";
pub const COUNT: &str = "TM.Count";
pub const SINGLETON: &str = "TM.Singleton";

/// Everything known about one extracted phrase pair
#[derive(Debug, Clone, Copy)]
pub struct RuleStats<'a> {
    pub source: &'a [TokenId],
    pub target: &'a [TokenId],
    /// Sampled occurrences that produced this target phrase
    pub count: u32,
    /// Sampled occurrences of the source phrase, aligned or not
    pub sampled: u32,
    pub scores: RuleScores,
    pub orientation: OrientationCounts,
}

/// One family of features
pub trait RuleFeaturizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn featurize(&self, stats: &RuleStats<'_>, out: &mut FeatureVector);
}

/// Log phrase translation probabilities in both directions
pub struct PhraseProbabilities;

impl RuleFeaturizer for PhraseProbabilities {
    fn name(&self) -> &'static str {
        "phrase-probabilities"
    }

    fn featurize(&self, stats: &RuleStats<'_>, out: &mut FeatureVector) {
        out.set(PHRASE_FWD, stats.scores.phrase_fwd.ln());
        out.set(PHRASE_BWD, stats.scores.phrase_bwd.ln());
    }
}

/// Log lexical weights in both directions
pub struct LexicalWeights;

impl RuleFeaturizer for LexicalWeights {
    fn name(&self) -> &'static str {
        "lexical-weights"
    }

    fn featurize(&self, stats: &RuleStats<'_>, out: &mut FeatureVector) {
        out.set(LEX_FWD, stats.scores.lex_fwd.ln());
        out.set(LEX_BWD, stats.scores.lex_bwd.ln());
    }
}

/// Constant 1 per rule
pub struct PhrasePenalty;

impl RuleFeaturizer for PhrasePenalty {
    fn name(&self) -> &'static str {
        "phrase-penalty"
    }

    fn featurize(&self, _stats: &RuleStats<'_>, out: &mut FeatureVector) {
        out.set(PHRASE_PENALTY, 1.0);
    }
}

/// Log count and singleton indicator
pub struct CountFeatures;

impl RuleFeaturizer for CountFeatures {
    fn name(&self) -> &'static str {
        "count"
    }

    fn featurize(&self, stats: &RuleStats<'_>, out: &mut FeatureVector) {
        out.set(COUNT, (stats.count as f64).ln());
        out.set(SINGLETON, if stats.count == 1 { 1.0 } else { 0.0 });
    }
}

/// One-hot feature naming the rule
pub struct RuleIndicator;

impl RuleFeaturizer for RuleIndicator {
    fn name(&self) -> &'static str {
        "rule-indicator"
    }

    fn featurize(&self, stats: &RuleStats<'_>, out: &mut FeatureVector) {
        out.set(
            format!("TM.Rule:{}>{}", join_ids(stats.source), join_ids(stats.target)),
            1.0,
        );
    }
}

fn join_ids(ids: &[TokenId]) -> String {
    let parts: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    parts.join("_")
}

/// One-hot feature for the rule's source x target dimensions
pub struct DimensionIndicator;

impl RuleFeaturizer for DimensionIndicator {
    fn name(&self) -> &'static str {
        "dimension"
    }

    fn featurize(&self, stats: &RuleStats<'_>, out: &mut FeatureVector) {
        out.set(
            format!("TM.Dim:{}x{}", stats.source.len(), stats.target.len()),
            1.0,
        );
    }
}

/// Share of occurrences in each reordering class, non-zero classes only
pub struct ReorderingShares;

impl RuleFeaturizer for ReorderingShares {
    fn name(&self) -> &'static str {
        "reordering"
    }

    fn featurize(&self, stats: &RuleStats<'_>, out: &mut FeatureVector) {
        let total = stats.count.max(1) as f64;
        for o in Orientation::ALL {
            let fwd = stats.orientation.forward(o);
            if fwd > 0 {
                out.set(format!("TM.Orient.Fwd.{}", o.tag()), fwd as f64 / total);
            }
        }
        for o in Orientation::ALL {
            let bwd = stats.orientation.backward(o);
            if bwd > 0 {
                out.set(format!("TM.Orient.Bwd.{}", o.tag()), bwd as f64 / total);
            }
        }
    }
}

/// Which featurizers a model runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureTemplate {
    /// Fixed set of dense scores
    #[default]
    Dense,
    /// Dense scores plus rule, dimension and reordering indicators
    Sparse,
}

impl fmt::Display for FeatureTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureTemplate::Dense => write!(f, "dense"),
            FeatureTemplate::Sparse => write!(f, "sparse"),
        }
    }
}

impl FromStr for FeatureTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dense" => Ok(FeatureTemplate::Dense),
            "sparse" => Ok(FeatureTemplate::Sparse),
            other => Err(format!("unknown feature template '{}'", other)),
        }
    }
}

/// The featurizers selected by a template, applied in order
pub struct FeatureSet {
    template: FeatureTemplate,
    featurizers: Vec<Box<dyn RuleFeaturizer>>,
}

impl FeatureSet {
    pub fn new(template: FeatureTemplate) -> Self {
        let mut featurizers: Vec<Box<dyn RuleFeaturizer>> = vec![
            Box::new(PhraseProbabilities),
            Box::new(LexicalWeights),
            Box::new(PhrasePenalty),
            Box::new(CountFeatures),
        ];
        if template == FeatureTemplate::Sparse {
            featurizers.push(Box::new(RuleIndicator));
            featurizers.push(Box::new(DimensionIndicator));
            featurizers.push(Box::new(ReorderingShares));
        }
        Self {
            template,
            featurizers,
        }
    }

    pub fn template(&self) -> FeatureTemplate {
        self.template
    }

    /// Names of the active featurizers
    pub fn names(&self) -> Vec<&'static str> {
        self.featurizers.iter().map(|f| f.name()).collect()
    }

    pub fn featurize(&self, stats: &RuleStats<'_>) -> FeatureVector {
        let mut out = FeatureVector::new();
        for featurizer in &self.featurizers {
            featurizer.featurize(stats, &mut out);
        }
        out
    }
}

impl fmt::Debug for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureSet")
            .field("template", &self.template)
            .field("featurizers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats<'a>(source: &'a [TokenId], target: &'a [TokenId], count: u32) -> RuleStats<'a> {
        let mut orientation = OrientationCounts::default();
        for _ in 0..count {
            orientation.record(Orientation::Monotone, Orientation::Discontinuous);
        }
        RuleStats {
            source,
            target,
            count,
            sampled: 4,
            scores: RuleScores {
                phrase_fwd: 0.5,
                phrase_bwd: 1.0,
                lex_fwd: 0.25,
                lex_bwd: 0.5,
            },
            orientation,
        }
    }

    #[test]
    fn test_dense_names_in_order() {
        let features = FeatureSet::new(FeatureTemplate::Dense).featurize(&stats(&[1], &[2], 2));
        assert_eq!(
            features.names().collect::<Vec<_>>(),
            vec![PHRASE_FWD, PHRASE_BWD, LEX_FWD, LEX_BWD, PHRASE_PENALTY, COUNT, SINGLETON]
        );
        assert!((features.get(PHRASE_FWD).unwrap() - 0.5f64.ln()).abs() < 1e-12);
        assert_eq!(features.get(PHRASE_BWD), Some(0.0));
        assert_eq!(features.get(PHRASE_PENALTY), Some(1.0));
        assert_eq!(features.get(SINGLETON), Some(0.0));
    }

    #[test]
    fn test_singleton() {
        let features = FeatureSet::new(FeatureTemplate::Dense).featurize(&stats(&[1], &[2], 1));
        assert_eq!(features.get(SINGLETON), Some(1.0));
        assert_eq!(features.get(COUNT), Some(0.0));
    }

    #[test]
    fn test_sparse_indicators() {
        let features =
            FeatureSet::new(FeatureTemplate::Sparse).featurize(&stats(&[3, 4], &[7], 2));
        assert_eq!(features.get("TM.Rule:3_4>7"), Some(1.0));
        assert_eq!(features.get("TM.Dim:2x1"), Some(1.0));
        assert_eq!(features.get("TM.Orient.Fwd.M"), Some(1.0));
        assert_eq!(features.get("TM.Orient.Bwd.D"), Some(1.0));
        // Zero shares are not emitted
        assert_eq!(features.get("TM.Orient.Fwd.S"), None);
        assert_eq!(features.len(), 7 + 4);
    }

    #[test]
    fn test_template_parse() {
        assert_eq!("Sparse".parse::<FeatureTemplate>(), Ok(FeatureTemplate::Sparse));
        assert_eq!(FeatureTemplate::Dense.to_string(), "dense");
        assert!("tiny".parse::<FeatureTemplate>().is_err());
    }
}
