//! Translation options returned to the decoder

use crate::index::types::{Link, TokenId};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;

/// Named feature values, in the order the featurizers produced them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    entries: Vec<(Cow<'static, str>, f64)>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, replacing an earlier value of the same name
    pub fn set(&mut self, name: impl Into<Cow<'static, str>>, value: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.entries.iter().map(|(n, v)| (&**n, *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(n, _)| &**n)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Raw probabilities behind the log-domain features
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleScores {
    /// p(target | source) over the sampled occurrences
    pub phrase_fwd: f64,
    /// p(source | target), normalized within the sampled sentences
    pub phrase_bwd: f64,
    /// Lexical weight of the target given the source
    pub lex_fwd: f64,
    /// Lexical weight of the source given the target
    pub lex_bwd: f64,
}

/// A scored translation option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub source: Vec<TokenId>,
    pub target: Vec<TokenId>,
    pub features: FeatureVector,
    /// Sampled occurrences that produced this target phrase
    pub count: u32,
    pub scores: RuleScores,
    /// Most frequent rule-internal alignment, positions relative to the phrases
    pub alignment: Vec<Link>,
}

impl Rule {
    /// Decoder order: forward probability descending, then backward
    /// probability descending, then target phrase ascending
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .scores
            .phrase_fwd
            .total_cmp(&self.scores.phrase_fwd)
            .then_with(|| other.scores.phrase_bwd.total_cmp(&self.scores.phrase_bwd))
            .then_with(|| self.target.cmp(&other.target))
    }
}

/// Sort rules into decoder order
pub fn rank_rules(rules: &mut [Rule]) {
    rules.sort_by(Rule::rank_cmp);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(target: &[TokenId], fwd: f64, bwd: f64) -> Rule {
        Rule {
            source: vec![1],
            target: target.to_vec(),
            features: FeatureVector::new(),
            count: 1,
            scores: RuleScores {
                phrase_fwd: fwd,
                phrase_bwd: bwd,
                lex_fwd: 1.0,
                lex_bwd: 1.0,
            },
            alignment: Vec::new(),
        }
    }

    #[test]
    fn test_rank_order() {
        let mut rules = vec![
            rule(&[9], 0.25, 1.0),
            rule(&[5], 0.5, 0.5),
            rule(&[3], 0.25, 1.0),
            rule(&[4], 0.5, 0.75),
        ];
        rank_rules(&mut rules);
        let targets: Vec<_> = rules.iter().map(|r| r.target[0]).collect();
        assert_eq!(targets, vec![4, 5, 3, 9]);
    }

    #[test]
    fn test_feature_vector_set_replaces() {
        let mut fv = FeatureVector::new();
        fv.set("TM.PhraseFwd", -1.0);
        fv.set(format!("TM.Dim:{}x{}", 1, 2), 1.0);
        fv.set("TM.PhraseFwd", -2.0);
        assert_eq!(fv.len(), 2);
        assert_eq!(fv.get("TM.PhraseFwd"), Some(-2.0));
        assert_eq!(fv.get("TM.Dim:1x2"), Some(1.0));
        assert_eq!(fv.get("missing"), None);
        assert_eq!(fv.names().collect::<Vec<_>>(), vec!["TM.PhraseFwd", "TM.Dim:1x2"]);
    }
}
