pub mod extractor;
pub mod features;
pub mod rule;
pub mod scorer;

pub use extractor::{ExtractorConfig, RuleExtractor};
pub use features::{FeatureSet, FeatureTemplate, RuleFeaturizer, RuleStats};
pub use rule::{FeatureVector, Rule, RuleScores, rank_rules};
pub use scorer::{Orientation, OrientationCounts};
