//! Probability inference, risk banding and the approve/reject decision

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::errors::{Result, ScoringError};
use crate::gbdt::Model;
use crate::preprocess::PreprocessedVector;

/// Ordinal risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskCategory {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 5] = [
        RiskCategory::VeryLow,
        RiskCategory::Low,
        RiskCategory::Medium,
        RiskCategory::High,
        RiskCategory::VeryHigh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::VeryLow => "VERY_LOW",
            RiskCategory::Low => "LOW",
            RiskCategory::Medium => "MEDIUM",
            RiskCategory::High => "HIGH",
            RiskCategory::VeryHigh => "VERY_HIGH",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "APPROVE",
            Decision::Reject => "REJECT",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated probability breakpoints.
///
/// Band `i` covers `[b[i], b[i+1])`; the last band is closed at 1.0, so the
/// five bands partition [0, 1] with every boundary value belonging to the
/// band above it.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskBands {
    boundaries: [f64; 6],
}

impl RiskBands {
    pub fn new(boundaries: &[f64]) -> Result<Self> {
        let boundaries: [f64; 6] = boundaries.try_into().map_err(|_| {
            ScoringError::InvalidConfig(format!(
                "risk_category_boundaries must have exactly 6 values, got {}",
                boundaries.len()
            ))
        })?;

        if boundaries[0] != 0.0 || boundaries[5] != 1.0 {
            return Err(ScoringError::InvalidConfig(
                "risk_category_boundaries must start at 0.0 and end at 1.0".to_string(),
            ));
        }
        if boundaries
            .windows(2)
            .any(|w| w[0].partial_cmp(&w[1]) != Some(Ordering::Less))
        {
            return Err(ScoringError::InvalidConfig(format!(
                "risk_category_boundaries must be strictly ascending, got {boundaries:?}"
            )));
        }

        Ok(Self { boundaries })
    }

    pub fn boundaries(&self) -> &[f64; 6] {
        &self.boundaries
    }

    pub fn categorize(&self, probability: f64) -> RiskCategory {
        RiskCategory::ALL
            .iter()
            .zip(&self.boundaries[1..5])
            .find(|(_, upper)| probability < **upper)
            .map(|(category, _)| *category)
            .unwrap_or(RiskCategory::VeryHigh)
    }
}

impl Default for RiskBands {
    fn default() -> Self {
        Self {
            boundaries: [0.0, 0.2, 0.4, 0.6, 0.8, 1.0],
        }
    }
}

/// Output of one scoring call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub probability: f64,
    pub risk_category: RiskCategory,
    pub decision: Decision,
}

/// Immutable classifier plus decision policy. Cheap to clone, safe to share.
#[derive(Debug, Clone)]
pub struct Scorer {
    model: Arc<Model>,
    threshold: f64,
    bands: RiskBands,
}

impl Scorer {
    pub fn new(model: Arc<Model>, threshold: f64, bands: RiskBands) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ScoringError::InvalidConfig(format!(
                "risk_threshold must be within [0, 1], got {threshold}"
            )));
        }
        model.validate()?;
        Ok(Self {
            model,
            threshold,
            bands,
        })
    }

    /// Default probability for a preprocessed vector
    pub fn predict(&self, vector: &PreprocessedVector) -> Result<f64> {
        Ok(self.model.predict_proba(vector.values())?)
    }

    /// `REJECT` when `probability >= threshold`
    pub fn decide(&self, probability: f64) -> Decision {
        if probability >= self.threshold {
            Decision::Reject
        } else {
            Decision::Approve
        }
    }

    pub fn categorize(&self, probability: f64) -> RiskCategory {
        self.bands.categorize(probability)
    }

    pub fn score(&self, vector: &PreprocessedVector) -> Result<ScoreResult> {
        let probability = self.predict(vector)?;
        Ok(ScoreResult {
            probability,
            risk_category: self.categorize(probability),
            decision: self.decide(probability),
        })
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn version(&self) -> &str {
        &self.model.model_version
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn bands(&self) -> &RiskBands {
        &self.bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::{Node, Tree};
    use crate::preprocess::FeatureSchema;
    use proptest::prelude::*;

    fn scorer(threshold: f64) -> Scorer {
        let tree = Tree::new(
            vec![
                Node::internal(0, 0, 0.0, 1, 2, 100.0),
                Node::leaf(1, -1.0, 50.0),
                Node::leaf(2, 1.0, 50.0),
            ],
            1.0,
        );
        let model = Model::new("test", vec!["x".to_string()], vec![tree], 0.0);
        Scorer::new(Arc::new(model), threshold, RiskBands::default()).unwrap()
    }

    fn vector(x: f64) -> PreprocessedVector {
        let schema = Arc::new(FeatureSchema {
            version: "t".to_string(),
            columns: vec!["x".to_string()],
        });
        PreprocessedVector::new(schema, vec![x]).unwrap()
    }

    #[test]
    fn test_boundaries_are_lower_inclusive() {
        let bands = RiskBands::new(&[0.0, 0.1, 0.3, 0.5, 0.7, 1.0]).unwrap();
        assert_eq!(bands.categorize(0.0), RiskCategory::VeryLow);
        assert_eq!(bands.categorize(0.099_999), RiskCategory::VeryLow);
        assert_eq!(bands.categorize(0.1), RiskCategory::Low);
        assert_eq!(bands.categorize(0.3), RiskCategory::Medium);
        assert_eq!(bands.categorize(0.5), RiskCategory::High);
        assert_eq!(bands.categorize(0.7), RiskCategory::VeryHigh);
        assert_eq!(bands.categorize(1.0), RiskCategory::VeryHigh);
    }

    #[test]
    fn test_quarter_probability_is_low() {
        let bands = RiskBands::new(&[0.0, 0.1, 0.3, 0.5, 0.7, 1.0]).unwrap();
        assert_eq!(bands.categorize(0.25), RiskCategory::Low);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let scorer = scorer(0.5);
        assert_eq!(scorer.decide(0.25), Decision::Approve);
        assert_eq!(scorer.decide(0.5), Decision::Reject);
        assert_eq!(scorer.decide(0.499_999), Decision::Approve);
    }

    #[test]
    fn test_invalid_bands_rejected() {
        assert!(RiskBands::new(&[0.0, 0.5, 1.0]).is_err());
        assert!(RiskBands::new(&[0.1, 0.2, 0.4, 0.6, 0.8, 1.0]).is_err());
        assert!(RiskBands::new(&[0.0, 0.2, 0.4, 0.6, 0.8, 0.9]).is_err());
        assert!(RiskBands::new(&[0.0, 0.4, 0.2, 0.6, 0.8, 1.0]).is_err());
        assert!(RiskBands::new(&[0.0, 0.2, 0.2, 0.6, 0.8, 1.0]).is_err());
        assert!(RiskBands::new(&[0.0, f64::NAN, 0.4, 0.6, 0.8, 1.0]).is_err());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let model = scorer(0.5).model().clone();
        assert!(Scorer::new(Arc::clone(&model), 1.5, RiskBands::default()).is_err());
        assert!(Scorer::new(model, -0.1, RiskBands::default()).is_err());
    }

    #[test]
    fn test_score() {
        let scorer = scorer(0.5);
        let low = scorer.score(&vector(-1.0)).unwrap();
        assert!((low.probability - 0.268_941_4).abs() < 1e-6);
        assert_eq!(low.risk_category, RiskCategory::Low);
        assert_eq!(low.decision, Decision::Approve);

        let high = scorer.score(&vector(1.0)).unwrap();
        assert_eq!(high.risk_category, RiskCategory::High);
        assert_eq!(high.decision, Decision::Reject);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&RiskCategory::VeryHigh).unwrap(), "\"VERY_HIGH\"");
        assert_eq!(serde_json::to_string(&Decision::Reject).unwrap(), "\"REJECT\"");
        assert_eq!(RiskCategory::VeryLow.to_string(), "VERY_LOW");
    }

    proptest! {
        #[test]
        fn every_probability_falls_in_exactly_one_band(p in 0.0f64..=1.0) {
            let bands = RiskBands::default();
            let b = bands.boundaries();
            let category = bands.categorize(p);
            let idx = RiskCategory::ALL.iter().position(|c| *c == category).unwrap();
            prop_assert!(p >= b[idx]);
            if idx < 4 {
                prop_assert!(p < b[idx + 1]);
            } else {
                prop_assert!(p <= b[5]);
            }
        }

        #[test]
        fn categories_are_monotone(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let bands = RiskBands::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(bands.categorize(lo) <= bands.categorize(hi));
        }
    }
}
