//! Per-prediction attribution and narrative
//!
//! Attributions are exact TreeSHAP values of the margin, rescaled linearly
//! into probability space so that `base_value + Σ attribution == probability`.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::debug;

use crate::errors::{Result, ScoringError};
use crate::gbdt::sigmoid;
use crate::preprocess::PreprocessedVector;
use crate::scorer::{RiskCategory, Scorer};

/// Margin distance below which the secant rescaling is replaced by the
/// sigmoid derivative.
const DEGENERATE_MARGIN_GAP: f64 = 1e-12;

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    IncreasesRisk,
    DecreasesRisk,
}

impl Direction {
    fn of(attribution: f64) -> Self {
        if attribution > 0.0 {
            Direction::IncreasesRisk
        } else {
            Direction::DecreasesRisk
        }
    }

    pub fn as_phrase(&self) -> &'static str {
        match self {
            Direction::IncreasesRisk => "increases risk",
            Direction::DecreasesRisk => "decreases risk",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttribution {
    pub feature_name: String,
    /// Contribution in probability units
    pub attribution: f64,
    /// Preprocessed input value
    pub feature_value: f64,
    pub direction: Direction,
}

/// Additive decomposition of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Probability of an applicant about whom nothing is known
    pub base_value: f64,
    pub probability: f64,
    pub risk_category: RiskCategory,
    /// Every feature, by descending |attribution|
    pub attributions: Vec<FeatureAttribution>,
    pub top_k: usize,
    pub narrative: String,
}

impl Explanation {
    /// The user-facing subset of the attributions
    pub fn top_factors(&self) -> &[FeatureAttribution] {
        &self.attributions[..self.top_k.min(self.attributions.len())]
    }

    pub fn attribution_sum(&self) -> f64 {
        self.attributions.iter().map(|a| a.attribution).sum()
    }

    /// `base_value + Σ attribution - probability`
    pub fn conservation_error(&self) -> f64 {
        (self.base_value + self.attribution_sum() - self.probability).abs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Explainer {
    top_k: usize,
}

impl Default for Explainer {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K }
    }
}

impl Explainer {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Attribute the scorer's probability for `vector` to its features.
    ///
    /// Fails with `ExplainabilityDegraded`; callers treat that as non-fatal.
    pub fn explain(&self, vector: &PreprocessedVector, scorer: &Scorer) -> Result<Explanation> {
        let model = scorer.model();
        let values = vector.values();

        let phi = model
            .shap_values(values)
            .map_err(|e| ScoringError::ExplainabilityDegraded(e.to_string()))?;
        let margin = model
            .margin(values)
            .map_err(|e| ScoringError::ExplainabilityDegraded(e.to_string()))?;
        let expected = model.expected_margin();

        let probability = sigmoid(margin);
        let base_value = sigmoid(expected);
        let gap = margin - expected;
        let scale = if gap.abs() > DEGENERATE_MARGIN_GAP {
            (probability - base_value) / gap
        } else {
            probability * (1.0 - probability)
        };

        let mut attributions = Vec::with_capacity(phi.len());
        for ((name, value), contribution) in vector.columns().iter().zip(values).zip(&phi) {
            let attribution = contribution * scale;
            if !attribution.is_finite() {
                return Err(ScoringError::ExplainabilityDegraded(format!(
                    "non-finite attribution for {name}"
                )));
            }
            attributions.push(FeatureAttribution {
                feature_name: name.clone(),
                attribution,
                feature_value: *value,
                direction: Direction::of(attribution),
            });
        }
        // Stable: ties keep schema order.
        attributions.sort_by(|a, b| b.attribution.abs().total_cmp(&a.attribution.abs()));

        let risk_category = scorer.categorize(probability);
        let top = &attributions[..self.top_k.min(attributions.len())];
        let narrative = render_narrative(risk_category, probability, top);

        debug!(
            base_value,
            probability,
            features = attributions.len(),
            "Explanation computed"
        );

        Ok(Explanation {
            base_value,
            probability,
            risk_category,
            attributions,
            top_k: self.top_k,
            narrative,
        })
    }

    /// Mean absolute attribution per feature over a batch, most important first.
    pub fn global_importance(
        &self,
        vectors: &[PreprocessedVector],
        scorer: &Scorer,
    ) -> Result<Vec<(String, f64)>> {
        let Some(first) = vectors.first() else {
            return Ok(Vec::new());
        };

        let columns = first.columns();
        let mut totals = vec![0.0; columns.len()];
        for vector in vectors {
            for attribution in self.explain(vector, scorer)?.attributions {
                if let Some(idx) = columns.iter().position(|c| *c == attribution.feature_name) {
                    totals[idx] += attribution.attribution.abs();
                }
            }
        }

        let count = vectors.len() as f64;
        let mut importance: Vec<(String, f64)> = columns
            .iter()
            .cloned()
            .zip(totals.into_iter().map(|t| t / count))
            .collect();
        importance.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(importance)
    }
}

fn render_narrative(category: RiskCategory, probability: f64, top: &[FeatureAttribution]) -> String {
    let mut text = format!(
        "Credit default risk: {} ({:.1}% probability)\n\nKey factors influencing this decision:\n",
        category,
        probability * 100.0
    );
    for (i, factor) in top.iter().enumerate() {
        let _ = writeln!(text, "{}. {}: {}", i + 1, factor.feature_name, factor.direction.as_phrase());
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::{Model, Node, Tree};
    use crate::preprocess::FeatureSchema;
    use crate::scorer::RiskBands;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn schema() -> Arc<FeatureSchema> {
        Arc::new(FeatureSchema {
            version: "t".to_string(),
            columns: vec!["dsr".to_string(), "utilization".to_string(), "unused".to_string()],
        })
    }

    fn scorer() -> Scorer {
        let trees = vec![
            Tree::new(
                vec![
                    Node::internal(0, 0, 0.5, 1, 2, 100.0),
                    Node::internal(1, 1, 0.0, 3, 4, 70.0),
                    Node::leaf(2, 1.2, 30.0),
                    Node::leaf(3, -0.6, 40.0),
                    Node::leaf(4, 0.1, 30.0),
                ],
                1.0,
            ),
            Tree::new(
                vec![
                    Node::internal(0, 1, 0.3, 1, 2, 100.0),
                    Node::leaf(1, -0.2, 55.0),
                    Node::leaf(2, 0.4, 45.0),
                ],
                0.8,
            ),
        ];
        let model = Model::new("test", schema().columns.clone(), trees, -1.0);
        Scorer::new(Arc::new(model), 0.5, RiskBands::default()).unwrap()
    }

    fn vector(values: [f64; 3]) -> PreprocessedVector {
        PreprocessedVector::new(schema(), values.to_vec()).unwrap()
    }

    #[test]
    fn test_conservation() {
        let scorer = scorer();
        let explanation = Explainer::default().explain(&vector([0.9, 0.6, 3.0]), &scorer).unwrap();
        assert!(explanation.conservation_error() < 1e-12);

        let p = scorer.predict(&vector([0.9, 0.6, 3.0])).unwrap();
        assert!((explanation.probability - p).abs() < 1e-15);
    }

    #[test]
    fn test_sorted_by_magnitude_with_directions() {
        let explanation = Explainer::default().explain(&vector([0.9, 0.6, 0.0]), &scorer()).unwrap();

        let magnitudes: Vec<f64> = explanation.attributions.iter().map(|a| a.attribution.abs()).collect();
        assert!(magnitudes.windows(2).all(|w| w[0] >= w[1]));

        let top = &explanation.attributions[0];
        assert_eq!(top.feature_name, "dsr");
        assert_eq!(top.direction, Direction::IncreasesRisk);
        assert_eq!(top.feature_value, 0.9);

        let unused = explanation.attributions.iter().find(|a| a.feature_name == "unused").unwrap();
        assert_eq!(unused.attribution, 0.0);
        assert_eq!(unused.direction, Direction::DecreasesRisk);
    }

    #[test]
    fn test_top_k_keeps_full_set() {
        let explanation = Explainer::new(1).explain(&vector([0.1, -0.5, 0.0]), &scorer()).unwrap();
        assert_eq!(explanation.top_factors().len(), 1);
        assert_eq!(explanation.attributions.len(), 3);

        let wide = Explainer::new(10).explain(&vector([0.1, -0.5, 0.0]), &scorer()).unwrap();
        assert_eq!(wide.top_factors().len(), 3);
    }

    #[test]
    fn test_narrative_template() {
        let explanation = Explainer::new(2).explain(&vector([0.9, 0.6, 0.0]), &scorer()).unwrap();
        let expected_head = format!(
            "Credit default risk: {} ({:.1}% probability)\n\nKey factors influencing this decision:\n",
            explanation.risk_category,
            explanation.probability * 100.0
        );
        assert!(explanation.narrative.starts_with(&expected_head));
        assert!(explanation.narrative.contains("1. dsr: increases risk\n"));
        assert!(explanation.narrative.contains("2. utilization: increases risk\n"));
        assert!(!explanation.narrative.contains("3."));
    }

    #[test]
    fn test_narrative_is_deterministic() {
        let a = Explainer::default().explain(&vector([0.2, 0.1, 0.0]), &scorer()).unwrap();
        let b = Explainer::default().explain(&vector([0.2, 0.1, 0.0]), &scorer()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_global_importance() {
        let scorer = scorer();
        let batch = vec![vector([0.9, 0.6, 0.0]), vector([0.1, -0.5, 1.0]), vector([0.4, 0.4, 2.0])];
        let importance = Explainer::default().global_importance(&batch, &scorer).unwrap();

        assert_eq!(importance.len(), 3);
        assert!(importance.windows(2).all(|w| w[0].1 >= w[1].1));
        assert_eq!(importance.last().unwrap(), &("unused".to_string(), 0.0));

        assert!(Explainer::default().global_importance(&[], &scorer).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn attributions_conserve_probability(
            dsr in -3.0f64..3.0,
            utilization in -3.0f64..3.0,
            other in -3.0f64..3.0,
        ) {
            let explanation = Explainer::default()
                .explain(&vector([dsr, utilization, other]), &scorer())
                .unwrap();
            prop_assert!(explanation.conservation_error() < 1e-9);
            prop_assert!((0.0..=1.0).contains(&explanation.base_value));
        }
    }
}
