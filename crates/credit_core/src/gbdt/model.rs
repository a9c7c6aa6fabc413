//! GBDT binary classifier with a logistic link
//!
//! Implements:
//! - Margin accumulation over weighted trees
//! - Sigmoid probability output
//! - Canonical JSON serialization and Blake3 model hashing
//! - Margin-space TreeSHAP aggregation

use super::tree::Tree;
use crate::canonical::{blake3_hex, to_canonical_json};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Only supported model file format version
pub const FORMAT_VERSION: i32 = 1;

/// Only supported training objective
pub const OBJECTIVE_BINARY_LOGISTIC: &str = "binary:logistic";

/// GBDT Model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("Feature count mismatch: model expects {expected}, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid model format: {0}")]
    InvalidFormat(String),
}

/// Logistic function, stable for large |x|.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Gradient boosted ensemble producing a default probability.
///
/// `margin(x) = base_score + Σ weight_t · leaf_t(x)` and
/// `P(default) = sigmoid(margin)`. Trees index into a vector ordered as
/// `feature_names`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    /// Model format version (always 1 for now)
    pub version: i32,

    /// Release identifier recorded in audit entries
    pub model_version: String,

    /// Training objective; only `binary:logistic` is accepted
    pub objective: String,

    /// Margin-space intercept
    pub base_score: f64,

    /// Input column names, in vector order
    pub feature_names: Vec<String>,

    /// Decision trees in the ensemble
    pub trees: Vec<Tree>,
}

impl Model {
    /// Create a new binary logistic model
    pub fn new(
        model_version: impl Into<String>,
        feature_names: Vec<String>,
        trees: Vec<Tree>,
        base_score: f64,
    ) -> Self {
        Self {
            version: FORMAT_VERSION,
            model_version: model_version.into(),
            objective: OBJECTIVE_BINARY_LOGISTIC.to_string(),
            base_score,
            feature_names,
            trees,
        }
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != FORMAT_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if self.objective != OBJECTIVE_BINARY_LOGISTIC {
            return Err(ModelError::InvalidFormat(format!(
                "Unsupported objective '{}', expected '{}'",
                self.objective, OBJECTIVE_BINARY_LOGISTIC
            )));
        }

        if self.model_version.trim().is_empty() {
            return Err(ModelError::ValidationFailed(
                "model_version must not be empty".to_string(),
            ));
        }

        if !self.base_score.is_finite() {
            return Err(ModelError::ValidationFailed(format!(
                "Invalid base_score: {}",
                self.base_score
            )));
        }

        if self.feature_names.is_empty() {
            return Err(ModelError::ValidationFailed(
                "Model declares no feature names".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(self.feature_names.len());
        for name in &self.feature_names {
            if !seen.insert(name.as_str()) {
                return Err(ModelError::ValidationFailed(format!(
                    "Duplicate feature name: {name}"
                )));
            }
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| {
                ModelError::ValidationFailed(format!("Tree {} validation failed: {}", i, e))
            })?;

            if let Some(max) = tree.max_feature_index() {
                if max >= self.feature_names.len() {
                    return Err(ModelError::ValidationFailed(format!(
                        "Tree {i} splits on feature {max}, model has {} features",
                        self.feature_names.len()
                    )));
                }
            }
        }

        Ok(())
    }

    fn check_width(&self, features: &[f64]) -> Result<(), ModelError> {
        if features.len() != self.feature_names.len() {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.feature_names.len(),
                actual: features.len(),
            });
        }
        Ok(())
    }

    /// Raw margin (log-odds) for a feature vector
    pub fn margin(&self, features: &[f64]) -> Result<f64, ModelError> {
        self.check_width(features)?;
        Ok(self
            .trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.weight * tree.evaluate(features)))
    }

    /// Default probability in [0, 1]
    pub fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError> {
        Ok(sigmoid(self.margin(features)?))
    }

    /// Margin of an applicant about whom nothing is known, under the
    /// training cover distribution.
    pub fn expected_margin(&self) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + tree.weight * tree.expected_value())
    }

    /// Per-feature Shapley values of the margin.
    ///
    /// `expected_margin() + Σ φ == margin(features)` up to float rounding.
    pub fn shap_values(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        self.check_width(features)?;
        let mut phi = vec![0.0; self.feature_names.len()];
        for tree in &self.trees {
            tree.accumulate_shap(features, &mut phi);
        }
        Ok(phi)
    }

    /// Serialize model to canonical JSON (sorted keys, no whitespace)
    pub fn to_canonical_json(&self) -> Result<String, ModelError> {
        Ok(to_canonical_json(self)?)
    }

    /// Compute model hash as hex string
    pub fn hash_hex(&self) -> Result<String, ModelError> {
        Ok(blake3_hex(self)?)
    }

    /// Save model to JSON file with canonical serialization
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        let json = self.to_canonical_json()?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load and validate a model from a JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let json = fs::read_to_string(path)?;
        let model: Model = serde_json::from_str(&json)?;
        model.validate()?;
        Ok(model)
    }

    /// Get number of trees in the model
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }
}
