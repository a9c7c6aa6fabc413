//! Serve-time application of a fitted preprocessing artifact
//!
//! The artifact is produced offline at training time (standard scaling of
//! numeric columns, one-hot encoding of categorical columns) and is loaded
//! read-only here. Nothing is ever fitted at serve time.
//!
//! Output column order:
//! 1. numeric columns, in artifact order
//! 2. one `<feature>_<CATEGORY>` column per fitted category, per categorical
//!    column, in artifact order

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::canonical::blake3_hex;
use crate::errors::{Result, ScoringError};
use crate::features::{FeatureValue, FeatureVector};

/// Fitted standard scaler for one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    /// Training-set mean
    pub mean: f64,
    /// Training-set standard deviation
    pub scale: f64,
    /// Training-set median, substituted for non-finite inputs
    pub median: f64,
}

/// Fitted one-hot encoder for one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    /// Categories seen at fit time, in output order
    pub categories: Vec<String>,
}

/// On-disk preprocessor artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorArtifact {
    pub version: String,
    pub numeric: Vec<NumericColumn>,
    pub categorical: Vec<CategoricalColumn>,
}

impl PreprocessorArtifact {
    /// Column names produced by this artifact, in output order.
    pub fn output_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.numeric.iter().map(|c| c.name.clone()).collect();
        for column in &self.categorical {
            for category in &column.categories {
                columns.push(format!("{}_{}", column.name, category));
            }
        }
        columns
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.numeric.is_empty() && self.categorical.is_empty() {
            return Err("artifact declares no columns".to_string());
        }

        for column in &self.numeric {
            if !column.mean.is_finite() || !column.median.is_finite() {
                return Err(format!("numeric column '{}' has non-finite statistics", column.name));
            }
            if !column.scale.is_finite() || column.scale <= 0.0 {
                return Err(format!(
                    "numeric column '{}' has invalid scale {}",
                    column.name, column.scale
                ));
            }
        }

        for column in &self.categorical {
            if column.categories.is_empty() {
                return Err(format!("categorical column '{}' has no categories", column.name));
            }
        }

        let mut seen = HashSet::new();
        for name in self.output_columns() {
            if !seen.insert(name.clone()) {
                return Err(format!("duplicate output column '{name}'"));
            }
        }

        Ok(())
    }
}

/// Versioned, ordered list of model input columns.
///
/// Shared by the preprocessor (which produces vectors in this order) and
/// the scorer (whose trees index into it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: String,
    pub columns: Vec<String>,
}

impl FeatureSchema {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Require `other` to name exactly the same columns in the same order.
    pub fn ensure_matches(&self, other: &[String]) -> Result<()> {
        if self.columns.len() != other.len() {
            return Err(ScoringError::SchemaMismatch(format!(
                "schema {} has {} columns, counterpart expects {}",
                self.version,
                self.columns.len(),
                other.len()
            )));
        }

        if let Some((pos, (ours, theirs))) = self
            .columns
            .iter()
            .zip(other)
            .enumerate()
            .find(|(_, (a, b))| a != b)
        {
            return Err(ScoringError::SchemaMismatch(format!(
                "schema {} column {pos} is '{ours}', counterpart expects '{theirs}'",
                self.version
            )));
        }

        Ok(())
    }
}

/// Model-ready vector in schema order
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedVector {
    schema: Arc<FeatureSchema>,
    values: Vec<f64>,
}

impl PreprocessedVector {
    /// Build a vector directly; the length must match the schema.
    pub fn new(schema: Arc<FeatureSchema>, values: Vec<f64>) -> Result<Self> {
        if values.len() != schema.len() {
            return Err(ScoringError::SchemaMismatch(format!(
                "vector has {} values, schema {} has {} columns",
                values.len(),
                schema.version,
                schema.len()
            )));
        }
        Ok(Self { schema, values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn columns(&self) -> &[String] {
        &self.schema.columns
    }

    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }
}

/// Loaded, validated preprocessor. Immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    artifact: PreprocessorArtifact,
    schema: Arc<FeatureSchema>,
    fingerprint: String,
}

impl Preprocessor {
    pub fn from_artifact(artifact: PreprocessorArtifact) -> Result<Self> {
        artifact
            .validate()
            .map_err(|reason| ScoringError::artifact_load("<preprocessor>", reason))?;

        let fingerprint = blake3_hex(&artifact)?;
        let schema = Arc::new(FeatureSchema {
            version: artifact.version.clone(),
            columns: artifact.output_columns(),
        });

        Ok(Self {
            artifact,
            schema,
            fingerprint,
        })
    }

    /// Load and validate a JSON preprocessor artifact.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading preprocessor from: {}", path.display());

        let json = fs::read_to_string(path).map_err(|e| ScoringError::artifact_load(path, e))?;
        let artifact: PreprocessorArtifact =
            serde_json::from_str(&json).map_err(|e| ScoringError::artifact_load(path, e))?;

        let preprocessor = Self::from_artifact(artifact).map_err(|e| match e {
            ScoringError::ArtifactLoad { reason, .. } => ScoringError::artifact_load(path, reason),
            other => other,
        })?;

        info!(
            version = %preprocessor.version(),
            columns = preprocessor.schema.len(),
            "Preprocessor loaded"
        );
        Ok(preprocessor)
    }

    pub fn version(&self) -> &str {
        &self.artifact.version
    }

    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    pub fn artifact(&self) -> &PreprocessorArtifact {
        &self.artifact
    }

    /// Blake3 fingerprint of the canonical artifact JSON
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Apply the fitted transformation.
    ///
    /// A feature the artifact expects but the vector lacks (or carries with
    /// the wrong kind) is a version skew between deriver and artifact and
    /// fails with `SchemaMismatch`.
    pub fn transform(&self, features: &FeatureVector) -> Result<PreprocessedVector> {
        let mut values = Vec::with_capacity(self.schema.len());

        for column in &self.artifact.numeric {
            let raw = match features.get(&column.name) {
                Some(FeatureValue::Numeric(v)) => *v,
                Some(FeatureValue::Categorical(_)) => {
                    return Err(self.skew(&column.name, "is categorical, expected numeric"))
                }
                None => return Err(self.skew(&column.name, "is missing")),
            };

            let clean = if raw.is_finite() {
                raw
            } else {
                debug!(column = %column.name, "non-finite input imputed with median");
                column.median
            };
            values.push((clean - column.mean) / column.scale);
        }

        for column in &self.artifact.categorical {
            let category = match features.get(&column.name) {
                Some(FeatureValue::Categorical(c)) => c.as_str(),
                Some(FeatureValue::Numeric(_)) => {
                    return Err(self.skew(&column.name, "is numeric, expected categorical"))
                }
                None => return Err(self.skew(&column.name, "is missing")),
            };

            // Unseen categories encode to all zeros.
            values.extend(
                column
                    .categories
                    .iter()
                    .map(|known| if known == category { 1.0 } else { 0.0 }),
            );
        }

        PreprocessedVector::new(Arc::clone(&self.schema), values)
    }

    fn skew(&self, column: &str, problem: &str) -> ScoringError {
        ScoringError::SchemaMismatch(format!(
            "feature '{column}' {problem} (preprocessor {})",
            self.artifact.version
        ))
    }
}

#[cfg(test)]
pub(crate) fn sample_artifact() -> PreprocessorArtifact {
    PreprocessorArtifact {
        version: "test-1".to_string(),
        numeric: vec![
            NumericColumn {
                name: "debt_service_ratio".to_string(),
                mean: 0.2,
                scale: 0.25,
                median: 0.12,
            },
            NumericColumn {
                name: "past_delinquencies".to_string(),
                mean: 0.6,
                scale: 1.0,
                median: 0.0,
            },
        ],
        categorical: vec![CategoricalColumn {
            name: "housing_type".to_string(),
            categories: vec!["OWNED".to_string(), "PARENTS".to_string(), "RENTED".to_string()],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::sample_application;
    use crate::features::{derive_features, FeatureConfig};
    use tempfile::NamedTempFile;

    fn preprocessor() -> Preprocessor {
        Preprocessor::from_artifact(sample_artifact()).unwrap()
    }

    #[test]
    fn test_output_columns_order() {
        assert_eq!(
            sample_artifact().output_columns(),
            vec![
                "debt_service_ratio",
                "past_delinquencies",
                "housing_type_OWNED",
                "housing_type_PARENTS",
                "housing_type_RENTED",
            ]
        );
    }

    #[test]
    fn test_transform_scales_and_encodes() {
        let mut features = FeatureVector::new();
        features.insert_numeric("debt_service_ratio", 0.45);
        features.insert_numeric("past_delinquencies", 2.6);
        features.insert_category("housing_type", "RENTED");

        let vector = preprocessor().transform(&features).unwrap();
        let values = vector.values();
        assert_eq!(values.len(), 5);
        assert!((values[0] - 1.0).abs() < 1e-12);
        assert!((values[1] - 2.0).abs() < 1e-12);
        assert_eq!(&values[2..], &[0.0, 0.0, 1.0]);
        assert_eq!(vector.columns()[4], "housing_type_RENTED");
    }

    #[test]
    fn test_unknown_category_is_all_zeros() {
        let mut features = FeatureVector::new();
        features.insert_numeric("debt_service_ratio", 0.2);
        features.insert_numeric("past_delinquencies", 0.6);
        features.insert_category("housing_type", "BOARDING");

        let vector = preprocessor().transform(&features).unwrap();
        assert_eq!(&vector.values()[2..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_non_finite_input_uses_median() {
        let mut features = FeatureVector::new();
        features.insert_numeric("debt_service_ratio", f64::NAN);
        features.insert_numeric("past_delinquencies", 0.6);
        features.insert_category("housing_type", "OWNED");

        let vector = preprocessor().transform(&features).unwrap();
        assert!(((vector.values()[0]) - (0.12 - 0.2) / 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_missing_feature_is_schema_mismatch() {
        let mut features = FeatureVector::new();
        features.insert_numeric("debt_service_ratio", 0.2);
        features.insert_category("housing_type", "OWNED");

        let err = preprocessor().transform(&features).unwrap_err();
        assert!(matches!(err, ScoringError::SchemaMismatch(ref m) if m.contains("past_delinquencies")));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_wrong_kind_is_schema_mismatch() {
        let mut features = FeatureVector::new();
        features.insert_numeric("debt_service_ratio", 0.2);
        features.insert_numeric("past_delinquencies", 0.0);
        features.insert_numeric("housing_type", 1.0);

        assert!(matches!(
            preprocessor().transform(&features),
            Err(ScoringError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_extra_features_are_ignored() {
        let features = derive_features(&sample_application(), &FeatureConfig::default()).unwrap();
        let vector = preprocessor().transform(&features).unwrap();
        assert_eq!(vector.values().len(), 5);
        assert_eq!(&vector.values()[2..], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_invalid_artifacts_are_rejected() {
        let mut bad_scale = sample_artifact();
        bad_scale.numeric[0].scale = 0.0;
        assert!(matches!(
            Preprocessor::from_artifact(bad_scale),
            Err(ScoringError::ArtifactLoad { .. })
        ));

        let mut duplicate = sample_artifact();
        duplicate.numeric.push(duplicate.numeric[0].clone());
        assert!(Preprocessor::from_artifact(duplicate).is_err());

        let mut empty_categories = sample_artifact();
        empty_categories.categorical[0].categories.clear();
        assert!(Preprocessor::from_artifact(empty_categories).is_err());
    }

    #[test]
    fn test_schema_match_check() {
        let pre = preprocessor();
        let mut columns = pre.schema().columns.clone();
        assert!(pre.schema().ensure_matches(&columns).is_ok());

        columns.swap(0, 1);
        let err = pre.schema().ensure_matches(&columns).unwrap_err();
        assert!(matches!(err, ScoringError::SchemaMismatch(ref m) if m.contains("column 0")));

        columns.pop();
        assert!(pre.schema().ensure_matches(&columns).is_err());
    }

    #[test]
    fn test_vector_length_is_enforced() {
        let pre = preprocessor();
        assert!(PreprocessedVector::new(Arc::clone(pre.schema()), vec![0.0; 4]).is_err());
        assert!(PreprocessedVector::new(Arc::clone(pre.schema()), vec![0.0; 5]).is_ok());
    }

    #[test]
    fn test_load_json_roundtrip_and_fingerprint() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), serde_json::to_string_pretty(&sample_artifact()).unwrap()).unwrap();

        let loaded = Preprocessor::load_json(file.path()).unwrap();
        assert_eq!(loaded.version(), "test-1");
        assert_eq!(loaded.fingerprint(), preprocessor().fingerprint());
        assert_eq!(loaded.fingerprint().len(), 64);
    }

    #[test]
    fn test_load_missing_file_is_artifact_error() {
        let err = Preprocessor::load_json("/nonexistent/preprocessor.json").unwrap_err();
        assert!(matches!(err, ScoringError::ArtifactLoad { ref path, .. } if path.contains("preprocessor.json")));
    }
}
