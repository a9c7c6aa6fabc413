//! Gradient Boosted Decision Tree inference with exact attributions
//!
//! The ensemble is a binary classifier with a logistic link: trees sum to a
//! margin, and the sigmoid of that margin is the default probability.
//!
//! - **Deterministic traversal**: `value <= threshold` goes left
//! - **Canonical serialization**: sorted JSON keys for reproducible hashing
//! - **Blake3 hashing**: model identity for audit and deployment checks
//! - **TreeSHAP**: exact path-dependent Shapley values using node covers
//!
//! # Model Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "model_version": "xgboost-1.0.0",
//!   "objective": "binary:logistic",
//!   "base_score": -1.1,
//!   "feature_names": ["age", "debt_service_ratio"],
//!   "trees": [
//!     {
//!       "nodes": [
//!         {"id":0,"left":1,"right":2,"feature_idx":1,"threshold":0.6,"leaf":null,"cover":840.0},
//!         {"id":1,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"leaf":-0.3,"cover":680.0},
//!         {"id":2,"left":-1,"right":-1,"feature_idx":-1,"threshold":0.0,"leaf":0.9,"cover":160.0}
//!       ],
//!       "weight": 1.0
//!     }
//!   ]
//! }
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use kreditax_core::gbdt::{Model, Node, Tree};
//!
//! let tree = Tree::new(
//!     vec![
//!         Node::internal(0, 0, 0.5, 1, 2, 100.0),
//!         Node::leaf(1, -0.4, 70.0),
//!         Node::leaf(2, 0.9, 30.0),
//!     ],
//!     1.0,
//! );
//! let model = Model::new("demo-1", vec!["dsr".to_string()], vec![tree], -1.0);
//!
//! let p = model.predict_proba(&[0.8]).unwrap();
//! let phi = model.shap_values(&[0.8]).unwrap();
//! let hash = model.hash_hex().unwrap();
//! ```

pub mod model;
pub mod shap;
pub mod tree;

pub use model::{sigmoid, Model, ModelError, FORMAT_VERSION, OBJECTIVE_BINARY_LOGISTIC};
pub use tree::{Node, Tree};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::path::PathBuf;

    fn shipped_model() -> Model {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("artifacts/model.json");
        Model::load_json(path).unwrap()
    }

    #[test]
    fn test_shipped_model_is_valid() {
        let model = shipped_model();
        assert_eq!(model.model_version, "xgboost-1.0.0");
        assert_eq!(model.num_features(), 35);
        assert!(model.num_trees() > 0);
    }

    #[test]
    fn test_shipped_model_conserves_margin() {
        let model = shipped_model();
        let mut features = vec![0.0; model.num_features()];
        for (i, value) in features.iter_mut().enumerate() {
            *value = (i as f64 * 0.37).sin() * 2.0;
        }

        let phi = model.shap_values(&features).unwrap();
        let margin = model.margin(&features).unwrap();
        let total: f64 = phi.iter().sum();
        assert!((model.expected_margin() + total - margin).abs() < 1e-9);
    }

    #[test]
    fn test_canonical_form_roundtrips_hash() {
        let model = shipped_model();
        let json = model.to_canonical_json().unwrap();
        assert!(!json.contains('\n'));

        let reparsed: Model = serde_json::from_str(&json).unwrap();
        assert_eq!(model.hash_hex().unwrap(), reparsed.hash_hex().unwrap());
    }

    #[test]
    fn test_inference_is_deterministic() {
        let model = shipped_model();
        let features = vec![0.25; model.num_features()];
        let p1 = model.predict_proba(&features).unwrap();
        let p2 = model.predict_proba(&features).unwrap();
        assert_eq!(p1.to_bits(), p2.to_bits());
        assert!((0.0..=1.0).contains(&p1));
    }
}
