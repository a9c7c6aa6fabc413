//! Persisted audit row

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scorer::{Decision, RiskCategory};

/// Column order of the persisted and exported format.
pub const AUDIT_COLUMNS: [&str; 9] = [
    "request_id",
    "timestamp",
    "model_version",
    "prediction_score",
    "risk_category",
    "decision",
    "explanation_summary",
    "masked_features_hash",
    "user_id",
];

pub const NO_EXPLANATION: &str = "No explanation available";

/// One scoring decision. Immutable once written.
///
/// Field order is the CSV column order; do not reorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub model_version: String,
    /// Probability rounded to 4 decimals
    pub prediction_score: f64,
    pub risk_category: RiskCategory,
    pub decision: Decision,
    pub explanation_summary: String,
    pub masked_features_hash: String,
    pub user_id: Option<String>,
}

/// Round a probability to the 4 decimals stored in the trail.
pub fn round_score(probability: f64) -> f64 {
    (probability * 10_000.0).round() / 10_000.0
}

/// Truncate to `max_chars` characters, marking the cut with `...`.
pub fn summarize(text: Option<&str>, max_chars: usize) -> String {
    match text {
        None => NO_EXPLANATION.to_string(),
        Some(text) if text.chars().count() > max_chars => {
            let mut cut: String = text.chars().take(max_chars).collect();
            cut.push_str("...");
            cut
        }
        Some(text) => text.to_string(),
    }
}

#[cfg(test)]
pub(crate) fn sample_record(request_id: &str, timestamp: DateTime<Utc>) -> AuditRecord {
    AuditRecord {
        request_id: request_id.to_string(),
        timestamp,
        model_version: "xgboost-1.0.0".to_string(),
        prediction_score: 0.0817,
        risk_category: RiskCategory::VeryLow,
        decision: Decision::Approve,
        explanation_summary: "Credit default risk: VERY_LOW (8.2% probability)\n\n1. a, b".to_string(),
        masked_features_hash: "ab".repeat(32),
        user_id: None,
    }
}
