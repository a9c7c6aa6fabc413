//! Scoring transaction: derive → preprocess → score → explain → audit
//!
//! Artifacts are loaded once and shared read-only; the audit sink is the
//! only state mutated per request. Explanation and audit failures never
//! mask a decision but are surfaced in the response and the log.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::application::CreditApplication;
use crate::audit::{AuditQuery, AuditRecord, AuditRecorder, AuditSink, CsvAuditSink};
use crate::config::ScoringConfig;
use crate::errors::{Result, ScoringError};
use crate::explain::{Explainer, Explanation};
use crate::features::derive_features;
use crate::gbdt::Model;
use crate::preprocess::Preprocessor;
use crate::scorer::{Decision, RiskCategory, ScoreResult, Scorer};

/// Best-effort stage that did not complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    ExplainabilityDegraded { reason: String },
    AuditWriteFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResponse {
    pub request_id: String,
    pub probability: f64,
    pub risk_category: RiskCategory,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
    pub model_version: String,
    pub audit_recorded: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
}

impl ScoringResponse {
    pub fn score_result(&self) -> ScoreResult {
        ScoreResult {
            probability: self.probability,
            risk_category: self.risk_category,
            decision: self.decision,
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Deployment summary for operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub model_version: String,
    pub model_hash: String,
    pub num_trees: usize,
    pub preprocessor_version: String,
    pub preprocessor_fingerprint: String,
    pub feature_count: usize,
    pub risk_threshold: f64,
    pub risk_category_boundaries: Vec<f64>,
    pub explainability_enabled: bool,
    pub audit_logging_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct CreditScoringPipeline {
    config: ScoringConfig,
    preprocessor: Arc<Preprocessor>,
    scorer: Scorer,
    explainer: Explainer,
    recorder: AuditRecorder,
    model_version: String,
    model_hash: String,
}

impl CreditScoringPipeline {
    /// Load both artifacts and open the CSV audit trail named by `config`.
    ///
    /// Any failure here is fatal: the pipeline must not serve without valid
    /// artifacts.
    pub fn from_config(config: ScoringConfig) -> Result<Self> {
        config.validate()?;

        let preprocessor = Preprocessor::load_json(&config.artifacts.preprocessor_path)?;

        let model_path = &config.artifacts.model_path;
        info!("Loading model from: {}", model_path.display());
        let model = Model::load_json(model_path).map_err(|e| ScoringError::artifact_load(model_path, e))?;

        let sink = CsvAuditSink::open(&config.audit.log_path)?;
        Self::from_parts(config, preprocessor, model, Arc::new(sink))
    }

    /// Assemble from already-loaded artifacts and an arbitrary audit sink.
    pub fn from_parts(
        config: ScoringConfig,
        preprocessor: Preprocessor,
        model: Model,
        sink: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        config.validate()?;

        // Version skew between the two artifacts is caught here, never per request.
        preprocessor.schema().ensure_matches(&model.feature_names)?;

        let model_hash = model.hash_hex()?;
        let model_version = config
            .model_version
            .clone()
            .unwrap_or_else(|| model.model_version.clone());

        let scorer = Scorer::new(Arc::new(model), config.risk_threshold, config.risk_bands()?)?;
        let explainer = Explainer::new(config.top_k_features);
        let recorder = AuditRecorder::new(sink)
            .with_rounding_unit(config.monetary_rounding_unit)
            .with_summary_max_chars(config.audit.summary_max_chars)
            .with_max_query_limit(config.max_audit_query_limit);

        info!(
            model_version = %model_version,
            model_hash = %model_hash,
            preprocessor_version = %preprocessor.version(),
            features = preprocessor.schema().len(),
            explainability = config.explainability_enabled,
            audit = config.audit_logging_enabled,
            "Scoring pipeline ready"
        );

        Ok(Self {
            config,
            preprocessor: Arc::new(preprocessor),
            scorer,
            explainer,
            recorder,
            model_version,
            model_hash,
        })
    }

    /// Score one application.
    ///
    /// Fails only on invalid input or artifact skew; in both cases no
    /// decision has been taken and nothing is audited.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty))]
    pub fn score(
        &self,
        app: &CreditApplication,
        request_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<ScoringResponse> {
        let request_id = match request_id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        tracing::Span::current().record("request_id", request_id.as_str());

        let features = derive_features(app, &self.config.features)?;
        let vector = self.preprocessor.transform(&features)?;
        let result = self.scorer.score(&vector)?;
        debug!(
            probability = result.probability,
            risk_category = %result.risk_category,
            decision = %result.decision,
            "Application scored"
        );

        let mut degradations = Vec::new();

        let explanation = if self.config.explainability_enabled {
            match self.explainer.explain(&vector, &self.scorer) {
                Ok(explanation) => Some(explanation),
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "Explanation unavailable, returning score only");
                    degradations.push(Degradation::ExplainabilityDegraded { reason: e.to_string() });
                    None
                }
            }
        } else {
            None
        };

        let audit_recorded = if self.config.audit_logging_enabled {
            match self.recorder.record(
                &request_id,
                app,
                &result,
                explanation.as_ref(),
                &self.model_version,
                user_id,
            ) {
                Ok(_) => true,
                Err(e) => {
                    error!(request_id = %request_id, error = %e, "Audit write failed; decision is not on the audit trail");
                    degradations.push(Degradation::AuditWriteFailed { reason: e.to_string() });
                    false
                }
            }
        } else {
            false
        };

        Ok(ScoringResponse {
            request_id,
            probability: result.probability,
            risk_category: result.risk_category,
            decision: result.decision,
            explanation,
            model_version: self.model_version.clone(),
            audit_recorded,
            degradations,
        })
    }

    pub fn query_audit(&self, query: &AuditQuery) -> Result<Vec<AuditRecord>> {
        self.recorder.query(query)
    }

    /// CSV bytes, header row included
    pub fn export_audit(&self, query: &AuditQuery) -> Result<Vec<u8>> {
        self.recorder.export(query)
    }

    pub fn describe(&self) -> PipelineInfo {
        PipelineInfo {
            model_version: self.model_version.clone(),
            model_hash: self.model_hash.clone(),
            num_trees: self.scorer.model().num_trees(),
            preprocessor_version: self.preprocessor.version().to_string(),
            preprocessor_fingerprint: self.preprocessor.fingerprint().to_string(),
            feature_count: self.preprocessor.schema().len(),
            risk_threshold: self.scorer.threshold(),
            risk_category_boundaries: self.scorer.bands().boundaries().to_vec(),
            explainability_enabled: self.config.explainability_enabled,
            audit_logging_enabled: self.config.audit_logging_enabled,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn preprocessor(&self) -> &Arc<Preprocessor> {
        &self.preprocessor
    }
}
