//! Credit default risk scoring core
//!
//! Scores a loan application, explains the score feature by feature and
//! records every decision on a PII-masked, append-only audit trail.
//!
//! Modules:
//! - `application`: Input record and structural validation
//! - `features`: Regulatory derived features and risk flags
//! - `preprocess`: Fitted, versioned encoding and scaling
//! - `gbdt`: Gradient boosted tree inference and TreeSHAP
//! - `scorer`: Probability, risk bands and the approve/reject decision
//! - `explain`: Probability-space attributions and narrative
//! - `audit`: PII masking, audit sinks, query and export
//! - `config`: Typed configuration (defaults, TOML, environment)
//! - `pipeline`: The end-to-end scoring transaction

pub mod application;
pub mod audit;
pub mod canonical;
pub mod config;
pub mod errors;
pub mod explain;
pub mod features;
pub mod gbdt;
pub mod pipeline;
pub mod preprocess;
pub mod scorer;

pub use application::CreditApplication;
pub use audit::{AuditQuery, AuditRecord, AuditRecorder, AuditSink, CsvAuditSink, MemoryAuditSink};
pub use config::ScoringConfig;
pub use errors::{Result, ScoringError};
pub use explain::{Direction, Explainer, Explanation, FeatureAttribution};
pub use features::{derive_features, FeatureConfig, FeatureVector};
pub use pipeline::{CreditScoringPipeline, Degradation, PipelineInfo, ScoringResponse};
pub use preprocess::{FeatureSchema, PreprocessedVector, Preprocessor};
pub use scorer::{Decision, RiskBands, RiskCategory, ScoreResult, Scorer};

/// Crate version string for reports
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
