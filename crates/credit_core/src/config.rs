//! Scoring configuration
//!
//! Layered as defaults < TOML file < `KREDITAX_*` environment variables,
//! then validated once before any component is built.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::audit::{DEFAULT_MAX_QUERY_LIMIT, DEFAULT_ROUNDING_UNIT, DEFAULT_SUMMARY_MAX_CHARS};
use crate::errors::{Result, ScoringError};
use crate::explain::DEFAULT_TOP_K;
use crate::features::FeatureConfig;
use crate::scorer::RiskBands;

pub const ENV_PREFIX: &str = "KREDITAX_";

/// Complete core configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Probability at or above which an application is rejected
    pub risk_threshold: f64,
    /// Six ascending breakpoints from 0.0 to 1.0
    pub risk_category_boundaries: Vec<f64>,
    pub explainability_enabled: bool,
    pub audit_logging_enabled: bool,
    pub top_k_features: usize,
    /// Granularity (IDR) monetary fields are rounded to before fingerprinting
    pub monetary_rounding_unit: u64,
    pub max_audit_query_limit: usize,
    /// Overrides the version tag recorded in audit entries
    pub model_version: Option<String>,
    pub features: FeatureConfig,
    pub artifacts: ArtifactConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub model_path: PathBuf,
    pub preprocessor_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// CSV audit trail location
    pub log_path: PathBuf,
    pub summary_max_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            risk_threshold: 0.5,
            risk_category_boundaries: vec![0.0, 0.2, 0.4, 0.6, 0.8, 1.0],
            explainability_enabled: true,
            audit_logging_enabled: true,
            top_k_features: DEFAULT_TOP_K,
            monetary_rounding_unit: DEFAULT_ROUNDING_UNIT,
            max_audit_query_limit: DEFAULT_MAX_QUERY_LIMIT,
            model_version: None,
            features: FeatureConfig::default(),
            artifacts: ArtifactConfig::default(),
            audit: AuditConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("artifacts/model.json"),
            preprocessor_path: PathBuf::from("artifacts/preprocessor.json"),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("data/audit_logs.csv"),
            summary_max_chars: DEFAULT_SUMMARY_MAX_CHARS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn parse_env<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ScoringError::InvalidConfig(format!("{key}={raw:?}: {e}")))
}

fn parse_boundaries(key: &str, raw: &str) -> Result<Vec<f64>> {
    raw.split(',').map(|part| parse_env(key, part)).collect()
}

impl ScoringConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ScoringError::InvalidConfig(e.to_string()))
    }

    /// Load from a TOML file without applying the environment.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| ScoringError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Defaults (or `path` when given) overlaid with the process
    /// environment, then validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `KREDITAX_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay `KREDITAX_*` variables supplied by `lookup`.
    ///
    /// A variable that is present but unparseable is an error.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key).map(|value| (key, value))
        };

        if let Some((k, v)) = var("RISK_THRESHOLD") {
            self.risk_threshold = parse_env(&k, &v)?;
        }
        if let Some((k, v)) = var("RISK_CATEGORY_BOUNDARIES") {
            self.risk_category_boundaries = parse_boundaries(&k, &v)?;
        }
        if let Some((k, v)) = var("EXPLAINABILITY_ENABLED") {
            self.explainability_enabled = parse_env(&k, &v)?;
        }
        if let Some((k, v)) = var("AUDIT_LOGGING_ENABLED") {
            self.audit_logging_enabled = parse_env(&k, &v)?;
        }
        if let Some((k, v)) = var("TOP_K_FEATURES") {
            self.top_k_features = parse_env(&k, &v)?;
        }
        if let Some((k, v)) = var("MONETARY_ROUNDING_UNIT") {
            self.monetary_rounding_unit = parse_env(&k, &v)?;
        }
        if let Some((k, v)) = var("MAX_AUDIT_QUERY_LIMIT") {
            self.max_audit_query_limit = parse_env(&k, &v)?;
        }
        if let Some((_, v)) = var("MODEL_VERSION") {
            self.model_version = Some(v);
        }

        if let Some((k, v)) = var("DSR_CEILING") {
            self.features.dsr_ceiling = parse_env(&k, &v)?;
        }
        if let Some((k, v)) = var("UTILIZATION_CEILING") {
            self.features.utilization_ceiling = parse_env(&k, &v)?;
        }
        if let Some((k, v)) = var("MAX_DELINQUENCIES") {
            self.features.max_delinquencies = parse_env(&k, &v)?;
        }

        if let Some((_, v)) = var("MODEL_PATH") {
            self.artifacts.model_path = PathBuf::from(v);
        }
        if let Some((_, v)) = var("PREPROCESSOR_PATH") {
            self.artifacts.preprocessor_path = PathBuf::from(v);
        }
        if let Some((_, v)) = var("AUDIT_LOG_PATH") {
            self.audit.log_path = PathBuf::from(v);
        }
        if let Some((k, v)) = var("AUDIT_SUMMARY_MAX_CHARS") {
            self.audit.summary_max_chars = parse_env(&k, &v)?;
        }

        if let Some((_, v)) = var("LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some((_, v)) = var("LOG_FORMAT") {
            self.logging.format = v;
        }

        Ok(())
    }

    /// Reject values no component could run with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.risk_threshold) {
            return Err(ScoringError::InvalidConfig(format!(
                "risk_threshold must be within [0, 1], got {}",
                self.risk_threshold
            )));
        }
        RiskBands::new(&self.risk_category_boundaries)?;

        if self.top_k_features == 0 {
            return Err(ScoringError::InvalidConfig(
                "top_k_features must be at least 1".to_string(),
            ));
        }
        if self.monetary_rounding_unit == 0 {
            return Err(ScoringError::InvalidConfig(
                "monetary_rounding_unit must be at least 1".to_string(),
            ));
        }
        if self.max_audit_query_limit == 0 {
            return Err(ScoringError::InvalidConfig(
                "max_audit_query_limit must be at least 1".to_string(),
            ));
        }
        if matches!(&self.model_version, Some(v) if v.trim().is_empty()) {
            return Err(ScoringError::InvalidConfig(
                "model_version override must not be empty".to_string(),
            ));
        }

        self.features.validate()?;

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ScoringError::InvalidConfig(format!(
                "logging.format must be \"pretty\" or \"json\", got {:?}",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Risk bands for the scorer; call after `validate`.
    pub fn risk_bands(&self) -> Result<RiskBands> {
        RiskBands::new(&self.risk_category_boundaries)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ScoringError::InvalidConfig(format!("Failed to serialize config: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }
}
