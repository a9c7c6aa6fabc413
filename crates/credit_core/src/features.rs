//! Regulatory feature derivation
//!
//! Turns a [`CreditApplication`] into a named [`FeatureVector`]: the raw
//! application fields plus the POJK indicators (debt service ratio,
//! income-to-loan ratio, disposable income) and boolean risk flags.
//!
//! Derivation is pure: the same application and thresholds always produce
//! the same vector, and no ratio can become NaN or infinite.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::application::CreditApplication;
use crate::errors::{Result, ScoringError};

pub const DEBT_SERVICE_RATIO: &str = "debt_service_ratio";
pub const INCOME_TO_LOAN_RATIO: &str = "income_to_loan_ratio";
pub const DISPOSABLE_INCOME: &str = "disposable_income";
pub const MONTHLY_INSTALLMENT: &str = "monthly_installment";
pub const IS_HIGH_RISK_DSR: &str = "is_high_risk_dsr";
pub const IS_HIGH_UTILIZATION: &str = "is_high_utilization";
pub const HAS_DELINQUENCY: &str = "has_delinquency";

/// Thresholds for the regulatory risk flags.
///
/// Tunable without retraining; the flags are inputs to the model, the
/// thresholds are not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// DSR strictly above this raises `is_high_risk_dsr`
    pub dsr_ceiling: f64,
    /// Utilization strictly above this raises `is_high_utilization`
    pub utilization_ceiling: f64,
    /// Delinquency count strictly above this raises `has_delinquency`
    pub max_delinquencies: u32,
    /// Denominator floor for ratio features
    pub epsilon: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            dsr_ceiling: 0.4,
            utilization_ceiling: 0.8,
            max_delinquencies: 0,
            epsilon: 1e-6,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("features.dsr_ceiling", self.dsr_ceiling),
            ("features.utilization_ceiling", self.utilization_ceiling),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ScoringError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(ScoringError::InvalidConfig(format!(
                "features.epsilon must be finite and positive, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// A single named feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Numeric(f64),
    Categorical(String),
}

impl FeatureValue {
    pub fn as_numeric(&self) -> Option<f64> {
        match self {
            FeatureValue::Numeric(v) => Some(*v),
            FeatureValue::Categorical(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            FeatureValue::Categorical(c) => Some(c.as_str()),
            FeatureValue::Numeric(_) => None,
        }
    }
}

/// Named features for one application, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: BTreeMap<String, FeatureValue>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_numeric(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), FeatureValue::Numeric(value));
    }

    pub fn insert_category(&mut self, name: &str, value: &str) {
        self.values
            .insert(name.to_string(), FeatureValue::Categorical(value.to_string()));
    }

    pub fn insert_flag(&mut self, name: &str, raised: bool) {
        self.insert_numeric(name, if raised { 1.0 } else { 0.0 });
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.get(name)
    }

    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(FeatureValue::as_numeric)
    }

    pub fn remove(&mut self, name: &str) -> Option<FeatureValue> {
        self.values.remove(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FeatureValue)> {
        self.values.iter()
    }
}

/// `numerator / max(denominator, eps)`, saturating at `f64::MAX`.
fn bounded_ratio(numerator: f64, denominator: f64, eps: f64) -> f64 {
    (numerator / denominator.max(eps)).min(f64::MAX)
}

/// Derive the full feature vector for an application.
///
/// Formulas:
/// - `debt_service_ratio = total_existing_debt / max(annual_income, ε)`
/// - `income_to_loan_ratio = annual_income / max(loan_amount, ε)`
/// - `disposable_income = annual_income - total_existing_debt`
/// - `monthly_installment = loan_amount / loan_term_months`
pub fn derive_features(app: &CreditApplication, config: &FeatureConfig) -> Result<FeatureVector> {
    app.validate()?;

    let eps = config.epsilon;
    let debt_service_ratio = bounded_ratio(app.total_existing_debt, app.annual_income, eps);
    let income_to_loan_ratio = bounded_ratio(app.annual_income, app.loan_amount, eps);
    let disposable_income = app.annual_income - app.total_existing_debt;
    let monthly_installment = app.loan_amount / f64::from(app.loan_term_months);

    let mut features = FeatureVector::new();

    features.insert_numeric("age", f64::from(app.age));
    features.insert_numeric("annual_income", app.annual_income);
    features.insert_numeric("work_experience_years", f64::from(app.work_experience_years));
    features.insert_numeric("existing_loans_count", f64::from(app.existing_loans_count));
    features.insert_numeric("total_existing_debt", app.total_existing_debt);
    features.insert_numeric("credit_card_utilization", app.credit_card_utilization);
    features.insert_numeric("past_delinquencies", f64::from(app.past_delinquencies));
    features.insert_numeric("loan_amount", app.loan_amount);
    features.insert_numeric("loan_term_months", f64::from(app.loan_term_months));

    features.insert_category("gender", app.gender.as_str());
    features.insert_category("marital_status", app.marital_status.as_str());
    features.insert_category("education", app.education.as_str());
    features.insert_category("housing_type", app.housing_type.as_str());
    features.insert_category("employment_status", app.employment_status.as_str());

    features.insert_numeric(DEBT_SERVICE_RATIO, debt_service_ratio);
    features.insert_numeric(INCOME_TO_LOAN_RATIO, income_to_loan_ratio);
    features.insert_numeric(DISPOSABLE_INCOME, disposable_income);
    features.insert_numeric(MONTHLY_INSTALLMENT, monthly_installment);

    features.insert_flag(IS_HIGH_RISK_DSR, debt_service_ratio > config.dsr_ceiling);
    features.insert_flag(
        IS_HIGH_UTILIZATION,
        app.credit_card_utilization > config.utilization_ceiling,
    );
    features.insert_flag(
        HAS_DELINQUENCY,
        app.past_delinquencies > config.max_delinquencies,
    );

    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{sample_application, MAX_MONETARY_AMOUNT};
    use proptest::prelude::*;

    #[test]
    fn test_reference_ratios() {
        let features = derive_features(&sample_application(), &FeatureConfig::default()).unwrap();

        let dsr = features.numeric(DEBT_SERVICE_RATIO).unwrap();
        assert!((dsr - 0.041_666_7).abs() < 1e-6);
        assert_eq!(features.numeric(INCOME_TO_LOAN_RATIO), Some(2.4));
        assert_eq!(features.numeric(DISPOSABLE_INCOME), Some(115_000_000.0));
        assert!((features.numeric(MONTHLY_INSTALLMENT).unwrap() - 4_166_666.666_7).abs() < 1e-3);
    }

    #[test]
    fn test_flags_for_clean_applicant() {
        let features = derive_features(&sample_application(), &FeatureConfig::default()).unwrap();
        assert_eq!(features.numeric(IS_HIGH_RISK_DSR), Some(0.0));
        assert_eq!(features.numeric(IS_HIGH_UTILIZATION), Some(0.0));
        assert_eq!(features.numeric(HAS_DELINQUENCY), Some(0.0));
    }

    #[test]
    fn test_flags_follow_configured_thresholds() {
        let mut app = sample_application();
        app.total_existing_debt = 60_000_000.0; // DSR 0.5
        app.credit_card_utilization = 0.9;
        app.past_delinquencies = 2;

        let features = derive_features(&app, &FeatureConfig::default()).unwrap();
        assert_eq!(features.numeric(IS_HIGH_RISK_DSR), Some(1.0));
        assert_eq!(features.numeric(IS_HIGH_UTILIZATION), Some(1.0));
        assert_eq!(features.numeric(HAS_DELINQUENCY), Some(1.0));

        let relaxed = FeatureConfig {
            dsr_ceiling: 0.6,
            utilization_ceiling: 0.95,
            max_delinquencies: 2,
            ..FeatureConfig::default()
        };
        let features = derive_features(&app, &relaxed).unwrap();
        assert_eq!(features.numeric(IS_HIGH_RISK_DSR), Some(0.0));
        assert_eq!(features.numeric(IS_HIGH_UTILIZATION), Some(0.0));
        assert_eq!(features.numeric(HAS_DELINQUENCY), Some(0.0));
    }

    #[test]
    fn test_dsr_exactly_at_ceiling_is_not_flagged() {
        let mut app = sample_application();
        app.annual_income = 100_000_000.0;
        app.total_existing_debt = 40_000_000.0;
        let features = derive_features(&app, &FeatureConfig::default()).unwrap();
        assert_eq!(features.numeric(IS_HIGH_RISK_DSR), Some(0.0));
    }

    #[test]
    fn test_zero_income_is_guarded() {
        let mut app = sample_application();
        app.annual_income = 0.0;
        let features = derive_features(&app, &FeatureConfig::default()).unwrap();
        let dsr = features.numeric(DEBT_SERVICE_RATIO).unwrap();
        assert!(dsr.is_finite());
        assert_eq!(features.numeric(INCOME_TO_LOAN_RATIO), Some(0.0));
    }

    #[test]
    fn test_categoricals_are_carried() {
        let features = derive_features(&sample_application(), &FeatureConfig::default()).unwrap();
        assert_eq!(
            features.get("employment_status").and_then(FeatureValue::as_category),
            Some("PERMANENT")
        );
        assert_eq!(features.get("education").and_then(FeatureValue::as_category), Some("S1"));
    }

    #[test]
    fn test_invalid_application_is_rejected() {
        let mut app = sample_application();
        app.loan_term_months = 0;
        assert!(matches!(
            derive_features(&app, &FeatureConfig::default()),
            Err(ScoringError::Validation(_))
        ));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let config = FeatureConfig::default();
        let a = derive_features(&sample_application(), &config).unwrap();
        let b = derive_features(&sample_application(), &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_extreme_amounts_keep_ratios_finite() {
        let mut app = sample_application();
        app.annual_income = 0.0;
        app.total_existing_debt = MAX_MONETARY_AMOUNT;
        app.loan_amount = 0.0;

        let tiny_eps = FeatureConfig {
            epsilon: f64::MIN_POSITIVE,
            ..FeatureConfig::default()
        };
        let features = derive_features(&app, &tiny_eps).unwrap();
        assert_eq!(features.numeric(DEBT_SERVICE_RATIO), Some(f64::MAX));
        assert_eq!(features.numeric(INCOME_TO_LOAN_RATIO), Some(0.0));

        app.total_existing_debt = 1e308;
        assert!(matches!(
            derive_features(&app, &FeatureConfig::default()),
            Err(ScoringError::Validation(_))
        ));
    }

    fn amount() -> impl Strategy<Value = f64> {
        prop_oneof![0.0f64..1e13, 0.0f64..=MAX_MONETARY_AMOUNT, 0.0f64..=f64::MAX]
    }

    proptest! {
        #[test]
        fn ratios_are_finite_and_non_negative(
            income in amount(),
            debt in amount(),
            loan in amount(),
            term in 1u32..=60,
        ) {
            let mut app = sample_application();
            app.annual_income = income;
            app.total_existing_debt = debt;
            app.loan_amount = loan;
            app.loan_term_months = term;

            match derive_features(&app, &FeatureConfig::default()) {
                Ok(features) => {
                    let dsr = features.numeric(DEBT_SERVICE_RATIO).unwrap();
                    let itl = features.numeric(INCOME_TO_LOAN_RATIO).unwrap();
                    prop_assert!(dsr.is_finite() && dsr >= 0.0);
                    prop_assert!(itl.is_finite() && itl >= 0.0);
                }
                Err(e) => {
                    prop_assert!(matches!(e, ScoringError::Validation(_)));
                    prop_assert!(income.max(debt).max(loan) > MAX_MONETARY_AMOUNT);
                }
            }
        }
    }
}
