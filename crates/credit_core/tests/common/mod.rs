#![allow(dead_code)]

use kreditax_core::application::{
    Education, EmploymentStatus, Gender, HousingType, MaritalStatus,
};
use kreditax_core::{CreditApplication, CreditScoringPipeline, ScoringConfig};
use std::path::{Path, PathBuf};

pub fn artifacts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("artifacts")
}

/// Default config pointing at the shipped artifacts and an audit log in `dir`.
pub fn config_in(dir: &Path) -> ScoringConfig {
    let mut config = ScoringConfig::default();
    config.artifacts.model_path = artifacts_dir().join("model.json");
    config.artifacts.preprocessor_path = artifacts_dir().join("preprocessor.json");
    config.audit.log_path = dir.join("audit/audit_logs.csv");
    config
}

pub fn pipeline_in(dir: &Path) -> CreditScoringPipeline {
    CreditScoringPipeline::from_config(config_in(dir)).unwrap()
}

/// Salaried, low-debt applicant; scores ~8.2% on the shipped model.
pub fn low_risk_application() -> CreditApplication {
    CreditApplication {
        application_id: "APP-001".to_string(),
        age: 30,
        gender: Gender::Male,
        marital_status: MaritalStatus::Married,
        education: Education::S1,
        housing_type: HousingType::Owned,
        annual_income: 120_000_000.0,
        employment_status: EmploymentStatus::Permanent,
        work_experience_years: 5,
        existing_loans_count: 1,
        total_existing_debt: 5_000_000.0,
        credit_card_utilization: 0.3,
        past_delinquencies: 0,
        loan_amount: 50_000_000.0,
        loan_term_months: 12,
        is_default: None,
    }
}

/// Unemployed, indebted, delinquent applicant; scores ~65.9%.
pub fn high_risk_application() -> CreditApplication {
    CreditApplication {
        application_id: "APP-002".to_string(),
        age: 23,
        gender: Gender::Male,
        marital_status: MaritalStatus::Single,
        education: Education::SMA,
        housing_type: HousingType::Rented,
        annual_income: 36_000_000.0,
        employment_status: EmploymentStatus::Unemployed,
        work_experience_years: 0,
        existing_loans_count: 4,
        total_existing_debt: 30_000_000.0,
        credit_card_utilization: 0.95,
        past_delinquencies: 3,
        loan_amount: 80_000_000.0,
        loan_term_months: 36,
        is_default: None,
    }
}
