//! Credit application input record
//!
//! Field set and categorical vocabularies follow Indonesian retail lending
//! conventions (education levels SD..S3, amounts in IDR).

use serde::{Deserialize, Serialize};

use crate::errors::{Result, ScoringError};

pub const MIN_AGE: u32 = 18;
pub const MAX_AGE: u32 = 70;
pub const MIN_TERM_MONTHS: u32 = 1;
pub const MAX_TERM_MONTHS: u32 = 60;
/// Upper bound for any monetary field, in IDR
pub const MAX_MONETARY_AMOUNT: f64 = 1e18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaritalStatus {
    Single,
    Married,
    Divorced,
}

/// Highest completed education level
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Education {
    /// Elementary school
    SD,
    /// Junior high school
    SMP,
    /// Senior high school
    SMA,
    /// Diploma 3
    D3,
    /// Bachelor's degree
    S1,
    /// Master's degree
    S2,
    /// Doctoral degree
    S3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HousingType {
    Owned,
    Rented,
    Parents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmploymentStatus {
    Permanent,
    Contract,
    SelfEmployed,
    Unemployed,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }
}

impl MaritalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaritalStatus::Single => "SINGLE",
            MaritalStatus::Married => "MARRIED",
            MaritalStatus::Divorced => "DIVORCED",
        }
    }
}

impl Education {
    pub fn as_str(&self) -> &'static str {
        match self {
            Education::SD => "SD",
            Education::SMP => "SMP",
            Education::SMA => "SMA",
            Education::D3 => "D3",
            Education::S1 => "S1",
            Education::S2 => "S2",
            Education::S3 => "S3",
        }
    }
}

impl HousingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HousingType::Owned => "OWNED",
            HousingType::Rented => "RENTED",
            HousingType::Parents => "PARENTS",
        }
    }
}

impl EmploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentStatus::Permanent => "PERMANENT",
            EmploymentStatus::Contract => "CONTRACT",
            EmploymentStatus::SelfEmployed => "SELF_EMPLOYED",
            EmploymentStatus::Unemployed => "UNEMPLOYED",
        }
    }
}

/// A complete loan application as received from the transport layer.
///
/// Immutable once constructed; the pipeline only ever borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditApplication {
    /// Caller-side identifier. Treated as PII: hashed before audit, never logged.
    pub application_id: String,

    // Demographics
    pub age: u32,
    pub gender: Gender,
    pub marital_status: MaritalStatus,
    pub education: Education,
    pub housing_type: HousingType,

    // Financials
    /// Annual income in IDR
    pub annual_income: f64,
    pub employment_status: EmploymentStatus,
    pub work_experience_years: u32,

    // Credit history
    pub existing_loans_count: u32,
    /// Total outstanding debt in IDR
    pub total_existing_debt: f64,
    /// Credit card utilization ratio in [0, 1]
    pub credit_card_utilization: f64,
    pub past_delinquencies: u32,

    // Requested terms
    /// Requested principal in IDR
    pub loan_amount: f64,
    pub loan_term_months: u32,

    /// Training label (0 good, 1 default). Ignored when scoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<u8>,
}

impl CreditApplication {
    /// Reject structurally invalid input before any feature is derived.
    pub fn validate(&self) -> Result<()> {
        if self.application_id.trim().is_empty() {
            return Err(ScoringError::Validation(
                "application_id must not be empty".to_string(),
            ));
        }

        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            return Err(ScoringError::Validation(format!(
                "age must be between {MIN_AGE} and {MAX_AGE}, got {}",
                self.age
            )));
        }

        if !(MIN_TERM_MONTHS..=MAX_TERM_MONTHS).contains(&self.loan_term_months) {
            return Err(ScoringError::Validation(format!(
                "loan_term_months must be between {MIN_TERM_MONTHS} and {MAX_TERM_MONTHS}, got {}",
                self.loan_term_months
            )));
        }

        for (field, value) in [
            ("annual_income", self.annual_income),
            ("total_existing_debt", self.total_existing_debt),
            ("loan_amount", self.loan_amount),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ScoringError::Validation(format!(
                    "{field} must be a finite non-negative amount, got {value}"
                )));
            }
            if value > MAX_MONETARY_AMOUNT {
                return Err(ScoringError::Validation(format!(
                    "{field} must not exceed {MAX_MONETARY_AMOUNT:e}, got {value:e}"
                )));
            }
        }

        let utilization = self.credit_card_utilization;
        if !utilization.is_finite() || !(0.0..=1.0).contains(&utilization) {
            return Err(ScoringError::Validation(format!(
                "credit_card_utilization must be within [0, 1], got {utilization}"
            )));
        }

        if let Some(label) = self.is_default {
            if label > 1 {
                return Err(ScoringError::Validation(format!(
                    "is_default must be 0 or 1, got {label}"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_application() -> CreditApplication {
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
