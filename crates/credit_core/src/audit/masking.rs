//! One-way PII masking applied before anything reaches the audit store

use serde::Serialize;

use crate::application::{
    CreditApplication, Education, EmploymentStatus, Gender, HousingType, MaritalStatus,
};
use crate::canonical::{sha256_hex, sha256_str_hex};
use crate::errors::Result;

pub const DEFAULT_ROUNDING_UNIT: u64 = 10_000_000;

/// SHA-256 hex digest (64 chars) of an identifier.
pub fn hash_identifier(id: &str) -> String {
    sha256_str_hex(id)
}

/// Round an amount to the nearest multiple of `unit`.
///
/// Idempotent: `round_monetary(round_monetary(x, u), u) == round_monetary(x, u)`.
pub fn round_monetary(amount: f64, unit: u64) -> f64 {
    if unit == 0 {
        return amount;
    }
    let unit = unit as f64;
    (amount / unit).round() * unit
}

/// Application with the identifier hashed and amounts coarsened.
///
/// This is the only form of the application that is ever fingerprinted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskedApplication {
    pub application_id: String,
    pub age: u32,
    pub gender: Gender,
    pub marital_status: MaritalStatus,
    pub education: Education,
    pub housing_type: HousingType,
    pub annual_income: f64,
    pub employment_status: EmploymentStatus,
    pub work_experience_years: u32,
    pub existing_loans_count: u32,
    pub total_existing_debt: f64,
    pub credit_card_utilization: f64,
    pub past_delinquencies: u32,
    pub loan_amount: f64,
    pub loan_term_months: u32,
}

impl MaskedApplication {
    pub fn from_application(app: &CreditApplication, rounding_unit: u64) -> Self {
        Self {
            application_id: hash_identifier(&app.application_id),
            age: app.age,
            gender: app.gender,
            marital_status: app.marital_status,
            education: app.education,
            housing_type: app.housing_type,
            annual_income: round_monetary(app.annual_income, rounding_unit),
            employment_status: app.employment_status,
            work_experience_years: app.work_experience_years,
            existing_loans_count: app.existing_loans_count,
            total_existing_debt: round_monetary(app.total_existing_debt, rounding_unit),
            credit_card_utilization: app.credit_card_utilization,
            past_delinquencies: app.past_delinquencies,
            loan_amount: round_monetary(app.loan_amount, rounding_unit),
            loan_term_months: app.loan_term_months,
        }
    }

    /// SHA-256 over the canonical JSON form
    pub fn fingerprint(&self) -> Result<String> {
        Ok(sha256_hex(self)?)
    }
}
