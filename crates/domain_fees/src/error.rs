//! Fees domain errors

use core_kernel::{AcademicYear, MoneyError};
use thiserror::Error;

/// Errors that can occur in the fees domain
#[derive(Debug, Error)]
pub enum FeesError {
    /// No rule matches a mandatory fee item for the student's context
    #[error("No fee rule matches '{fee_item}' for {academic_year}")]
    RuleNotFound {
        fee_item: String,
        academic_year: AcademicYear,
    },

    /// The installment plan is internally inconsistent
    #[error("Invalid installment plan '{plan}': {reason}")]
    InvalidPlan { plan: String, reason: String },

    /// Malformed input rejected before any resolution
    #[error("Validation error: {0}")]
    Validation(String),

    /// Money arithmetic error
    #[error(transparent)]
    Money(#[from] MoneyError),
}

impl FeesError {
    pub fn invalid_plan(plan: impl Into<String>, reason: impl Into<String>) -> Self {
        FeesError::InvalidPlan {
            plan: plan.into(),
            reason: reason.into(),
        }
    }
}
