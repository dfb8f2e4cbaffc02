//! Billing domain errors

use core_kernel::MoneyError;
use domain_fees::FeesError;
use thiserror::Error;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Malformed or missing input, rejected before any mutation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation attempted against an incompatible or terminal status
    #[error("Invalid state: {0}")]
    State(String),

    /// A ledger invariant no longer holds; the operation was aborted
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Invoice not found
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Payment not found
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    /// Invoice registered twice
    #[error("Invoice already registered: {0}")]
    DuplicateInvoice(String),

    /// Invoice generation failed because mandatory items have no matching
    /// rule; lists every missing item at once
    #[error("No fee rule matches mandatory items: {}", items.join(", "))]
    UnresolvedFeeItems { items: Vec<String> },

    /// Money arithmetic error
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// Fee resolution or planning error
    #[error(transparent)]
    Fees(#[from] FeesError),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        BillingError::State(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        BillingError::InvariantViolation(message.into())
    }
}
