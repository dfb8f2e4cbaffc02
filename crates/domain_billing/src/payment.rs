//! Payment records
//!
//! Payments are append-only history: a reversal flips the status flag and
//! records what was reversed, it never rewrites the original amount. The
//! ledger recomputes invoice totals transactionally alongside.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{InvoiceId, Money, PaymentId, StaffId};

use crate::error::BillingError;

/// How the money arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    MobileMoney,
    Cheque,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Card => "card",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Cheque => "cheque",
        }
    }
}

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Counted toward the invoice's paid amount
    Applied,
    /// Fully reversed in one step
    Voided,
    /// Fully reversed through cumulative refunds
    Refunded,
}

/// An application of money to one invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// Invoice the money was applied to
    pub invoice_id: InvoiceId,
    /// Original amount; never rewritten
    pub amount: Money,
    /// Payment method
    pub method: PaymentMethod,
    /// Status flag
    pub status: PaymentStatus,
    /// Caller-supplied token making retries safe
    pub idempotency_key: String,
    /// Staff member who received the money
    pub received_by: StaffId,
    /// External reference (bank slip, transaction id)
    pub reference: Option<String>,
    /// Reason recorded on void or refund
    pub reason: Option<String>,
    /// Cumulative refunded amount
    pub refunded_total: Money,
    /// When the payment was applied
    pub posted_at: DateTime<Utc>,
    /// When the payment was fully reversed, if ever
    pub reversed_at: Option<DateTime<Utc>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Creates an applied payment
    pub fn new(
        invoice_id: InvoiceId,
        amount: Money,
        method: PaymentMethod,
        idempotency_key: impl Into<String>,
        received_by: StaffId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new_v7(),
            invoice_id,
            amount,
            method,
            status: PaymentStatus::Applied,
            idempotency_key: idempotency_key.into(),
            received_by,
            reference: None,
            reason: None,
            refunded_total: Money::zero(amount.currency()),
            posted_at: now,
            reversed_at: None,
            created_at: now,
        }
    }

    /// Sets the external reference
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// The amount currently counting toward the invoice's paid total
    pub fn applied_net(&self) -> Money {
        match self.status {
            PaymentStatus::Applied => self.amount - self.refunded_total,
            PaymentStatus::Voided | PaymentStatus::Refunded => Money::zero(self.amount.currency()),
        }
    }

    /// The amount still available to refund
    pub fn refundable(&self) -> Money {
        match self.status {
            PaymentStatus::Applied => self.amount - self.refunded_total,
            _ => Money::zero(self.amount.currency()),
        }
    }

    /// True when the payment can be voided: applied, with no partial
    /// refunds recorded (a partially refunded payment must be refunded
    /// for the remainder instead)
    pub fn can_void(&self) -> bool {
        self.status == PaymentStatus::Applied && self.refunded_total.is_zero()
    }

    /// Marks the payment voided
    pub fn mark_voided(&mut self, reason: impl Into<String>) -> Result<(), BillingError> {
        if !self.can_void() {
            return Err(BillingError::state(format!(
                "payment {} cannot be voided (status {:?}, refunded {})",
                self.id, self.status, self.refunded_total
            )));
        }
        self.status = PaymentStatus::Voided;
        self.reason = Some(reason.into());
        self.reversed_at = Some(Utc::now());
        Ok(())
    }

    /// Records a refund against the payment
    ///
    /// A partial refund leaves the payment `Applied` with the cumulative
    /// total recorded; once refunds cover the full amount the status flips
    /// to `Refunded`.
    pub fn record_refund(
        &mut self,
        amount: Money,
        reason: impl Into<String>,
    ) -> Result<(), BillingError> {
        if self.status != PaymentStatus::Applied {
            return Err(BillingError::state(format!(
                "payment {} cannot be refunded in status {:?}",
                self.id, self.status
            )));
        }
        if !amount.is_positive() {
            return Err(BillingError::validation("refund amount must be positive"));
        }
        if amount > self.refundable() {
            return Err(BillingError::validation(format!(
                "refund {amount} exceeds remaining applied amount {}",
                self.refundable()
            )));
        }

        self.refunded_total = self.refunded_total.checked_add(&amount)?;
        self.reason = Some(reason.into());
        if self.refunded_total == self.amount {
            self.status = PaymentStatus::Refunded;
            self.reversed_at = Some(Utc::now());
        }
        Ok(())
    }
}
