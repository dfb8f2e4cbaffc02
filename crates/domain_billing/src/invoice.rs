//! Invoice aggregate and lifecycle
//!
//! An invoice owns its line items: they are created together and only the
//! two running totals and the status may change once a payment has been
//! applied. Status is never set directly from outside; it is derived from
//! the balance inside the mutation that changes it.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{
    AcademicYear, ClassId, Currency, FeeItemId, InstallmentPlanId, InvoiceId, InvoiceItemId,
    Money, StaffId, StudentId, TermId,
};

use crate::error::BillingError;

/// Invoice lifecycle status
///
/// `Draft → PendingApproval → {Approved, Rejected}`; payments drive
/// `Approved → Partial → Paid` and reversals walk the same edges backward.
/// `Rejected` and `Cancelled` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Being assembled by the generator
    Draft,
    /// Submitted, awaiting approval
    PendingApproval,
    /// Approved and open for payment
    Approved,
    /// Approval declined; absorbing
    Rejected,
    /// Partially paid (0 < balance < total)
    Partial,
    /// Fully settled (balance <= 0)
    Paid,
    /// Withdrawn before any money moved; absorbing
    Cancelled,
}

impl InvoiceStatus {
    /// True for statuses that admit no further operations of any kind
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Rejected | InvoiceStatus::Cancelled)
    }

    /// True when payments may be posted against the invoice
    pub fn is_payable(&self) -> bool {
        matches!(self, InvoiceStatus::Approved | InvoiceStatus::Partial)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::PendingApproval => "pending_approval",
            InvoiceStatus::Approved => "approved",
            InvoiceStatus::Rejected => "rejected",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

/// Approval metadata recorded on the approve transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub approver: StaffId,
    pub notes: Option<String>,
    pub approved_at: DateTime<Utc>,
}

/// A line item on an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceItem {
    /// Item ID
    pub id: InvoiceItemId,
    /// Fee item this line charges for
    pub fee_item_id: FeeItemId,
    /// Description shown on the invoice
    pub description: String,
    /// Quantity
    pub quantity: Decimal,
    /// Unit price
    pub unit_price: Money,
    /// Line amount (`unit_price * quantity`, currency-rounded)
    pub amount: Money,
    /// Whether the underlying fee item was optional
    pub optional: bool,
}

impl InvoiceItem {
    /// Creates a line with quantity one
    pub fn new(fee_item_id: FeeItemId, description: impl Into<String>, unit_price: Money) -> Self {
        Self {
            id: InvoiceItemId::new_v7(),
            fee_item_id,
            description: description.into(),
            quantity: Decimal::ONE,
            unit_price,
            amount: unit_price,
            optional: false,
        }
    }

    /// Sets the quantity, recomputing the line amount
    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = quantity;
        self.amount = self.unit_price.multiply(quantity);
        self
    }

    /// Flags the line as coming from an optional fee item
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Installment due dates attached to an invoice
///
/// Informational only: the ledger tracks one running balance per invoice
/// and never subdivides it per installment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallmentSchedule {
    pub plan_id: InstallmentPlanId,
    pub entries: Vec<ScheduleEntry>,
}

/// One dated slot in an installment schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub label: String,
    pub due_date: NaiveDate,
    pub amount: Money,
}

/// A billing document for one student and term
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: InvoiceId,
    /// Human-readable number (`INV<year><sequence>`)
    pub invoice_number: String,
    /// Student being billed
    pub student_id: StudentId,
    /// Class at billing time
    pub class_id: ClassId,
    /// Term billed
    pub term_id: TermId,
    /// Academic year billed
    pub academic_year: AcademicYear,
    /// Currency of all amounts on the invoice
    pub currency: Currency,
    /// Line items, immutable once any payment has been applied
    pub items: Vec<InvoiceItem>,
    /// Optional installment due dates
    pub schedule: Option<InstallmentSchedule>,
    /// Sum of line amounts
    pub total_amount: Money,
    /// Sum of currently-applied payments net of partial refunds
    pub paid_amount: Money,
    /// `total_amount - paid_amount`, maintained on every mutation
    pub balance: Money,
    /// Lifecycle status
    pub status: InvoiceStatus,
    /// Payment due date
    pub due_date: NaiveDate,
    /// Set on the approve transition
    pub approval: Option<Approval>,
    /// Set on the reject transition
    pub rejection_reason: Option<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates a draft invoice from its line items
    ///
    /// # Errors
    ///
    /// Returns a validation error if any line's currency differs from the
    /// invoice currency.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        invoice_number: impl Into<String>,
        student_id: StudentId,
        class_id: ClassId,
        term_id: TermId,
        academic_year: AcademicYear,
        currency: Currency,
        items: Vec<InvoiceItem>,
        due_date: NaiveDate,
    ) -> Result<Self, BillingError> {
        let mut total = Money::zero(currency);
        for item in &items {
            total = total
                .checked_add(&item.amount)
                .map_err(|e| BillingError::Validation(e.to_string()))?;
        }

        let now = Utc::now();
        Ok(Self {
            id: InvoiceId::new_v7(),
            invoice_number: invoice_number.into(),
            student_id,
            class_id,
            term_id,
            academic_year,
            currency,
            items,
            schedule: None,
            total_amount: total,
            paid_amount: Money::zero(currency),
            balance: total,
            status: InvoiceStatus::Draft,
            due_date,
            approval: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Attaches an installment schedule
    pub fn with_schedule(mut self, schedule: InstallmentSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Submits a draft for approval
    pub fn submit_for_approval(&mut self) -> Result<(), BillingError> {
        if self.status != InvoiceStatus::Draft {
            return Err(BillingError::state(format!(
                "invoice {} cannot be submitted from status {}",
                self.invoice_number,
                self.status.as_str()
            )));
        }
        self.transition(InvoiceStatus::PendingApproval);
        Ok(())
    }

    /// Approves a pending invoice, opening it for payment
    pub fn approve(&mut self, approver: StaffId, notes: Option<String>) -> Result<(), BillingError> {
        if self.status != InvoiceStatus::PendingApproval {
            return Err(BillingError::state(format!(
                "invoice {} cannot be approved from status {}",
                self.invoice_number,
                self.status.as_str()
            )));
        }
        self.approval = Some(Approval {
            approver,
            notes,
            approved_at: Utc::now(),
        });
        self.transition(InvoiceStatus::Approved);
        Ok(())
    }

    /// Rejects a pending invoice; absorbing
    pub fn reject(&mut self, reason: impl Into<String>) -> Result<(), BillingError> {
        if self.status != InvoiceStatus::PendingApproval {
            return Err(BillingError::state(format!(
                "invoice {} cannot be rejected from status {}",
                self.invoice_number,
                self.status.as_str()
            )));
        }
        self.rejection_reason = Some(reason.into());
        self.transition(InvoiceStatus::Rejected);
        Ok(())
    }

    /// Cancels an invoice that has seen no money; absorbing
    pub fn cancel(&mut self) -> Result<(), BillingError> {
        if self.status.is_terminal() || self.status == InvoiceStatus::Paid {
            return Err(BillingError::state(format!(
                "invoice {} cannot be cancelled from status {}",
                self.invoice_number,
                self.status.as_str()
            )));
        }
        if !self.paid_amount.is_zero() {
            return Err(BillingError::state(format!(
                "invoice {} has applied payments; void or refund them first",
                self.invoice_number
            )));
        }
        self.transition(InvoiceStatus::Cancelled);
        Ok(())
    }

    /// Applies a payment amount to the running totals and re-derives status
    ///
    /// Preconditions: the invoice is payable, `amount > 0` in the invoice
    /// currency, and `amount <= balance` unless `allow_overpayment`.
    pub fn apply_payment(&mut self, amount: Money, allow_overpayment: bool) -> Result<(), BillingError> {
        if !self.status.is_payable() {
            return Err(BillingError::state(format!(
                "invoice {} is not payable in status {}",
                self.invoice_number,
                self.status.as_str()
            )));
        }
        self.ensure_currency(&amount)?;
        if !amount.is_positive() {
            return Err(BillingError::validation("payment amount must be positive"));
        }
        if amount > self.balance && !allow_overpayment {
            return Err(BillingError::state(format!(
                "payment {amount} exceeds balance {} and overpayment is not allowed",
                self.balance
            )));
        }

        self.paid_amount = self.paid_amount.checked_add(&amount)?;
        self.balance = self.balance.checked_sub(&amount)?;
        self.derive_payment_status();
        self.check_invariant()
    }

    /// Reverses a previously applied amount (void or refund) and
    /// re-derives status, walking it backward if needed
    pub fn reverse_amount(&mut self, amount: Money) -> Result<(), BillingError> {
        if self.status.is_terminal() {
            return Err(BillingError::state(format!(
                "invoice {} is {} and admits no further operations",
                self.invoice_number,
                self.status.as_str()
            )));
        }
        self.ensure_currency(&amount)?;
        if !amount.is_positive() {
            return Err(BillingError::validation("reversal amount must be positive"));
        }
        if amount > self.paid_amount {
            return Err(BillingError::invariant(format!(
                "reversal {amount} exceeds paid amount {} on invoice {}",
                self.paid_amount, self.invoice_number
            )));
        }

        self.paid_amount = self.paid_amount.checked_sub(&amount)?;
        self.balance = self.balance.checked_add(&amount)?;
        self.derive_payment_status();
        self.check_invariant()
    }

    /// True when the invoice still owes money past its due date
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        self.status.is_payable() && self.balance.is_positive() && self.due_date < as_of
    }

    /// Verifies the balance invariant, surfacing a violation instead of
    /// silently correcting it
    pub fn check_invariant(&self) -> Result<(), BillingError> {
        let expected = self.total_amount.checked_sub(&self.paid_amount)?;
        if self.balance != expected {
            return Err(BillingError::invariant(format!(
                "invoice {}: balance {} != total {} - paid {}",
                self.invoice_number, self.balance, self.total_amount, self.paid_amount
            )));
        }

        let mut items_total = Money::zero(self.currency);
        for item in &self.items {
            items_total = items_total.checked_add(&item.amount)?;
        }
        if items_total != self.total_amount {
            return Err(BillingError::invariant(format!(
                "invoice {}: total {} != sum of items {}",
                self.invoice_number, self.total_amount, items_total
            )));
        }
        Ok(())
    }

    /// Derives status from the balance after a payment-driven mutation
    fn derive_payment_status(&mut self) {
        let next = if !self.balance.is_positive() {
            InvoiceStatus::Paid
        } else if self.balance < self.total_amount {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Approved
        };
        self.transition(next);
    }

    fn transition(&mut self, next: InvoiceStatus) {
        self.status = next;
        self.updated_at = Utc::now();
    }

    fn ensure_currency(&self, amount: &Money) -> Result<(), BillingError> {
        if amount.currency() != self.currency {
            return Err(BillingError::validation(format!(
                "amount currency {} does not match invoice currency {}",
                amount.currency(),
                self.currency
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    fn draft_invoice(total: Decimal) -> Invoice {
        let fee_item = FeeItemId::new();
        Invoice::new(
            "INV2025000001",
            StudentId::new(),
            ClassId::new(),
            TermId::new(),
            AcademicYear::new(2025),
            Currency::USD,
            vec![InvoiceItem::new(fee_item, "Tuition", usd(total))],
            NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
        )
        .unwrap()
    }

    fn approved_invoice(total: Decimal) -> Invoice {
        let mut invoice = draft_invoice(total);
        invoice.submit_for_approval().unwrap();
        invoice.approve(StaffId::new(), None).unwrap();
        invoice
    }

    #[test]
    fn test_new_invoice_totals() {
        let invoice = draft_invoice(dec!(1000));
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.total_amount, usd(dec!(1000)));
        assert_eq!(invoice.balance, usd(dec!(1000)));
        assert!(invoice.paid_amount.is_zero());
        invoice.check_invariant().unwrap();
    }

    #[test]
    fn test_item_quantity_recomputes_amount() {
        let item = InvoiceItem::new(FeeItemId::new(), "Books", usd(dec!(25)))
            .with_quantity(dec!(4));
        assert_eq!(item.amount, usd(dec!(100)));
    }

    #[test]
    fn test_approval_flow() {
        let mut invoice = draft_invoice(dec!(500));
        invoice.submit_for_approval().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::PendingApproval);

        invoice.approve(StaffId::new(), Some("checked".into())).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Approved);
        assert!(invoice.approval.is_some());
    }

    #[test]
    fn test_draft_cannot_be_approved_directly() {
        let mut invoice = draft_invoice(dec!(500));
        assert!(matches!(
            invoice.approve(StaffId::new(), None),
            Err(BillingError::State(_))
        ));
    }

    #[test]
    fn test_rejected_is_absorbing() {
        let mut invoice = draft_invoice(dec!(500));
        invoice.submit_for_approval().unwrap();
        invoice.reject("budget").unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Rejected);

        assert!(matches!(
            invoice.apply_payment(usd(dec!(100)), false),
            Err(BillingError::State(_))
        ));
        assert!(matches!(
            invoice.reverse_amount(usd(dec!(100))),
            Err(BillingError::State(_))
        ));
    }

    #[test]
    fn test_payment_moves_through_partial_to_paid() {
        let mut invoice = approved_invoice(dec!(500));

        invoice.apply_payment(usd(dec!(200)), false).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Partial);
        assert_eq!(invoice.balance, usd(dec!(300)));

        invoice.apply_payment(usd(dec!(300)), false).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert!(invoice.balance.is_zero());
    }

    #[test]
    fn test_paid_invoice_rejects_further_payments() {
        let mut invoice = approved_invoice(dec!(500));
        invoice.apply_payment(usd(dec!(500)), false).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);

        assert!(matches!(
            invoice.apply_payment(usd(dec!(0.01)), false),
            Err(BillingError::State(_))
        ));
    }

    #[test]
    fn test_overpayment_rejected_without_flag() {
        let mut invoice = approved_invoice(dec!(500));
        assert!(matches!(
            invoice.apply_payment(usd(dec!(600)), false),
            Err(BillingError::State(_))
        ));
    }

    #[test]
    fn test_overpayment_allowed_with_flag() {
        let mut invoice = approved_invoice(dec!(500));
        invoice.apply_payment(usd(dec!(600)), true).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.balance, usd(dec!(-100)));
        invoice.check_invariant().unwrap();
    }

    #[test]
    fn test_reversal_walks_status_backward() {
        let mut invoice = approved_invoice(dec!(300));
        invoice.apply_payment(usd(dec!(100)), false).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Partial);

        invoice.reverse_amount(usd(dec!(100))).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Approved);
        assert_eq!(invoice.balance, usd(dec!(300)));
        assert!(invoice.paid_amount.is_zero());
    }

    #[test]
    fn test_reversal_beyond_paid_is_invariant_violation() {
        let mut invoice = approved_invoice(dec!(300));
        invoice.apply_payment(usd(dec!(100)), false).unwrap();
        assert!(matches!(
            invoice.reverse_amount(usd(dec!(200))),
            Err(BillingError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_cancel_requires_no_money() {
        let mut invoice = approved_invoice(dec!(300));
        invoice.apply_payment(usd(dec!(100)), false).unwrap();
        assert!(matches!(invoice.cancel(), Err(BillingError::State(_))));

        invoice.reverse_amount(usd(dec!(100))).unwrap();
        invoice.cancel().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Cancelled);
    }

    #[test]
    fn test_is_overdue() {
        let mut invoice = approved_invoice(dec!(300));
        let after_due = invoice.due_date + chrono::Days::new(1);
        assert!(invoice.is_overdue(after_due));
        assert!(!invoice.is_overdue(invoice.due_date));

        invoice.apply_payment(usd(dec!(300)), false).unwrap();
        assert!(!invoice.is_overdue(after_due));
    }

    #[test]
    fn test_currency_mismatch_rejected() {
        let mut invoice = approved_invoice(dec!(300));
        let eur = Money::new(dec!(100), Currency::EUR);
        assert!(matches!(
            invoice.apply_payment(eur, false),
            Err(BillingError::Validation(_))
        ));
    }
}
