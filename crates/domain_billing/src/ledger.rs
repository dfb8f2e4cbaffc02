//! The payment ledger
//!
//! The ledger owns every payment and the running totals of every invoice.
//! Mutations are staged on cloned state and written back only when every
//! check has passed, so a failed operation leaves nothing half-applied.
//! Payments are append-only: void and refund flip the record's status flag
//! and the ledger recomputes the invoice totals in the same step.
//!
//! # Invariants
//!
//! - `invoice.balance == invoice.total_amount - invoice.paid_amount`
//! - `invoice.paid_amount == Σ applied payments net of partial refunds`
//! - A given idempotency key posts at most one payment per invoice

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use core_kernel::{InvoiceId, Money, PaymentId, StaffId};

use crate::error::BillingError;
use crate::invoice::Invoice;
use crate::payment::{Payment, PaymentMethod};
use crate::ports::{LedgerEvent, NotificationDispatcher};

/// A request to post one payment against one invoice
#[derive(Debug, Clone)]
pub struct PostPayment {
    pub amount: Money,
    pub method: PaymentMethod,
    /// Caller-supplied token; replaying it returns the original payment
    pub idempotency_key: String,
    pub received_by: StaffId,
    /// Permits posting beyond the outstanding balance (rounding credits
    /// and similar documented cases); off by default
    pub allow_overpayment: bool,
}

impl PostPayment {
    pub fn new(
        amount: Money,
        method: PaymentMethod,
        idempotency_key: impl Into<String>,
        received_by: StaffId,
    ) -> Self {
        Self {
            amount,
            method,
            idempotency_key: idempotency_key.into(),
            received_by,
            allow_overpayment: false,
        }
    }

    pub fn allow_overpayment(mut self) -> Self {
        self.allow_overpayment = true;
        self
    }
}

/// The payment ledger engine
///
/// Same-invoice operations serialize through `&mut self`; callers that
/// shard work across invoices can run one engine per shard. Events are
/// dispatched after the state write, best-effort: a dispatcher failure
/// never unwinds a financial mutation.
pub struct PaymentLedger {
    invoices: HashMap<InvoiceId, Invoice>,
    payments: HashMap<PaymentId, Payment>,
    idempotency: HashMap<(InvoiceId, String), PaymentId>,
    dispatcher: Option<Arc<dyn NotificationDispatcher>>,
}

impl Default for PaymentLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentLedger {
    /// Creates an empty ledger
    pub fn new() -> Self {
        Self {
            invoices: HashMap::new(),
            payments: HashMap::new(),
            idempotency: HashMap::new(),
            dispatcher: None,
        }
    }

    /// Attaches a notification dispatcher
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Registers an invoice with the ledger
    pub fn register_invoice(&mut self, invoice: Invoice) -> Result<InvoiceId, BillingError> {
        if self.invoices.contains_key(&invoice.id) {
            return Err(BillingError::DuplicateInvoice(invoice.invoice_number));
        }
        invoice.check_invariant()?;
        let id = invoice.id;
        let student_id = invoice.student_id;
        let total = invoice.total_amount;
        self.invoices.insert(id, invoice);
        self.notify(LedgerEvent::InvoiceGenerated {
            invoice_id: id,
            student_id,
            total,
        });
        Ok(id)
    }

    /// Gets an invoice by ID
    pub fn invoice(&self, id: &InvoiceId) -> Option<&Invoice> {
        self.invoices.get(id)
    }

    /// Gets a payment by ID
    pub fn payment(&self, id: &PaymentId) -> Option<&Payment> {
        self.payments.get(id)
    }

    /// Iterates all invoices (read side)
    pub fn invoices(&self) -> impl Iterator<Item = &Invoice> {
        self.invoices.values()
    }

    /// Iterates all payments (read side)
    pub fn payments(&self) -> impl Iterator<Item = &Payment> {
        self.payments.values()
    }

    /// Submits a draft invoice for approval
    pub fn submit_invoice(&mut self, invoice_id: InvoiceId) -> Result<Invoice, BillingError> {
        let mut invoice = self.invoice_for_update(invoice_id)?;
        invoice.submit_for_approval()?;
        self.invoices.insert(invoice_id, invoice.clone());
        Ok(invoice)
    }

    /// Approves a pending invoice
    pub fn approve_invoice(
        &mut self,
        invoice_id: InvoiceId,
        approver: StaffId,
        notes: Option<String>,
    ) -> Result<Invoice, BillingError> {
        let mut invoice = self.invoice_for_update(invoice_id)?;
        invoice.approve(approver, notes)?;
        self.invoices.insert(invoice_id, invoice.clone());
        info!(invoice = %invoice.invoice_number, %approver, "invoice approved");
        self.notify(LedgerEvent::InvoiceApproved {
            invoice_id,
            approver,
        });
        Ok(invoice)
    }

    /// Rejects a pending invoice
    pub fn reject_invoice(
        &mut self,
        invoice_id: InvoiceId,
        reason: impl Into<String>,
    ) -> Result<Invoice, BillingError> {
        let reason = reason.into();
        let mut invoice = self.invoice_for_update(invoice_id)?;
        invoice.reject(reason.clone())?;
        self.invoices.insert(invoice_id, invoice.clone());
        info!(invoice = %invoice.invoice_number, %reason, "invoice rejected");
        self.notify(LedgerEvent::InvoiceRejected { invoice_id, reason });
        Ok(invoice)
    }

    /// Cancels an invoice that has seen no money
    pub fn cancel_invoice(&mut self, invoice_id: InvoiceId) -> Result<Invoice, BillingError> {
        let mut invoice = self.invoice_for_update(invoice_id)?;
        invoice.cancel()?;
        self.invoices.insert(invoice_id, invoice.clone());
        info!(invoice = %invoice.invoice_number, "invoice cancelled");
        Ok(invoice)
    }

    /// Posts a payment against an invoice
    ///
    /// Replaying an idempotency key already seen for this invoice returns
    /// the existing payment unchanged; nothing is posted twice. Otherwise
    /// the balance decrement, the payment row, and the derived status are
    /// committed together or not at all.
    pub fn post_payment(
        &mut self,
        invoice_id: InvoiceId,
        cmd: PostPayment,
    ) -> Result<Payment, BillingError> {
        if cmd.idempotency_key.trim().is_empty() {
            return Err(BillingError::validation("idempotency key must not be empty"));
        }

        let idempotency_slot = (invoice_id, cmd.idempotency_key.clone());
        if let Some(existing_id) = self.idempotency.get(&idempotency_slot) {
            let existing = self
                .payments
                .get(existing_id)
                .cloned()
                .ok_or_else(|| {
                    BillingError::invariant(format!(
                        "idempotency key maps to missing payment {existing_id}"
                    ))
                })?;
            debug!(
                invoice = %invoice_id,
                payment = %existing.id,
                key = %cmd.idempotency_key,
                "idempotent replay, returning existing payment"
            );
            return Ok(existing);
        }

        // Stage on a clone; nothing below is observable until the writes
        let mut invoice = self.invoice_for_update(invoice_id)?;
        invoice.apply_payment(cmd.amount, cmd.allow_overpayment)?;

        let payment = Payment::new(
            invoice_id,
            cmd.amount,
            cmd.method,
            cmd.idempotency_key,
            cmd.received_by,
        );

        info!(
            invoice = %invoice.invoice_number,
            payment = %payment.id,
            amount = %payment.amount,
            status = invoice.status.as_str(),
            "payment posted"
        );

        self.invoices.insert(invoice_id, invoice);
        self.idempotency
            .insert(idempotency_slot, payment.id);
        self.payments.insert(payment.id, payment.clone());

        self.notify(LedgerEvent::PaymentPosted {
            invoice_id,
            payment_id: payment.id,
            amount: payment.amount,
        });
        Ok(payment)
    }

    /// Voids an applied payment, reversing its full amount
    pub fn void_payment(
        &mut self,
        payment_id: PaymentId,
        reason: impl Into<String>,
    ) -> Result<(), BillingError> {
        let mut payment = self
            .payments
            .get(&payment_id)
            .cloned()
            .ok_or_else(|| BillingError::PaymentNotFound(payment_id.to_string()))?;

        let invoice_id = payment.invoice_id;
        let mut invoice = self.invoice_for_update(invoice_id).map_err(|_| {
            BillingError::invariant(format!(
                "payment {payment_id} references missing invoice {invoice_id}"
            ))
        })?;

        payment.mark_voided(reason)?;
        invoice.reverse_amount(payment.amount)?;

        info!(
            invoice = %invoice.invoice_number,
            payment = %payment_id,
            amount = %payment.amount,
            status = invoice.status.as_str(),
            "payment voided"
        );

        let amount = payment.amount;
        self.invoices.insert(invoice_id, invoice);
        self.payments.insert(payment_id, payment);

        self.notify(LedgerEvent::PaymentVoided {
            invoice_id,
            payment_id,
            amount,
        });
        Ok(())
    }

    /// Refunds part or all of an applied payment
    pub fn refund_payment(
        &mut self,
        payment_id: PaymentId,
        amount: Money,
        reason: impl Into<String>,
    ) -> Result<(), BillingError> {
        let mut payment = self
            .payments
            .get(&payment_id)
            .cloned()
            .ok_or_else(|| BillingError::PaymentNotFound(payment_id.to_string()))?;

        let invoice_id = payment.invoice_id;
        let mut invoice = self.invoice_for_update(invoice_id).map_err(|_| {
            BillingError::invariant(format!(
                "payment {payment_id} references missing invoice {invoice_id}"
            ))
        })?;

        payment.record_refund(amount, reason)?;
        invoice.reverse_amount(amount)?;

        info!(
            invoice = %invoice.invoice_number,
            payment = %payment_id,
            amount = %amount,
            refunded_total = %payment.refunded_total,
            status = invoice.status.as_str(),
            "payment refunded"
        );

        self.invoices.insert(invoice_id, invoice);
        self.payments.insert(payment_id, payment);

        self.notify(LedgerEvent::PaymentRefunded {
            invoice_id,
            payment_id,
            amount,
        });
        Ok(())
    }

    /// Audits every invoice against the ledger invariants
    ///
    /// Verifies the balance identity and that each invoice's paid amount
    /// equals the net applied payments recorded against it. A violation is
    /// surfaced for investigation, never silently corrected.
    pub fn verify_invariants(&self) -> Result<(), BillingError> {
        for invoice in self.invoices.values() {
            invoice.check_invariant()?;

            let mut applied = Money::zero(invoice.currency);
            for payment in self.payments.values() {
                if payment.invoice_id == invoice.id {
                    applied = applied.checked_add(&payment.applied_net())?;
                }
            }
            if applied != invoice.paid_amount {
                return Err(BillingError::invariant(format!(
                    "invoice {}: paid {} != net applied payments {}",
                    invoice.invoice_number, invoice.paid_amount, applied
                )));
            }
        }
        Ok(())
    }

    fn invoice_for_update(&self, invoice_id: InvoiceId) -> Result<Invoice, BillingError> {
        self.invoices
            .get(&invoice_id)
            .cloned()
            .ok_or_else(|| BillingError::InvoiceNotFound(invoice_id.to_string()))
    }

    fn notify(&self, event: LedgerEvent) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.notify(event);
        }
    }
}
