//! Billing Domain - Invoice Lifecycle and Payment Ledger
//!
//! This crate implements the financially sensitive half of student billing:
//! invoice generation, the approval state machine, and the payment ledger
//! that atomically posts, voids, and refunds payments.
//!
//! # Money safety
//!
//! Every mutation preserves `balance == total_amount - paid_amount`, and
//! the paid amount always equals the applied payments net of partial
//! refunds. Operations stage their changes and write back only on success,
//! so a failed posting is never partially visible. Idempotency keys make
//! retried postings safe.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{PaymentLedger, PostPayment, PaymentMethod};
//!
//! let mut ledger = PaymentLedger::new();
//! let invoice_id = ledger.register_invoice(invoice)?;
//! ledger.approve_invoice(invoice_id, approver, None)?;
//!
//! let payment = ledger.post_payment(
//!     invoice_id,
//!     PostPayment::new(amount, PaymentMethod::Cash, "receipt-41", cashier),
//! )?;
//! ```

pub mod error;
pub mod generator;
pub mod invoice;
pub mod ledger;
pub mod payment;
pub mod ports;
pub mod reporting;

pub use error::BillingError;
pub use generator::{InvoiceGenerator, InvoiceNumberSequence};
pub use invoice::{
    Approval, InstallmentSchedule, Invoice, InvoiceItem, InvoiceStatus, ScheduleEntry,
};
pub use ledger::{PaymentLedger, PostPayment};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use ports::{LedgerEvent, NotificationDispatcher, StudentDirectory, StudentRecord};
pub use reporting::{AgingBucket, AgingReport, CollectionsReporter, DebtorSummary};
