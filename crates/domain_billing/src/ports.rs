//! Collaborator ports consumed by the billing domain
//!
//! The billing core reads student identity from the directory and reports
//! ledger events to the notification channel. Both are ports: the caller
//! wires up the adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{ClassId, DomainPort, InvoiceId, Money, PaymentId, PortError, StaffId, StudentId};

/// What the billing core needs to know about a student
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRecord {
    pub class_id: ClassId,
    pub level: Option<String>,
}

/// Identity lookups against the student information system
#[async_trait]
pub trait StudentDirectory: DomainPort {
    /// Fetches a student's class and level
    async fn get(&self, student_id: StudentId) -> Result<StudentRecord, PortError>;
}

/// A billing event worth telling someone about
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    InvoiceGenerated {
        invoice_id: InvoiceId,
        student_id: StudentId,
        total: Money,
    },
    InvoiceApproved {
        invoice_id: InvoiceId,
        approver: StaffId,
    },
    InvoiceRejected {
        invoice_id: InvoiceId,
        reason: String,
    },
    PaymentPosted {
        invoice_id: InvoiceId,
        payment_id: PaymentId,
        amount: Money,
    },
    PaymentVoided {
        invoice_id: InvoiceId,
        payment_id: PaymentId,
        amount: Money,
    },
    PaymentRefunded {
        invoice_id: InvoiceId,
        payment_id: PaymentId,
        amount: Money,
    },
}

/// Fire-and-forget notification dispatch
///
/// Called after the financial mutation has been committed; implementations
/// must not block the caller and must swallow their own failures (log and
/// move on). A lost notification is acceptable, a rolled-back payment
/// is not.
pub trait NotificationDispatcher: DomainPort {
    fn notify(&self, event: LedgerEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ledger_event_serializes_with_tag() {
        let event = LedgerEvent::PaymentPosted {
            invoice_id: InvoiceId::new(),
            payment_id: PaymentId::new(),
            amount: Money::new(dec!(100), Currency::USD),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"payment_posted\""));
    }
}
