//! Collections reporting
//!
//! Read-only aggregation over the ledger: overdue invoices, aging buckets,
//! and top debtors. The reporter borrows the ledger immutably, never locks
//! anything, and tolerates slightly stale state.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

use core_kernel::{Currency, Money, StudentId};

use crate::invoice::Invoice;
use crate::ledger::PaymentLedger;

/// Aging bucket boundaries in days overdue
const BUCKETS: [(&str, i64, Option<i64>); 4] = [
    ("0-30", 1, Some(30)),
    ("31-60", 31, Some(60)),
    ("61-90", 61, Some(90)),
    ("90+", 91, None),
];

/// One aging bucket in the report
#[derive(Debug, Clone, Serialize)]
pub struct AgingBucket {
    pub label: String,
    pub invoice_count: usize,
    pub outstanding: Money,
}

/// Receivables grouped by how long they are overdue
#[derive(Debug, Clone, Serialize)]
pub struct AgingReport {
    pub as_of: NaiveDate,
    pub buckets: Vec<AgingBucket>,
}

/// A student's total outstanding position
#[derive(Debug, Clone, Serialize)]
pub struct DebtorSummary {
    pub student_id: StudentId,
    pub outstanding: Money,
    pub invoice_count: usize,
}

/// Read-side queries over the payment ledger
///
/// The reporter is scoped to one currency; invoices in other currencies
/// are ignored rather than summed across units.
pub struct CollectionsReporter<'a> {
    ledger: &'a PaymentLedger,
    currency: Currency,
}

impl<'a> CollectionsReporter<'a> {
    pub fn new(ledger: &'a PaymentLedger, currency: Currency) -> Self {
        Self { ledger, currency }
    }

    /// Invoices still owing money past their due date, oldest first
    pub fn overdue_invoices(&self, as_of: NaiveDate) -> Vec<&'a Invoice> {
        let mut overdue: Vec<&Invoice> = self
            .ledger
            .invoices()
            .filter(|i| i.currency == self.currency && i.is_overdue(as_of))
            .collect();
        overdue.sort_by_key(|i| (i.due_date, i.invoice_number.clone()));
        overdue
    }

    /// Outstanding receivables bucketed by days overdue
    pub fn aging_buckets(&self, as_of: NaiveDate) -> AgingReport {
        let mut buckets: Vec<AgingBucket> = BUCKETS
            .iter()
            .map(|(label, _, _)| AgingBucket {
                label: (*label).to_string(),
                invoice_count: 0,
                outstanding: Money::zero(self.currency),
            })
            .collect();

        for invoice in self.overdue_invoices(as_of) {
            let days = (as_of - invoice.due_date).num_days();
            for (slot, (_, min, max)) in BUCKETS.iter().enumerate() {
                let in_range = days >= *min && max.map_or(true, |m| days <= m);
                if in_range {
                    buckets[slot].invoice_count += 1;
                    buckets[slot].outstanding = buckets[slot].outstanding + invoice.balance;
                    break;
                }
            }
        }

        AgingReport {
            as_of,
            buckets,
        }
    }

    /// The students owing the most, largest first
    pub fn top_debtors(&self, limit: usize) -> Vec<DebtorSummary> {
        let mut by_student: HashMap<StudentId, DebtorSummary> = HashMap::new();

        for invoice in self
            .ledger
            .invoices()
            .filter(|i| i.currency == self.currency)
            .filter(|i| i.status.is_payable() && i.balance.is_positive())
        {
            let entry = by_student
                .entry(invoice.student_id)
                .or_insert_with(|| DebtorSummary {
                    student_id: invoice.student_id,
                    outstanding: Money::zero(self.currency),
                    invoice_count: 0,
                });
            entry.outstanding = entry.outstanding + invoice.balance;
            entry.invoice_count += 1;
        }

        let mut debtors: Vec<DebtorSummary> = by_student.into_values().collect();
        debtors.sort_by(|a, b| {
            b.outstanding
                .amount()
                .cmp(&a.outstanding.amount())
                .then(a.student_id.cmp(&b.student_id))
        });
        debtors.truncate(limit);
        debtors
    }
}
