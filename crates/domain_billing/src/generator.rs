//! Invoice generation
//!
//! The generator composes an invoice from resolved fee rules: one line per
//! resolved item, optional unmatched items skipped, and every missing
//! mandatory item reported in a single aggregated error so callers see
//! everything wrong at once.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Days, NaiveDate, Utc};
use tracing::info;

use core_kernel::{AcademicYear, Currency};
use domain_fees::{FeeItem, FeeRuleResolver, InstallmentPlan, InstallmentPlanner, StudentContext};

use crate::error::BillingError;
use crate::invoice::{InstallmentSchedule, Invoice, InvoiceItem, ScheduleEntry};

/// Allocates human-readable invoice numbers
///
/// Numbers are `INV<start year><zero-padded sequence>`, one sequence per
/// academic year. Allocation is a single locked increment, so concurrent
/// generation never hands out the same number twice.
#[derive(Debug, Default)]
pub struct InvoiceNumberSequence {
    counters: Mutex<HashMap<i32, u64>>,
}

impl InvoiceNumberSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next number for the academic year
    pub fn next(&self, year: AcademicYear) -> String {
        let mut counters = self.counters.lock().expect("sequence lock poisoned");
        let counter = counters.entry(year.start_year()).or_insert(0);
        *counter += 1;
        format!("INV{}{:06}", year.start_year(), counter)
    }
}

/// Builds draft invoices from the fee catalog
pub struct InvoiceGenerator {
    resolver: FeeRuleResolver,
    planner: InstallmentPlanner,
    sequence: InvoiceNumberSequence,
    currency: Currency,
}

impl InvoiceGenerator {
    /// Creates a generator over a loaded rule set
    pub fn new(resolver: FeeRuleResolver, currency: Currency) -> Self {
        Self {
            resolver,
            planner: InstallmentPlanner::new(),
            sequence: InvoiceNumberSequence::new(),
            currency,
        }
    }

    /// Overrides the installment planner (e.g., a custom tolerance)
    pub fn with_planner(mut self, planner: InstallmentPlanner) -> Self {
        self.planner = planner;
        self
    }

    /// Generates a draft invoice for the student's context
    ///
    /// Resolves every requested fee item, skipping optional items with no
    /// matching rule. When an installment plan is given, the split schedule
    /// is attached as due-date metadata; the invoice still carries a single
    /// running balance.
    ///
    /// # Errors
    ///
    /// - `BillingError::UnresolvedFeeItems` listing every mandatory item
    ///   with no matching rule
    /// - `BillingError::Fees` when the installment plan is invalid
    pub fn generate(
        &self,
        ctx: &StudentContext,
        fee_items: &[FeeItem],
        plan: Option<&InstallmentPlan>,
        due_date: NaiveDate,
    ) -> Result<Invoice, BillingError> {
        if fee_items.is_empty() {
            return Err(BillingError::validation(
                "at least one fee item must be requested",
            ));
        }

        let mut items = Vec::new();
        let mut missing = Vec::new();

        for fee_item in fee_items {
            match self.resolver.resolve(fee_item, ctx) {
                Ok(Some(amount)) => {
                    let mut line = InvoiceItem::new(fee_item.id, fee_item.name.clone(), amount);
                    if !fee_item.mandatory {
                        line = line.optional();
                    }
                    items.push(line);
                }
                Ok(None) => {}
                Err(_) => missing.push(fee_item.code.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(BillingError::UnresolvedFeeItems { items: missing });
        }

        let invoice_number = self.sequence.next(ctx.academic_year);
        let mut invoice = Invoice::new(
            invoice_number,
            ctx.student_id,
            ctx.class_id,
            ctx.term_id,
            ctx.academic_year,
            self.currency,
            items,
            due_date,
        )?;

        if let Some(plan) = plan {
            let issue_date = Utc::now().date_naive();
            let installments = self.planner.split(invoice.total_amount, plan)?;
            let entries = installments
                .into_iter()
                .map(|i| ScheduleEntry {
                    label: i.label,
                    due_date: offset_date(issue_date, i.due_offset_days),
                    amount: i.amount,
                })
                .collect();
            invoice = invoice.with_schedule(InstallmentSchedule {
                plan_id: plan.id,
                entries,
            });
        }

        info!(
            invoice = %invoice.invoice_number,
            student = %ctx.student_id,
            total = %invoice.total_amount,
            items = invoice.items.len(),
            "invoice generated"
        );
        Ok(invoice)
    }
}

fn offset_date(base: NaiveDate, offset_days: i64) -> NaiveDate {
    if offset_days >= 0 {
        base.checked_add_days(Days::new(offset_days as u64))
            .unwrap_or(base)
    } else {
        base.checked_sub_days(Days::new(offset_days.unsigned_abs()))
            .unwrap_or(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::InvoiceStatus;
    use core_kernel::{ClassId, Money, StudentId, TermId};
    use domain_fees::FeeItemRule;
    use rust_decimal_macros::dec;

    fn usd(amount: rust_decimal::Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    fn context() -> StudentContext {
        StudentContext {
            student_id: StudentId::new(),
            class_id: ClassId::new(),
            term_id: TermId::new(),
            level: Some("primary".to_string()),
            academic_year: AcademicYear::new(2025),
        }
    }

    fn due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 30).unwrap()
    }

    #[test]
    fn test_generates_draft_with_line_per_item() {
        let ctx = context();
        let tuition = FeeItem::new("TUITION", "Tuition");
        let library = FeeItem::new("LIBRARY", "Library Fee");

        let resolver = FeeRuleResolver::new(vec![
            FeeItemRule::new(tuition.id, ctx.academic_year, usd(dec!(900))),
            FeeItemRule::new(library.id, ctx.academic_year, usd(dec!(100))),
        ]);

        let generator = InvoiceGenerator::new(resolver, Currency::USD);
        let invoice = generator
            .generate(&ctx, &[tuition, library], None, due_date())
            .unwrap();

        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.items.len(), 2);
        assert_eq!(invoice.total_amount, usd(dec!(1000)));
        assert_eq!(invoice.balance, usd(dec!(1000)));
        assert!(invoice.paid_amount.is_zero());
    }

    #[test]
    fn test_optional_unmatched_item_is_skipped() {
        let ctx = context();
        let tuition = FeeItem::new("TUITION", "Tuition");
        let swimming = FeeItem::new("SWIM", "Swimming").optional();

        let resolver = FeeRuleResolver::new(vec![FeeItemRule::new(
            tuition.id,
            ctx.academic_year,
            usd(dec!(900)),
        )]);

        let generator = InvoiceGenerator::new(resolver, Currency::USD);
        let invoice = generator
            .generate(&ctx, &[tuition, swimming], None, due_date())
            .unwrap();

        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.total_amount, usd(dec!(900)));
    }

    #[test]
    fn test_all_missing_mandatory_items_reported_at_once() {
        let ctx = context();
        let tuition = FeeItem::new("TUITION", "Tuition");
        let transport = FeeItem::new("TRANSPORT", "Transport");
        let library = FeeItem::new("LIBRARY", "Library Fee");

        let resolver = FeeRuleResolver::new(vec![FeeItemRule::new(
            library.id,
            ctx.academic_year,
            usd(dec!(100)),
        )]);

        let generator = InvoiceGenerator::new(resolver, Currency::USD);
        let err = generator
            .generate(&ctx, &[tuition, transport, library], None, due_date())
            .unwrap_err();

        match err {
            BillingError::UnresolvedFeeItems { items } => {
                assert_eq!(items, vec!["TUITION".to_string(), "TRANSPORT".to_string()]);
            }
            other => panic!("expected UnresolvedFeeItems, got {other}"),
        }
    }

    #[test]
    fn test_schedule_attached_with_due_dates() {
        let ctx = context();
        let tuition = FeeItem::new("TUITION", "Tuition");
        let resolver = FeeRuleResolver::new(vec![FeeItemRule::new(
            tuition.id,
            ctx.academic_year,
            usd(dec!(1000)),
        )]);
        let plan = InstallmentPlan::new("Termly 40/30/30")
            .percentage("First", 0, dec!(40))
            .percentage("Second", 90, dec!(30))
            .percentage("Third", 180, dec!(30));

        let generator = InvoiceGenerator::new(resolver, Currency::USD);
        let invoice = generator
            .generate(&ctx, &[tuition], Some(&plan), due_date())
            .unwrap();

        let schedule = invoice.schedule.expect("schedule attached");
        assert_eq!(schedule.plan_id, plan.id);
        assert_eq!(schedule.entries.len(), 3);
        assert_eq!(schedule.entries[0].amount, usd(dec!(400)));

        let issue = Utc::now().date_naive();
        assert_eq!(schedule.entries[0].due_date, issue);
        assert_eq!(schedule.entries[1].due_date, issue + Days::new(90));
    }

    #[test]
    fn test_invoice_numbers_are_unique_and_yearly() {
        let ctx = context();
        let tuition = FeeItem::new("TUITION", "Tuition");
        let resolver = FeeRuleResolver::new(vec![FeeItemRule::new(
            tuition.id,
            ctx.academic_year,
            usd(dec!(100)),
        )]);
        let generator = InvoiceGenerator::new(resolver, Currency::USD);

        let first = generator
            .generate(&ctx, &[tuition.clone()], None, due_date())
            .unwrap();
        let second = generator
            .generate(&ctx, &[tuition], None, due_date())
            .unwrap();

        assert_eq!(first.invoice_number, "INV2025000001");
        assert_eq!(second.invoice_number, "INV2025000002");
    }

    #[test]
    fn test_sequence_is_collision_free_across_threads() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let sequence = Arc::new(InvoiceNumberSequence::new());
        let year = AcademicYear::new(2025);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sequence = Arc::clone(&sequence);
                std::thread::spawn(move || {
                    (0..100).map(|_| sequence.next(year)).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for number in handle.join().unwrap() {
                assert!(seen.insert(number), "duplicate invoice number allocated");
            }
        }
        assert_eq!(seen.len(), 800);
    }
}
