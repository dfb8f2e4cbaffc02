//! End-to-end tests for the billing domain
//!
//! Covers the full generate → approve → pay → reverse workflow and the
//! ledger's money-safety properties.

use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};

use core_kernel::{Currency, Money, StaffId};
use domain_billing::{
    BillingError, CollectionsReporter, InvoiceGenerator, InvoiceStatus, LedgerEvent,
    NotificationDispatcher, PaymentLedger, PaymentMethod, PaymentStatus, PostPayment,
};
use domain_fees::{FeeItem, FeeItemRule, FeeRuleResolver, InstallmentPlan};
use test_utils::assertions::{assert_balance_invariant, assert_money_eq};
use test_utils::builders::{ApprovedInvoiceBuilder, StudentContextBuilder};
use test_utils::fixtures::MoneyFixtures;

fn usd(amount: rust_decimal::Decimal) -> Money {
    MoneyFixtures::usd(amount)
}

mod full_workflow {
    use super::*;

    #[test]
    fn test_generate_approve_and_settle_in_installments() {
        let ctx = StudentContextBuilder::new().build();
        let tuition = FeeItem::new("TUITION", "Tuition");
        let library = FeeItem::new("LIBRARY", "Library Fee");

        let resolver = FeeRuleResolver::new(vec![
            FeeItemRule::new(tuition.id, ctx.academic_year, usd(dec!(850)))
                .for_class(ctx.class_id),
            FeeItemRule::new(tuition.id, ctx.academic_year, usd(dec!(800))),
            FeeItemRule::new(library.id, ctx.academic_year, usd(dec!(150))),
        ]);
        let plan = InstallmentPlan::new("Termly 40/30/30")
            .percentage("First term", 0, dec!(40))
            .percentage("Second term", 90, dec!(30))
            .percentage("Third term", 180, dec!(30));

        let generator = InvoiceGenerator::new(resolver, Currency::USD);
        let invoice = generator
            .generate(
                &ctx,
                &[tuition, library],
                Some(&plan),
                chrono::NaiveDate::from_ymd_opt(2025, 9, 30).unwrap(),
            )
            .unwrap();

        // Class-scoped tuition rule won: 850 + 150
        assert_money_eq(&invoice.total_amount, &usd(dec!(1000)));
        let schedule = invoice.schedule.as_ref().unwrap();
        let amounts: Vec<_> = schedule.entries.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![usd(dec!(400)), usd(dec!(300)), usd(dec!(300))]);

        let mut ledger = PaymentLedger::new();
        let invoice_id = ledger.register_invoice(invoice).unwrap();
        ledger.submit_invoice(invoice_id).unwrap();
        ledger
            .approve_invoice(invoice_id, StaffId::new(), Some("bursar sign-off".into()))
            .unwrap();

        // Pay per the schedule
        for (i, amount) in [dec!(400), dec!(300), dec!(300)].iter().enumerate() {
            ledger
                .post_payment(
                    invoice_id,
                    PostPayment::new(
                        usd(*amount),
                        PaymentMethod::BankTransfer,
                        format!("installment-{i}"),
                        StaffId::new(),
                    ),
                )
                .unwrap();
        }

        let invoice = ledger.invoice(&invoice_id).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert!(invoice.balance.is_zero());
        assert_balance_invariant(invoice);
        ledger.verify_invariants().unwrap();
    }
}

mod scenarios {
    use super::*;

    /// Balance 500.00, pay 500.00 → paid, balance 0; any further posting
    /// fails with a state error.
    #[test]
    fn test_full_payment_then_posting_rejected() {
        let mut ledger = PaymentLedger::new();
        let invoice = ApprovedInvoiceBuilder::new().with_total(usd(dec!(500))).build();
        let invoice_id = ledger.register_invoice(invoice).unwrap();

        ledger
            .post_payment(
                invoice_id,
                PostPayment::new(usd(dec!(500)), PaymentMethod::Cash, "k1", StaffId::new()),
            )
            .unwrap();

        let invoice = ledger.invoice(&invoice_id).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert!(invoice.balance.is_zero());

        let result = ledger.post_payment(
            invoice_id,
            PostPayment::new(usd(dec!(0.01)), PaymentMethod::Cash, "k2", StaffId::new()),
        );
        assert!(matches!(result, Err(BillingError::State(_))));
    }

    /// Balance 300.00, pay 100.00 (partial, 200.00 left), void the payment
    /// → balance back to 300.00, status back to approved.
    #[test]
    fn test_void_restores_approved() {
        let mut ledger = PaymentLedger::new();
        let invoice = ApprovedInvoiceBuilder::new().with_total(usd(dec!(300))).build();
        let invoice_id = ledger.register_invoice(invoice).unwrap();

        let payment = ledger
            .post_payment(
                invoice_id,
                PostPayment::new(usd(dec!(100)), PaymentMethod::Cash, "k1", StaffId::new()),
            )
            .unwrap();

        {
            let invoice = ledger.invoice(&invoice_id).unwrap();
            assert_eq!(invoice.status, InvoiceStatus::Partial);
            assert_money_eq(&invoice.balance, &usd(dec!(200)));
        }

        ledger.void_payment(payment.id, "keyed against wrong student").unwrap();

        let invoice = ledger.invoice(&invoice_id).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Approved);
        assert_money_eq(&invoice.balance, &usd(dec!(300)));
        assert_eq!(
            ledger.payment(&payment.id).unwrap().status,
            PaymentStatus::Voided
        );
        ledger.verify_invariants().unwrap();
    }
}

mod properties {
    use super::*;

    /// Posting twice with the same idempotency key produces exactly one
    /// payment row and one balance decrement.
    #[test]
    fn test_idempotent_posting() {
        let mut ledger = PaymentLedger::new();
        let invoice = ApprovedInvoiceBuilder::new().with_total(usd(dec!(500))).build();
        let invoice_id = ledger.register_invoice(invoice).unwrap();

        let cmd = PostPayment::new(usd(dec!(150)), PaymentMethod::MobileMoney, "mpesa-778", StaffId::new());
        let first = ledger.post_payment(invoice_id, cmd.clone()).unwrap();
        let replay = ledger.post_payment(invoice_id, cmd).unwrap();

        assert_eq!(first.id, replay.id);
        assert_eq!(ledger.payments().count(), 1);
        assert_money_eq(&ledger.invoice(&invoice_id).unwrap().balance, &usd(dec!(350)));
    }

    /// Post followed by void restores balance and paid amount exactly.
    #[test]
    fn test_reversal_symmetry() {
        let mut ledger = PaymentLedger::new();
        let invoice = ApprovedInvoiceBuilder::new().with_total(usd(dec!(777.77))).build();
        let invoice_id = ledger.register_invoice(invoice).unwrap();

        let before = ledger.invoice(&invoice_id).unwrap().clone();
        let payment = ledger
            .post_payment(
                invoice_id,
                PostPayment::new(usd(dec!(123.45)), PaymentMethod::Card, "k1", StaffId::new()),
            )
            .unwrap();
        ledger.void_payment(payment.id, "reversal test").unwrap();

        let after = ledger.invoice(&invoice_id).unwrap();
        assert_money_eq(&after.balance, &before.balance);
        assert_money_eq(&after.paid_amount, &before.paid_amount);
        assert_eq!(after.status, before.status);
    }

    /// A refund of part of a payment keeps the payment applied; refunding
    /// the remainder flips it, and the invoice walks back through partial.
    #[test]
    fn test_partial_refund_accounting() {
        let mut ledger = PaymentLedger::new();
        let invoice = ApprovedInvoiceBuilder::new().with_total(usd(dec!(400))).build();
        let invoice_id = ledger.register_invoice(invoice).unwrap();

        let payment = ledger
            .post_payment(
                invoice_id,
                PostPayment::new(usd(dec!(400)), PaymentMethod::Cash, "k1", StaffId::new()),
            )
            .unwrap();

        ledger.refund_payment(payment.id, usd(dec!(150)), "overcharge").unwrap();
        {
            let invoice = ledger.invoice(&invoice_id).unwrap();
            let payment = ledger.payment(&payment.id).unwrap();
            assert_eq!(payment.status, PaymentStatus::Applied);
            assert_money_eq(&payment.refunded_total, &usd(dec!(150)));
            assert_eq!(invoice.status, InvoiceStatus::Partial);
            assert_balance_invariant(invoice);
        }

        ledger.refund_payment(payment.id, usd(dec!(250)), "withdrawal").unwrap();
        let invoice = ledger.invoice(&invoice_id).unwrap();
        assert_eq!(
            ledger.payment(&payment.id).unwrap().status,
            PaymentStatus::Refunded
        );
        assert_eq!(invoice.status, InvoiceStatus::Approved);
        assert_money_eq(&invoice.balance, &usd(dec!(400)));
        ledger.verify_invariants().unwrap();
    }

    /// Overpayment requires the explicit override flag.
    #[test]
    fn test_overpayment_gate() {
        let mut ledger = PaymentLedger::new();
        let invoice = ApprovedInvoiceBuilder::new().with_total(usd(dec!(100))).build();
        let invoice_id = ledger.register_invoice(invoice).unwrap();

        let rejected = ledger.post_payment(
            invoice_id,
            PostPayment::new(usd(dec!(120)), PaymentMethod::Cash, "k1", StaffId::new()),
        );
        assert!(matches!(rejected, Err(BillingError::State(_))));

        ledger
            .post_payment(
                invoice_id,
                PostPayment::new(usd(dec!(120)), PaymentMethod::Cash, "k1", StaffId::new())
                    .allow_overpayment(),
            )
            .unwrap();

        let invoice = ledger.invoice(&invoice_id).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_money_eq(&invoice.balance, &usd(dec!(-20)));
        assert_balance_invariant(invoice);
    }
}

mod events {
    use super::*;

    #[derive(Default)]
    struct RecordingDispatcher {
        events: Mutex<Vec<LedgerEvent>>,
    }

    impl core_kernel::DomainPort for RecordingDispatcher {}

    impl NotificationDispatcher for RecordingDispatcher {
        fn notify(&self, event: LedgerEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_ledger_emits_events_after_mutations() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let mut ledger = PaymentLedger::new().with_dispatcher(dispatcher.clone());

        let invoice = ApprovedInvoiceBuilder::new().with_total(usd(dec!(200))).build();
        let invoice_id = ledger.register_invoice(invoice).unwrap();
        let payment = ledger
            .post_payment(
                invoice_id,
                PostPayment::new(usd(dec!(200)), PaymentMethod::Cash, "k1", StaffId::new()),
            )
            .unwrap();
        ledger.refund_payment(payment.id, usd(dec!(200)), "withdrawal").unwrap();

        let events = dispatcher.events.lock().unwrap();
        assert!(matches!(events[0], LedgerEvent::InvoiceGenerated { .. }));
        assert!(matches!(events[1], LedgerEvent::PaymentPosted { .. }));
        assert!(matches!(events[2], LedgerEvent::PaymentRefunded { .. }));
    }

    #[test]
    fn test_failed_mutation_emits_nothing() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let mut ledger = PaymentLedger::new().with_dispatcher(dispatcher.clone());

        let invoice = ApprovedInvoiceBuilder::new().with_total(usd(dec!(100))).build();
        let invoice_id = ledger.register_invoice(invoice).unwrap();
        dispatcher.events.lock().unwrap().clear();

        let _ = ledger.post_payment(
            invoice_id,
            PostPayment::new(usd(dec!(500)), PaymentMethod::Cash, "k1", StaffId::new()),
        );
        assert!(dispatcher.events.lock().unwrap().is_empty());
    }
}

mod reporting {
    use super::*;

    #[test]
    fn test_collections_views_reflect_ledger_state() {
        let mut ledger = PaymentLedger::new();
        let due = chrono::NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let as_of = chrono::NaiveDate::from_ymd_opt(2025, 5, 15).unwrap();

        let invoice = ApprovedInvoiceBuilder::new()
            .with_total(usd(dec!(600)))
            .with_due_date(due)
            .build();
        let student = invoice.student_id;
        let invoice_id = ledger.register_invoice(invoice).unwrap();
        ledger
            .post_payment(
                invoice_id,
                PostPayment::new(usd(dec!(100)), PaymentMethod::Cash, "k1", StaffId::new()),
            )
            .unwrap();

        let reporter = CollectionsReporter::new(&ledger, Currency::USD);

        let overdue = reporter.overdue_invoices(as_of);
        assert_eq!(overdue.len(), 1);
        assert_money_eq(&overdue[0].balance, &usd(dec!(500)));

        let report = reporter.aging_buckets(as_of);
        // 45 days overdue lands in 31-60
        assert_eq!(report.buckets[1].invoice_count, 1);
        assert_money_eq(&report.buckets[1].outstanding, &usd(dec!(500)));

        let debtors = reporter.top_debtors(5);
        assert_eq!(debtors[0].student_id, student);
        assert_money_eq(&debtors[0].outstanding, &usd(dec!(500)));
    }
}

#[cfg(test)]
mod invariant_proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any sequence of valid postings keeps the balance identity.
        #[test]
        fn postings_preserve_invariants(amounts in proptest::collection::vec(1i64..50_000i64, 1..8)) {
            let mut ledger = PaymentLedger::new();
            let invoice = ApprovedInvoiceBuilder::new()
                .with_total(Money::from_minor(10_000_000, Currency::USD))
                .build();
            let invoice_id = ledger.register_invoice(invoice).unwrap();

            for (i, minor) in amounts.iter().enumerate() {
                let amount = Money::from_minor(*minor, Currency::USD);
                ledger
                    .post_payment(
                        invoice_id,
                        PostPayment::new(amount, PaymentMethod::Cash, format!("k{i}"), StaffId::new()),
                    )
                    .unwrap();
                prop_assert!(ledger.verify_invariants().is_ok());
            }
        }
    }
}
