//! Custom Test Assertions
//!
//! Assertion helpers for domain types that give more meaningful failure
//! messages than standard assertions.

use core_kernel::Money;
use domain_billing::Invoice;

/// Asserts that two Money values are exactly equal, including currency
///
/// # Panics
///
/// Panics with both values spelled out when they differ.
pub fn assert_money_eq(actual: &Money, expected: &Money) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );
    assert_eq!(
        actual.amount(),
        expected.amount(),
        "Money amounts differ: actual={}, expected={}",
        actual,
        expected
    );
}

/// Asserts that a Money value is strictly positive
pub fn assert_money_positive(money: &Money) {
    assert!(
        money.is_positive(),
        "Expected positive money, got {}",
        money
    );
}

/// Asserts the invoice balance identity and item-sum invariant
///
/// # Panics
///
/// Panics with the violated identity when the invoice is inconsistent.
pub fn assert_balance_invariant(invoice: &Invoice) {
    invoice
        .check_invariant()
        .unwrap_or_else(|e| panic!("ledger invariant violated: {e}"));

    let expected = invoice.total_amount - invoice.paid_amount;
    assert_money_eq(&invoice.balance, &expected);
}
