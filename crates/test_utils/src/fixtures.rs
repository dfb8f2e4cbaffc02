//! Common Test Fixtures
//!
//! Canonical values used across the test suite.

use chrono::NaiveDate;
use core_kernel::{ClassId, Currency, Money, StaffId, StudentId, TermId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Money values for tests
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A USD amount
    pub fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    /// A typical term tuition charge
    pub fn tuition() -> Money {
        Self::usd(dec!(1000.00))
    }
}

/// Dates for tests
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// A term payment due date
    pub fn term_due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 30).expect("valid date")
    }

    /// A reporting cut-off after the term due date
    pub fn reporting_as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 15).expect("valid date")
    }
}

/// Identifier factories for tests
pub struct IdFixtures;

impl IdFixtures {
    pub fn student_id() -> StudentId {
        StudentId::new()
    }

    pub fn class_id() -> ClassId {
        ClassId::new()
    }

    pub fn term_id() -> TermId {
        TermId::new()
    }

    pub fn staff_id() -> StaffId {
        StaffId::new()
    }
}
