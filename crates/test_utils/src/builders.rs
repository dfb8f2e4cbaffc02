//! Test Data Builders
//!
//! Builder patterns for constructing test data with sensible defaults,
//! so tests specify only the fields they care about.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use core_kernel::{AcademicYear, ClassId, FeeItemId, Money, StudentId, TermId};
use domain_billing::{Invoice, InvoiceItem};
use domain_fees::StudentContext;

use crate::fixtures::{IdFixtures, MoneyFixtures, TemporalFixtures};

/// Monotonic suffix so builder-made invoice numbers never collide in a test
static INVOICE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Builder for a student's resolution context
pub struct StudentContextBuilder {
    student_id: StudentId,
    class_id: ClassId,
    term_id: TermId,
    level: Option<String>,
    academic_year: AcademicYear,
}

impl Default for StudentContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StudentContextBuilder {
    /// Creates a builder with default values
    pub fn new() -> Self {
        Self {
            student_id: IdFixtures::student_id(),
            class_id: IdFixtures::class_id(),
            term_id: IdFixtures::term_id(),
            level: Some("primary".to_string()),
            academic_year: AcademicYear::new(2025),
        }
    }

    /// Sets the class
    pub fn with_class(mut self, class_id: ClassId) -> Self {
        self.class_id = class_id;
        self
    }

    /// Sets the level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Clears the level (student directory had none on record)
    pub fn without_level(mut self) -> Self {
        self.level = None;
        self
    }

    /// Sets the academic year
    pub fn with_academic_year(mut self, year: AcademicYear) -> Self {
        self.academic_year = year;
        self
    }

    /// Builds the context
    pub fn build(self) -> StudentContext {
        StudentContext {
            student_id: self.student_id,
            class_id: self.class_id,
            term_id: self.term_id,
            level: self.level,
            academic_year: self.academic_year,
        }
    }
}

/// Builder for an invoice already approved and open for payment
pub struct ApprovedInvoiceBuilder {
    student_id: StudentId,
    total: Money,
    due_date: NaiveDate,
}

impl Default for ApprovedInvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovedInvoiceBuilder {
    /// Creates a builder with default values
    pub fn new() -> Self {
        Self {
            student_id: IdFixtures::student_id(),
            total: MoneyFixtures::tuition(),
            due_date: TemporalFixtures::term_due_date(),
        }
    }

    /// Sets the billed student
    pub fn with_student(mut self, student_id: StudentId) -> Self {
        self.student_id = student_id;
        self
    }

    /// Sets the invoice total (a single tuition line)
    pub fn with_total(mut self, total: Money) -> Self {
        self.total = total;
        self
    }

    /// Sets the due date
    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = due_date;
        self
    }

    /// Builds the approved invoice
    pub fn build(self) -> Invoice {
        let sequence = INVOICE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut invoice = Invoice::new(
            format!("INVT{sequence:06}"),
            self.student_id,
            IdFixtures::class_id(),
            IdFixtures::term_id(),
            AcademicYear::new(2025),
            self.total.currency(),
            vec![InvoiceItem::new(FeeItemId::new(), "Tuition", self.total)],
            self.due_date,
        )
        .expect("builder produces a valid invoice");
        invoice.submit_for_approval().expect("draft submits");
        invoice
            .approve(IdFixtures::staff_id(), None)
            .expect("pending invoice approves");
        invoice
    }
}
