//! Core Kernel - Foundational types for the student billing system
//!
//! This crate provides the fundamental building blocks used across all
//! domain modules:
//! - Money types with precise decimal arithmetic
//! - Strongly-typed identifiers and the academic-year value type
//! - Port infrastructure for external collaborators

pub mod identifiers;
pub mod money;
pub mod ports;

pub use identifiers::{
    AcademicYear, ClassId, FeeGroupId, FeeItemId, FeeRuleId, InstallmentPlanId, InvoiceId,
    InvoiceItemId, PaymentId, StaffId, StudentId, TermId,
};
pub use money::{Currency, Money, MoneyError, Rate};
pub use ports::{DomainPort, PortError};
