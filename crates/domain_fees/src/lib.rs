//! Fees Domain - Fee Catalog, Rule Resolution, and Installment Planning
//!
//! This crate owns the chargeable side of student billing:
//!
//! - **Fee catalog**: named chargeable concepts ([`FeeItem`]) grouped for
//!   display ([`FeeGroup`]), each priced by scoped [`FeeItemRule`]s.
//! - **Rule resolution**: [`FeeRuleResolver`] picks the single applicable
//!   amount for a student's context using specificity scoring: a
//!   class-scoped rule outranks a term-scoped rule outranks a level-scoped
//!   rule outranks the year-wide default.
//! - **Installment planning**: [`InstallmentPlanner`] splits a total into an
//!   ordered schedule whose amounts always sum back to the total exactly,
//!   regardless of percentage rounding.

pub mod error;
pub mod fee_item;
pub mod plan;
pub mod planner;
pub mod resolver;
pub mod rule;

pub use error::FeesError;
pub use fee_item::{FeeGroup, FeeItem};
pub use plan::{InstallmentPlan, PlanEntry, PlanEntryKind};
pub use planner::{Installment, InstallmentPlanner};
pub use resolver::{FeeRuleResolver, StudentContext};
pub use rule::FeeItemRule;
