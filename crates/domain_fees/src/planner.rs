//! Installment splitting with exact-sum rounding
//!
//! Percentage entries are rounded to currency precision for every entry
//! except the last, which takes the remainder. The schedule therefore sums
//! back to the total exactly, with no leftover cents.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, Rate};

use crate::error::FeesError;
use crate::plan::{InstallmentPlan, PlanEntryKind};

/// A concrete installment produced from a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub label: String,
    pub due_offset_days: i64,
    pub amount: Money,
}

/// Splits invoice totals into installment schedules
#[derive(Debug, Clone)]
pub struct InstallmentPlanner {
    /// Allowed deviation of a percentage plan's sum from 100, in
    /// percentage points
    percentage_tolerance: Decimal,
}

impl Default for InstallmentPlanner {
    fn default() -> Self {
        Self {
            percentage_tolerance: dec!(0.1),
        }
    }
}

impl InstallmentPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the percentage-sum tolerance (percentage points)
    pub fn with_tolerance(mut self, tolerance: Decimal) -> Self {
        self.percentage_tolerance = tolerance;
        self
    }

    /// Splits `total` according to `plan`
    ///
    /// All entries except the last are computed directly (percentages
    /// rounded to currency precision); the last entry's amount is
    /// `total - Σ(preceding)`, so the schedule always sums to `total`
    /// exactly.
    ///
    /// # Errors
    ///
    /// `FeesError::InvalidPlan` when the plan is empty, mixes percentage
    /// and fixed entries, its percentages sum outside `100 ± tolerance`,
    /// or its amounts exceed the total.
    pub fn split(
        &self,
        total: Money,
        plan: &InstallmentPlan,
    ) -> Result<Vec<Installment>, FeesError> {
        if plan.entries.is_empty() {
            return Err(FeesError::invalid_plan(&plan.name, "plan has no entries"));
        }
        if total.is_negative() {
            return Err(FeesError::Validation(format!(
                "cannot split negative total {total}"
            )));
        }

        self.validate_entries(total, plan)?;

        let mut installments = Vec::with_capacity(plan.entries.len());
        let mut allocated = Money::zero(total.currency());
        let last = plan.entries.len() - 1;

        for (i, entry) in plan.entries.iter().enumerate() {
            let amount = if i == last {
                // Remainder keeps the schedule summing to the total exactly
                total.checked_sub(&allocated)?
            } else {
                match &entry.kind {
                    PlanEntryKind::Percentage { percent } => {
                        Rate::from_percentage(*percent).apply(&total)
                    }
                    PlanEntryKind::Fixed { amount } => *amount,
                }
            };

            if amount.is_negative() {
                return Err(FeesError::invalid_plan(
                    &plan.name,
                    format!("installments before '{}' exceed the total", entry.label),
                ));
            }

            allocated = allocated.checked_add(&amount)?;
            installments.push(Installment {
                label: entry.label.clone(),
                due_offset_days: entry.due_offset_days,
                amount,
            });
        }

        Ok(installments)
    }

    fn validate_entries(&self, total: Money, plan: &InstallmentPlan) -> Result<(), FeesError> {
        let mut percent_sum = Decimal::ZERO;
        let mut fixed_sum = Money::zero(total.currency());
        let mut has_percentage = false;
        let mut has_fixed = false;

        for entry in &plan.entries {
            match &entry.kind {
                PlanEntryKind::Percentage { percent } => {
                    if percent.is_sign_negative() {
                        return Err(FeesError::invalid_plan(
                            &plan.name,
                            format!("entry '{}' has a negative percentage", entry.label),
                        ));
                    }
                    has_percentage = true;
                    percent_sum += percent;
                }
                PlanEntryKind::Fixed { amount } => {
                    if amount.is_negative() {
                        return Err(FeesError::invalid_plan(
                            &plan.name,
                            format!("entry '{}' has a negative amount", entry.label),
                        ));
                    }
                    has_fixed = true;
                    fixed_sum = fixed_sum.checked_add(amount)?;
                }
            }
        }

        if has_percentage && has_fixed {
            return Err(FeesError::invalid_plan(
                &plan.name,
                "plan mixes percentage and fixed entries",
            ));
        }

        if has_percentage {
            let deviation = (percent_sum - dec!(100)).abs();
            if deviation > self.percentage_tolerance {
                return Err(FeesError::invalid_plan(
                    &plan.name,
                    format!("percentages sum to {percent_sum}%, expected 100%"),
                ));
            }
        }

        if has_fixed && fixed_sum > total {
            return Err(FeesError::invalid_plan(
                &plan.name,
                format!("fixed amounts sum to {fixed_sum}, exceeding the total {total}"),
            ));
        }

        Ok(())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use core_kernel::Currency;
    use proptest::prelude::*;

    proptest! {
        /// For any total and any valid three-way percentage plan, the
        /// schedule sums back to the total exactly.
        #[test]
        fn split_always_sums_to_total(
            total_minor in 0i64..1_000_000_000i64,
            first in 1u32..99u32,
            second_share in 1u32..99u32,
        ) {
            let second = ((100 - first) * second_share / 100).max(1);
            let third = 100 - first - second;
            prop_assume!(third >= 1);

            let plan = InstallmentPlan::new("Generated")
                .percentage("First", 0, Decimal::from(first))
                .percentage("Second", 30, Decimal::from(second))
                .percentage("Third", 60, Decimal::from(third));

            let total = Money::from_minor(total_minor, Currency::USD);
            let installments = InstallmentPlanner::new().split(total, &plan).unwrap();

            let sum = installments
                .iter()
                .fold(Money::zero(Currency::USD), |acc, i| acc + i.amount);
            prop_assert_eq!(sum, total);
        }
    }
}
