//! Installment plan definitions
//!
//! A plan is a named ordered sequence of entries, each taking either a
//! percentage of the invoice total or a fixed amount, with a due-date
//! offset. At most one plan is marked default for a school.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{InstallmentPlanId, Money};

/// How a plan entry derives its amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanEntryKind {
    /// A percentage of the invoice total (e.g., 40 for 40%)
    Percentage { percent: Decimal },
    /// A fixed amount
    Fixed { amount: Money },
}

/// One installment slot in a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Display label (e.g., "First installment")
    pub label: String,
    /// Days after the invoice date this installment falls due
    pub due_offset_days: i64,
    /// Amount derivation
    pub kind: PlanEntryKind,
}

/// A named ordered sequence of installments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallmentPlan {
    /// Unique identifier
    pub id: InstallmentPlanId,
    /// Plan name (e.g., "Termly 40/30/30")
    pub name: String,
    /// Whether this is the school's default plan
    pub is_default: bool,
    /// Ordered entries
    pub entries: Vec<PlanEntry>,
}

impl InstallmentPlan {
    /// Creates an empty plan
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: InstallmentPlanId::new_v7(),
            name: name.into(),
            is_default: false,
            entries: Vec::new(),
        }
    }

    /// Appends a percentage entry
    pub fn percentage(
        mut self,
        label: impl Into<String>,
        due_offset_days: i64,
        percent: Decimal,
    ) -> Self {
        self.entries.push(PlanEntry {
            label: label.into(),
            due_offset_days,
            kind: PlanEntryKind::Percentage { percent },
        });
        self
    }

    /// Appends a fixed-amount entry
    pub fn fixed(mut self, label: impl Into<String>, due_offset_days: i64, amount: Money) -> Self {
        self.entries.push(PlanEntry {
            label: label.into(),
            due_offset_days,
            kind: PlanEntryKind::Fixed { amount },
        });
        self
    }

    /// Marks the plan as the default
    pub fn default_plan(mut self) -> Self {
        self.is_default = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn test_plan_builder_preserves_entry_order() {
        let plan = InstallmentPlan::new("Termly")
            .percentage("First", 0, dec!(40))
            .percentage("Second", 30, dec!(30))
            .percentage("Third", 60, dec!(30));

        assert_eq!(plan.entries.len(), 3);
        assert_eq!(plan.entries[0].label, "First");
        assert_eq!(plan.entries[2].due_offset_days, 60);
        assert!(!plan.is_default);
    }

    #[test]
    fn test_default_plan_flag() {
        let plan = InstallmentPlan::new("Annual").default_plan();
        assert!(plan.is_default);
    }

    #[test]
    fn test_fixed_entry() {
        let plan = InstallmentPlan::new("Deposit first").fixed(
            "Deposit",
            0,
            Money::new(dec!(150), Currency::USD),
        );
        assert!(matches!(
            plan.entries[0].kind,
            PlanEntryKind::Fixed { .. }
        ));
    }
}
