//! Scoped charge rules
//!
//! A rule binds an amount to a fee item for an academic year, optionally
//! narrowed to a class, term, or student level. A `None` scope field is a
//! wildcard. Several rules may exist for the same item and year at different
//! specificity levels; resolution picks the most specific one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{AcademicYear, ClassId, FeeItemId, FeeRuleId, Money, TermId};

use crate::resolver::StudentContext;

/// Specificity weight of an exact class match
const CLASS_WEIGHT: u8 = 4;
/// Specificity weight of an exact term match
const TERM_WEIGHT: u8 = 2;
/// Specificity weight of an exact level match
const LEVEL_WEIGHT: u8 = 1;

/// An amount bound to a fee item with an optional scope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeItemRule {
    /// Unique identifier (time-ordered)
    pub id: FeeRuleId,
    /// Fee item this rule prices
    pub fee_item_id: FeeItemId,
    /// Academic year the rule applies to
    pub academic_year: AcademicYear,
    /// Class scope; `None` matches any class
    pub class_id: Option<ClassId>,
    /// Term scope; `None` matches any term
    pub term_id: Option<TermId>,
    /// Level scope (e.g., "primary"); `None` matches any level
    pub level: Option<String>,
    /// The charge amount
    pub amount: Money,
    /// Creation timestamp, used as the tie-break between equally
    /// specific rules
    pub created_at: DateTime<Utc>,
}

impl FeeItemRule {
    /// Creates a year-wide default rule (all scope fields wildcarded)
    pub fn new(fee_item_id: FeeItemId, academic_year: AcademicYear, amount: Money) -> Self {
        Self {
            id: FeeRuleId::new_v7(),
            fee_item_id,
            academic_year,
            class_id: None,
            term_id: None,
            level: None,
            amount,
            created_at: Utc::now(),
        }
    }

    /// Narrows the rule to a class
    pub fn for_class(mut self, class_id: ClassId) -> Self {
        self.class_id = Some(class_id);
        self
    }

    /// Narrows the rule to a term
    pub fn for_term(mut self, term_id: TermId) -> Self {
        self.term_id = Some(term_id);
        self
    }

    /// Narrows the rule to a level
    pub fn for_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Returns the specificity score of this rule for the given context,
    /// or `None` when the rule does not apply.
    ///
    /// Each non-wildcard scope field must equal the student's attribute;
    /// matches score +4 (class), +2 (term), +1 (level).
    pub fn specificity(&self, ctx: &StudentContext) -> Option<u8> {
        if self.academic_year != ctx.academic_year {
            return None;
        }

        let mut score = 0;

        match self.class_id {
            Some(class_id) if class_id == ctx.class_id => score += CLASS_WEIGHT,
            Some(_) => return None,
            None => {}
        }

        match self.term_id {
            Some(term_id) if term_id == ctx.term_id => score += TERM_WEIGHT,
            Some(_) => return None,
            None => {}
        }

        match &self.level {
            Some(level) if ctx.level.as_deref() == Some(level.as_str()) => score += LEVEL_WEIGHT,
            Some(_) => return None,
            None => {}
        }

        Some(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Currency, StudentId};
    use rust_decimal_macros::dec;

    fn context() -> StudentContext {
        StudentContext {
            student_id: StudentId::new(),
            class_id: ClassId::new(),
            term_id: TermId::new(),
            level: Some("primary".to_string()),
            academic_year: AcademicYear::new(2025),
        }
    }

    fn amount() -> Money {
        Money::new(dec!(200), Currency::USD)
    }

    #[test]
    fn test_wildcard_rule_scores_zero() {
        let ctx = context();
        let rule = FeeItemRule::new(FeeItemId::new(), ctx.academic_year, amount());
        assert_eq!(rule.specificity(&ctx), Some(0));
    }

    #[test]
    fn test_fully_scoped_rule_scores_seven() {
        let ctx = context();
        let rule = FeeItemRule::new(FeeItemId::new(), ctx.academic_year, amount())
            .for_class(ctx.class_id)
            .for_term(ctx.term_id)
            .for_level("primary");
        assert_eq!(rule.specificity(&ctx), Some(7));
    }

    #[test]
    fn test_wrong_class_does_not_apply() {
        let ctx = context();
        let rule = FeeItemRule::new(FeeItemId::new(), ctx.academic_year, amount())
            .for_class(ClassId::new());
        assert_eq!(rule.specificity(&ctx), None);
    }

    #[test]
    fn test_wrong_year_does_not_apply() {
        let ctx = context();
        let rule = FeeItemRule::new(FeeItemId::new(), AcademicYear::new(2024), amount());
        assert_eq!(rule.specificity(&ctx), None);
    }

    #[test]
    fn test_level_rule_requires_known_level() {
        let mut ctx = context();
        ctx.level = None;
        let rule =
            FeeItemRule::new(FeeItemId::new(), ctx.academic_year, amount()).for_level("primary");
        assert_eq!(rule.specificity(&ctx), None);
    }
}
