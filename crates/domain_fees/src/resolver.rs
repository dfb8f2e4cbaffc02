//! Fee rule resolution
//!
//! Given a fee item and a student's context, the resolver picks the single
//! applicable charge amount from the loaded rule set.

use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::{AcademicYear, ClassId, Money, StudentId, TermId};

use crate::error::FeesError;
use crate::fee_item::FeeItem;
use crate::rule::FeeItemRule;

/// The student attributes a rule scope is matched against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentContext {
    pub student_id: StudentId,
    pub class_id: ClassId,
    pub term_id: TermId,
    /// Level code from the student directory, if known
    pub level: Option<String>,
    pub academic_year: AcademicYear,
}

/// Resolves the applicable charge amount for a fee item
///
/// The resolver owns a loaded rule set (typically one academic year's worth)
/// and answers lookups without further I/O. Resolution is deterministic:
/// identical rule sets and context always produce the same amount.
#[derive(Debug, Clone, Default)]
pub struct FeeRuleResolver {
    rules: Vec<FeeItemRule>,
}

impl FeeRuleResolver {
    /// Creates a resolver over a loaded rule set
    pub fn new(rules: Vec<FeeItemRule>) -> Self {
        Self { rules }
    }

    /// Adds a rule to the set
    pub fn add_rule(&mut self, rule: FeeItemRule) {
        self.rules.push(rule);
    }

    /// Returns the loaded rules
    pub fn rules(&self) -> &[FeeItemRule] {
        &self.rules
    }

    /// Resolves the charge amount for a fee item in the given context
    ///
    /// Candidate rules are those for the item and academic year whose scope
    /// fields are each wildcarded or equal to the student's attribute. The
    /// highest specificity score wins (+4 class, +2 term, +1 level); among
    /// equally specific candidates the most recently created rule wins.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(amount))` when a rule matches
    /// - `Ok(None)` when nothing matches an explicitly optional item
    ///
    /// # Errors
    ///
    /// `FeesError::RuleNotFound` when nothing matches a mandatory item
    pub fn resolve(
        &self,
        item: &FeeItem,
        ctx: &StudentContext,
    ) -> Result<Option<Money>, FeesError> {
        let best = self
            .rules
            .iter()
            .filter(|rule| rule.fee_item_id == item.id)
            .filter_map(|rule| rule.specificity(ctx).map(|score| (score, rule)))
            .max_by_key(|(score, rule)| (*score, rule.created_at, rule.id));

        match best {
            Some((score, rule)) => {
                debug!(
                    fee_item = %item.code,
                    rule_id = %rule.id,
                    score,
                    amount = %rule.amount,
                    "resolved fee rule"
                );
                Ok(Some(rule.amount))
            }
            None if item.mandatory => Err(FeesError::RuleNotFound {
                fee_item: item.code.clone(),
                academic_year: ctx.academic_year,
            }),
            None => {
                debug!(fee_item = %item.code, "no rule for optional item, omitting");
                Ok(None)
            }
        }
    }
}
