//! Integration tests for fee resolution and installment planning

use rust_decimal_macros::dec;

use core_kernel::{AcademicYear, Currency, Money};
use domain_fees::{FeeItem, FeeItemRule, FeeRuleResolver, InstallmentPlan, InstallmentPlanner};
use test_utils::builders::StudentContextBuilder;
use test_utils::fixtures::MoneyFixtures;

mod resolution {
    use super::*;

    /// A default rule (200) and a class-specific rule (250) exist for the
    /// same item and year; a student in that class is charged 250.
    #[test]
    fn test_class_specific_rule_beats_default() {
        let ctx = StudentContextBuilder::new().build();
        let tuition = FeeItem::new("TUITION", "Tuition");

        let resolver = FeeRuleResolver::new(vec![
            FeeItemRule::new(tuition.id, ctx.academic_year, MoneyFixtures::usd(dec!(200))),
            FeeItemRule::new(tuition.id, ctx.academic_year, MoneyFixtures::usd(dec!(250)))
                .for_class(ctx.class_id),
        ]);

        let amount = resolver.resolve(&tuition, &ctx).unwrap();
        assert_eq!(amount, Some(MoneyFixtures::usd(dec!(250))));
    }

    #[test]
    fn test_rules_for_other_years_are_invisible() {
        let ctx = StudentContextBuilder::new()
            .with_academic_year(AcademicYear::new(2025))
            .build();
        let tuition = FeeItem::new("TUITION", "Tuition");

        let resolver = FeeRuleResolver::new(vec![FeeItemRule::new(
            tuition.id,
            AcademicYear::new(2024),
            MoneyFixtures::usd(dec!(500)),
        )]);

        assert!(resolver.resolve(&tuition, &ctx).is_err());
    }

    #[test]
    fn test_scoped_rule_for_other_class_falls_back_to_default() {
        let ctx = StudentContextBuilder::new().build();
        let other = StudentContextBuilder::new()
            .with_academic_year(ctx.academic_year)
            .build();
        let tuition = FeeItem::new("TUITION", "Tuition");

        let resolver = FeeRuleResolver::new(vec![
            FeeItemRule::new(tuition.id, ctx.academic_year, MoneyFixtures::usd(dec!(200))),
            FeeItemRule::new(tuition.id, ctx.academic_year, MoneyFixtures::usd(dec!(250)))
                .for_class(other.class_id),
        ]);

        let amount = resolver.resolve(&tuition, &ctx).unwrap();
        assert_eq!(amount, Some(MoneyFixtures::usd(dec!(200))));
    }
}

mod planning {
    use super::*;

    /// Items summing to 1000.00 with plan [40%, 30%, 30%] produce
    /// installments [400.00, 300.00, 300.00].
    #[test]
    fn test_forty_thirty_thirty_over_one_thousand() {
        let plan = InstallmentPlan::new("Termly 40/30/30")
            .percentage("First term", 0, dec!(40))
            .percentage("Second term", 90, dec!(30))
            .percentage("Third term", 180, dec!(30));

        let installments = InstallmentPlanner::new()
            .split(Money::new(dec!(1000.00), Currency::USD), &plan)
            .unwrap();

        let amounts: Vec<_> = installments.iter().map(|i| i.amount.amount()).collect();
        assert_eq!(amounts, vec![dec!(400.00), dec!(300.00), dec!(300.00)]);
    }

    #[test]
    fn test_awkward_total_still_sums_exactly() {
        let plan = InstallmentPlan::new("Thirds")
            .percentage("First", 0, dec!(33.33))
            .percentage("Second", 60, dec!(33.33))
            .percentage("Third", 120, dec!(33.34));

        let total = Money::new(dec!(997.97), Currency::USD);
        let installments = InstallmentPlanner::new().split(total, &plan).unwrap();

        let sum = installments
            .iter()
            .fold(Money::zero(Currency::USD), |acc, i| acc + i.amount);
        assert_eq!(sum, total);
    }

    #[test]
    fn test_due_offsets_carry_through() {
        let plan = InstallmentPlan::new("Termly")
            .percentage("First", 0, dec!(50))
            .percentage("Second", 90, dec!(50));

        let installments = InstallmentPlanner::new()
            .split(MoneyFixtures::usd(dec!(800)), &plan)
            .unwrap();

        assert_eq!(installments[0].due_offset_days, 0);
        assert_eq!(installments[1].due_offset_days, 90);
    }
}
