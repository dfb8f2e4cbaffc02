//! Comprehensive unit tests for the Money module
//!
//! Tests cover money creation, arithmetic operations, rate application,
//! currency handling, and edge cases.

use core_kernel::{Currency, Money, MoneyError, Rate};
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_creates_money_with_correct_amount() {
        let m = Money::new(dec!(100.50), Currency::USD);
        assert_eq!(m.amount(), dec!(100.50));
        assert_eq!(m.currency(), Currency::USD);
    }

    #[test]
    fn test_new_rounds_to_two_decimal_places() {
        let m = Money::new(dec!(100.123456789), Currency::USD);
        assert_eq!(m.amount(), dec!(100.12));
    }

    #[test]
    fn test_new_uses_bankers_rounding_at_midpoint() {
        assert_eq!(Money::new(dec!(0.125), Currency::USD).amount(), dec!(0.12));
        assert_eq!(Money::new(dec!(0.135), Currency::USD).amount(), dec!(0.14));
    }

    #[test]
    fn test_from_minor_converts_cents_correctly() {
        let m = Money::from_minor(10050, Currency::NGN);
        assert_eq!(m.amount(), dec!(100.50));
    }

    #[test]
    fn test_zero_creates_zero_amount() {
        let m = Money::zero(Currency::EUR);
        assert!(m.is_zero());
        assert_eq!(m.currency(), Currency::EUR);
    }

    #[test]
    fn test_negative_amount_creation() {
        let m = Money::new(dec!(-100.00), Currency::USD);
        assert!(m.is_negative());
        assert_eq!(m.amount(), dec!(-100.00));
    }
}

mod predicates {
    use super::*;

    #[test]
    fn test_is_zero_true_for_zero_amount() {
        assert!(Money::zero(Currency::USD).is_zero());
    }

    #[test]
    fn test_is_positive_excludes_zero() {
        assert!(!Money::zero(Currency::USD).is_positive());
        assert!(Money::new(dec!(0.01), Currency::USD).is_positive());
    }

    #[test]
    fn test_is_negative_excludes_zero() {
        assert!(!Money::zero(Currency::USD).is_negative());
        assert!(Money::new(dec!(-0.01), Currency::USD).is_negative());
    }

    #[test]
    fn test_abs_strips_sign() {
        let m = Money::new(dec!(-42.50), Currency::USD);
        assert_eq!(m.abs().amount(), dec!(42.50));
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_addition_and_subtraction() {
        let a = Money::new(dec!(300.00), Currency::USD);
        let b = Money::new(dec!(100.00), Currency::USD);

        assert_eq!((a + b).amount(), dec!(400.00));
        assert_eq!((a - b).amount(), dec!(200.00));
    }

    #[test]
    fn test_subtraction_can_go_negative() {
        let a = Money::new(dec!(100.00), Currency::USD);
        let b = Money::new(dec!(150.00), Currency::USD);
        assert_eq!((a - b).amount(), dec!(-50.00));
    }

    #[test]
    fn test_checked_add_rejects_currency_mismatch() {
        let usd = Money::new(dec!(1.00), Currency::USD);
        let kes = Money::new(dec!(1.00), Currency::KES);
        assert!(matches!(
            usd.checked_add(&kes),
            Err(MoneyError::CurrencyMismatch(_, _))
        ));
    }

    #[test]
    fn test_checked_sub_rejects_currency_mismatch() {
        let usd = Money::new(dec!(1.00), Currency::USD);
        let gbp = Money::new(dec!(1.00), Currency::GBP);
        assert!(matches!(
            usd.checked_sub(&gbp),
            Err(MoneyError::CurrencyMismatch(_, _))
        ));
    }

    #[test]
    fn test_multiply_by_quantity_rounds() {
        let unit = Money::new(dec!(33.335), Currency::USD);
        let total = unit.multiply(dec!(3));
        assert_eq!(total.amount(), dec!(100.02));
    }

    #[test]
    fn test_negation() {
        let m = Money::new(dec!(10.00), Currency::USD);
        assert_eq!((-m).amount(), dec!(-10.00));
    }
}

mod ordering {
    use super::*;

    #[test]
    fn test_same_currency_comparison() {
        let small = Money::new(dec!(1.00), Currency::USD);
        let large = Money::new(dec!(2.00), Currency::USD);
        assert!(small < large);
        assert!(large > small);
        assert!(small <= Money::new(dec!(1.00), Currency::USD));
    }

    #[test]
    fn test_cross_currency_comparison_returns_none() {
        let usd = Money::new(dec!(1.00), Currency::USD);
        let zar = Money::new(dec!(1.00), Currency::ZAR);
        assert_eq!(usd.partial_cmp(&zar), None);
    }
}

mod rates {
    use super::*;

    #[test]
    fn test_rate_from_percentage() {
        let rate = Rate::from_percentage(dec!(30));
        assert_eq!(rate.as_decimal(), dec!(0.30));
        assert_eq!(rate.as_percentage(), dec!(30.00));
    }

    #[test]
    fn test_rate_apply_rounds_to_currency() {
        let rate = Rate::from_percentage(dec!(33.33));
        let total = Money::new(dec!(1000.00), Currency::USD);
        assert_eq!(rate.apply(&total).amount(), dec!(333.30));
    }
}

mod display {
    use super::*;

    #[test]
    fn test_money_display_uses_symbol() {
        let m = Money::new(dec!(1234.50), Currency::USD);
        assert_eq!(m.to_string(), "$ 1234.50");
    }

    #[test]
    fn test_currency_display_uses_code() {
        assert_eq!(Currency::KES.to_string(), "KES");
    }
}
