//! Unit tests for the Money module
//!
//! Covers creation, minor-unit conversion, checked addition, allocation
//! and currency parsing.

use core_kernel::{Money, Currency, MoneyError};
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_rounds_to_four_decimal_places() {
        let m = Money::new(dec!(100.123456789), Currency::KES);
        assert_eq!(m.amount(), dec!(100.1235));
    }

    #[test]
    fn test_from_minor_converts_cents_correctly() {
        let m = Money::from_minor(10050, Currency::KES);
        assert_eq!(m.amount(), dec!(100.50));
    }

    #[test]
    fn test_from_minor_keeps_currency() {
        let m = Money::from_minor(2599, Currency::USD);
        assert_eq!(m.amount(), dec!(25.99));
        assert_eq!(m.currency(), Currency::USD);
    }

    #[test]
    fn test_zero_creates_zero_amount() {
        let m = Money::zero(Currency::KES);
        assert!(m.is_zero());
        assert!(!m.is_positive());
        assert!(!m.is_negative());
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_add_same_currency() {
        let a = Money::kes(dec!(100.00));
        let b = Money::kes(dec!(50.25));
        assert_eq!(a.checked_add(&b).unwrap().amount(), dec!(150.25));
    }

    #[test]
    fn test_negative_amount_is_detected() {
        let m = Money::kes(dec!(-25));
        assert!(m.is_negative());
        assert!(!m.is_positive());
    }

    #[test]
    fn test_sum_rejects_mixed_currencies() {
        let items = [Money::kes(dec!(1)), Money::new(dec!(1), Currency::USD)];
        assert!(matches!(
            Money::sum(&items, Currency::KES),
            Err(MoneyError::CurrencyMismatch(_, _))
        ));
    }

    #[test]
    fn test_sum_of_empty_is_zero() {
        let items: Vec<Money> = vec![];
        assert!(Money::sum(&items, Currency::KES).unwrap().is_zero());
    }
}

mod allocation {
    use super::*;

    #[test]
    fn test_allocate_monthly_premium() {
        let premium = Money::kes(dec!(10000));
        let parts = premium.allocate(12).unwrap();

        assert_eq!(parts.len(), 12);
        assert_eq!(parts[0].amount(), dec!(833.34));
        assert_eq!(parts[11].amount(), dec!(833.33));
        assert_eq!(Money::sum(&parts, Currency::KES).unwrap(), premium);
    }

    #[test]
    fn test_allocate_zero_parts_fails() {
        assert!(Money::kes(dec!(1)).allocate(0).is_err());
    }
}

mod currency {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("kes".parse::<Currency>().unwrap(), Currency::KES);
        assert_eq!(" usd ".parse::<Currency>().unwrap(), Currency::USD);
    }

    #[test]
    fn test_parse_unknown_currency() {
        assert!(matches!(
            "NGN".parse::<Currency>(),
            Err(MoneyError::UnsupportedCurrency(_))
        ));
    }

    #[test]
    fn test_serializes_as_uppercase_code() {
        let json = serde_json::to_string(&Currency::KES).unwrap();
        assert_eq!(json, "\"KES\"");
    }
}
