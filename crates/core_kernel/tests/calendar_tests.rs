//! Tests for the business calendar and reference numbers

use chrono::NaiveDate;
use core_kernel::calendar::{self, DateRange};
use core_kernel::reference::{self, ReferenceKind};
use proptest::prelude::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_policy_period_contains_both_ends() {
    let period = DateRange::new(date(2024, 1, 1), date(2024, 12, 31)).unwrap();
    assert!(period.contains(date(2024, 1, 1)));
    assert!(period.contains(date(2024, 12, 31)));
    assert!(!period.contains(date(2025, 1, 1)));
}

#[test]
fn test_days_remaining() {
    let period = DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
    assert_eq!(period.days_remaining(date(2024, 1, 21)), 10);
    assert_eq!(period.days_remaining(date(2024, 2, 2)), -2);
}

#[test]
fn test_claim_reference_shape() {
    let n = reference::generate(ReferenceKind::Claim, 2024);
    assert!(reference::is_valid(ReferenceKind::Claim, &n));
}

proptest! {
    #[test]
    fn add_months_never_moves_backwards(day in 1u32..28, month in 1u32..12, add in 0u32..36) {
        let start = date(2024, month, day);
        let shifted = calendar::add_months(start, add).unwrap();
        prop_assert!(shifted >= start);
    }

    #[test]
    fn trailing_months_are_month_starts(n in 1u32..24) {
        let months = calendar::trailing_months(date(2024, 7, 19), n);
        prop_assert_eq!(months.len() as u32, n);
        prop_assert!(months.iter().all(|m| m.format("%d").to_string() == "01"));
    }
}
