//! Tests for growth figures, monthly series and recommendations

use chrono::NaiveDate;
use domain_analytics::{
    calculate_growth, fill_months, percentage, recommend, ActivityAction, HeldPolicy, Priority,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn held(end: NaiveDate, category: &str) -> HeldPolicy {
    HeldPolicy { end_date: end, category_slug: category.into() }
}

mod monthly_tests {
    use super::*;

    #[test]
    fn test_twelve_months_zero_filled() {
        let today = date(2024, 3, 10);
        let totals = vec![
            (date(2024, 3, 1), dec!(1000)),
            (date(2024, 3, 28), dec!(500)),
            (date(2023, 6, 15), dec!(250)),
            (date(2022, 12, 31), dec!(9999)),
        ];
        let series = fill_months(today, 12, totals);
        assert_eq!(series.len(), 12);
        assert_eq!(series.first().unwrap().month, "2023-04");
        assert_eq!(series.last().unwrap().month, "2024-03");
        assert_eq!(series.last().unwrap().value, dec!(1500));
        let june = series.iter().find(|p| p.month == "2023-06").unwrap();
        assert_eq!(june.value, dec!(250));
        let total: Decimal = series.iter().map(|p| p.value).sum();
        assert_eq!(total, dec!(1750));
    }

    #[test]
    fn test_series_crosses_year_boundary() {
        let series = fill_months(date(2025, 1, 31), 3, std::iter::empty());
        let months: Vec<_> = series.iter().map(|p| p.month.as_str()).collect();
        assert_eq!(months, vec!["2024-11", "2024-12", "2025-01"]);
    }
}

mod recommendation_tests {
    use super::*;

    #[test]
    fn test_new_customer_gets_health_suggestion_only() {
        let recs = recommend(&[], 0, date(2024, 6, 1));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].id, "get-health");
    }

    #[test]
    fn test_expiring_and_overdue_come_first() {
        let today = date(2024, 6, 1);
        let active = vec![held(date(2024, 6, 20), "motor"), held(date(2025, 1, 1), "health")];
        let recs = recommend(&active, 2, today);
        let ids: Vec<_> = recs.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["renew-policy", "overdue-payments"]);
        assert!(recs[0].description.contains("1 policy expiring"));
        assert!(recs[1].description.contains("2 overdue payments"));
        assert!(recs.iter().all(|r| r.priority == Priority::High));
    }

    #[test]
    fn test_expiry_horizon_is_thirty_days() {
        let today = date(2024, 6, 1);
        let just_inside = vec![held(date(2024, 7, 1), "health"), held(date(2024, 7, 1), "motor")];
        assert!(recommend(&just_inside, 0, today).iter().any(|r| r.id == "renew-policy"));
        let outside = vec![held(date(2024, 7, 2), "health"), held(date(2024, 7, 2), "motor")];
        assert!(recommend(&outside, 0, today).is_empty());
    }

    #[test]
    fn test_single_category_portfolio_suggests_diversifying() {
        let active = vec![held(date(2025, 1, 1), "health"), held(date(2025, 3, 1), "health")];
        let recs = recommend(&active, 0, date(2024, 6, 1));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].id, "diversify");
        assert_eq!(recs[0].priority, Priority::Low);
    }
}

mod activity_tests {
    use super::*;

    #[test]
    fn test_actions_round_trip() {
        for action in ActivityAction::ALL {
            assert_eq!(action.as_str().parse::<ActivityAction>().unwrap(), action);
        }
        assert_eq!(serde_json::to_value(ActivityAction::MakePayment).unwrap(), "make_payment");
    }
}

proptest! {
    #[test]
    fn prop_growth_sign_follows_direction(cur in 0i64..1_000_000, prev in 1i64..1_000_000) {
        let g = calculate_growth(Decimal::from(cur), Decimal::from(prev));
        if g > Decimal::ZERO { prop_assert!(cur > prev); }
        if g < Decimal::ZERO { prop_assert!(cur < prev); }
        if cur == prev { prop_assert!(g.is_zero()); }
        prop_assert!(g >= dec!(-100));
    }

    #[test]
    fn prop_percentage_of_whole_bounded(part in 0i64..1000, extra in 0i64..1000) {
        let p = percentage(Decimal::from(part), Decimal::from(part + extra));
        prop_assert!(p >= Decimal::ZERO && p <= dec!(100));
    }
}
