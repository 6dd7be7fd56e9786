//! Unit tests for the Policy domain
//!
//! Tests cover purchase validation, lifecycle transitions, cancellation,
//! renewal, expiry windows, reviews and slug generation.

use chrono::NaiveDate;
use core_kernel::{CategoryId, CompanyId, Money, UserId};
use domain_policy::{
    unique_slug, PaymentFrequency, Policy, PolicyError, PolicyReview, PolicyStatistics,
    PolicyStatus, PolicyType, PurchaseRequest,
};
use proptest::prelude::*;
use rust_decimal_macros::dec;
use serde_json::json;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Helper function to create a published motor product
fn motor_type() -> PolicyType {
    let mut t = PolicyType::new(
        CategoryId::new(),
        CompanyId::new(),
        "Comprehensive Motor",
        "comprehensive-motor",
        Money::kes(dec!(24000)),
    );
    t.min_coverage_amount = Some(Money::kes(dec!(200000)));
    t.max_coverage_amount = Some(Money::kes(dec!(10000000)));
    t.publish();
    t
}

fn purchase(t: &PolicyType) -> Policy {
    Policy::purchase(
        UserId::new(),
        t,
        PurchaseRequest {
            policy_type_id: t.id,
            start_date: date(2024, 3, 1),
            end_date: date(2025, 2, 28),
            coverage_amount: Money::kes(dec!(1500000)),
            premium_amount: None,
            payment_frequency: PaymentFrequency::Monthly,
            policy_data: json!({"vehicle_registration": "KDA 123X"}),
            beneficiaries: json!([]),
        },
    )
    .unwrap()
}

mod purchase_tests {
    use super::*;

    #[test]
    fn test_draft_type_cannot_be_bought() {
        let mut t = motor_type();
        t.status = domain_policy::TypeStatus::Draft;
        let request = PurchaseRequest {
            policy_type_id: t.id,
            start_date: date(2024, 3, 1),
            end_date: date(2025, 2, 28),
            coverage_amount: Money::kes(dec!(1500000)),
            premium_amount: None,
            payment_frequency: PaymentFrequency::Annual,
            policy_data: json!({}),
            beneficiaries: json!([]),
        };
        let result = Policy::purchase(UserId::new(), &t, request);
        assert!(matches!(result, Err(PolicyError::NotPurchasable(_))));
    }

    #[test]
    fn test_coverage_outside_bounds_rejected() {
        let t = motor_type();
        let request = PurchaseRequest {
            policy_type_id: t.id,
            start_date: date(2024, 3, 1),
            end_date: date(2025, 2, 28),
            coverage_amount: Money::kes(dec!(50000)),
            premium_amount: None,
            payment_frequency: PaymentFrequency::Annual,
            policy_data: json!({}),
            beneficiaries: json!([]),
        };
        assert!(matches!(
            Policy::purchase(UserId::new(), &t, request),
            Err(PolicyError::Validation(_))
        ));
    }

    #[test]
    fn test_explicit_premium_overrides_base() {
        let t = motor_type();
        let request = PurchaseRequest {
            policy_type_id: t.id,
            start_date: date(2024, 3, 1),
            end_date: date(2025, 2, 28),
            coverage_amount: Money::kes(dec!(1500000)),
            premium_amount: Some(Money::kes(dec!(30000.555))),
            payment_frequency: PaymentFrequency::Annual,
            policy_data: json!({}),
            beneficiaries: json!([]),
        };
        let p = Policy::purchase(UserId::new(), &t, request).unwrap();
        assert_eq!(p.premium_amount, Money::kes(dec!(30000.56)));
    }
}

mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_activate_only_from_pending() {
        let mut p = purchase(&motor_type());
        p.activate().unwrap();
        assert_eq!(p.status, PolicyStatus::Active);
        assert!(p.activated_at.is_some());
        assert!(p.activate().is_err());
    }

    #[test]
    fn test_cancel_twice_fails() {
        let mut p = purchase(&motor_type());
        p.cancel("Sold the car").unwrap();
        assert_eq!(p.cancellation_reason.as_deref(), Some("Sold the car"));
        assert!(matches!(p.cancel("again"), Err(PolicyError::AlreadyCancelled)));
    }

    #[test]
    fn test_cannot_cancel_expired() {
        let mut p = purchase(&motor_type());
        p.activate().unwrap();
        p.transition_to(PolicyStatus::Expired).unwrap();
        assert!(matches!(p.cancel(""), Err(PolicyError::AlreadyExpired)));
    }

    #[test]
    fn test_suspended_policy_can_resume() {
        let mut p = purchase(&motor_type());
        p.activate().unwrap();
        p.transition_to(PolicyStatus::Suspended).unwrap();
        p.transition_to(PolicyStatus::Active).unwrap();
        assert_eq!(p.status, PolicyStatus::Active);
    }

    #[test]
    fn test_pending_policy_cannot_renew() {
        let p = purchase(&motor_type());
        assert!(matches!(p.renew(), Err(PolicyError::NotRenewable(_))));
    }

    #[test]
    fn test_expiring_window() {
        let mut p = purchase(&motor_type());
        p.activate().unwrap();
        assert!(p.is_expiring_within(date(2025, 2, 1), 30));
        assert!(!p.is_expiring_within(date(2024, 12, 1), 30));
        assert!(!p.is_expiring_within(date(2025, 3, 1), 30));
    }
}

mod review_tests {
    use super::*;

    #[test]
    fn test_only_holder_can_review() {
        let p = purchase(&motor_type());
        assert!(PolicyReview::write(&p, UserId::new(), 5, "Great", "", true).is_err());
        let review = PolicyReview::write(&p, p.user_id, 4, "Quick payout", "Smooth", true).unwrap();
        assert!(review.is_verified_purchase);
        assert!(!review.is_published);
    }

    #[test]
    fn test_rating_bounds() {
        let p = purchase(&motor_type());
        assert!(PolicyReview::write(&p, p.user_id, 0, "Bad", "", false).is_err());
        assert!(PolicyReview::write(&p, p.user_id, 6, "Too good", "", false).is_err());
    }
}

mod statistics_tests {
    use super::*;

    #[test]
    fn test_tally_counts_and_sums() {
        let t = motor_type();
        let mut a = purchase(&t);
        a.activate().unwrap();
        let b = purchase(&t);
        let stats = PolicyStatistics::tally([&a, &b]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.total_premium, dec!(48000));
    }
}

proptest! {
    #[test]
    fn prop_unique_slug_never_collides(n in 0usize..20) {
        let taken: Vec<String> = std::iter::once("home-cover".to_string())
            .chain((1..=n).map(|i| format!("home-cover-{}", i)))
            .collect();
        let slug = unique_slug("Home Cover", |s| taken.iter().any(|t| t == s));
        prop_assert!(!taken.contains(&slug));
        prop_assert!(slug.starts_with("home-cover"));
    }

    #[test]
    fn prop_policy_status_parse_round_trip(i in 0usize..5) {
        let status = PolicyStatus::ALL[i];
        prop_assert_eq!(status.as_str().parse::<PolicyStatus>().unwrap(), status);
    }
}
