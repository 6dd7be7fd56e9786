//! Repository tests against a real PostgreSQL
//!
//! Each test starts its own container; run with `cargo test -- --ignored`.

use chrono::Utc;
use rust_decimal_macros::dec;

use core_kernel::Money;
use domain_analytics::{ActivityAction, UserActivity};
use domain_billing::{
    generate_schedule, Completion, Refund, RefundReason, RefundStatus, ScheduleStatus, TransactionStatus,
};
use domain_claims::{ClaimStatus, ClaimStatistics};
use domain_notifications::{Notification, NotificationKind};
use domain_policy::{workflow, PaymentFrequency, Policy, PolicyType, StageName, StageStatus};
use domain_users::{Role, User};
use infra_db::{
    CatalogRepository, ClaimFilter, ClaimsRepository, DatabaseError, Page, PaymentRepository,
    PolicyRepository, ScheduleView, TypeFilter, UserFilter, UserRepository, WorkflowRepository,
};
use sqlx::PgPool;
use test_utils::{
    assert_history_consistent, assert_kes, assert_schedule_covers_premium, assert_stage, CatalogFixtures,
    ClaimBuilder, PolicyBuilder, TestDatabase, TransactionBuilder, UserBuilder,
};

/// A customer and a published type, both stored
async fn seed(pool: &PgPool) -> (User, PolicyType) {
    let users = UserRepository::new(pool.clone());
    let catalog = CatalogRepository::new(pool.clone());

    let company = CatalogFixtures::company();
    let category = CatalogFixtures::motor_category();
    let policy_type = CatalogFixtures::published_type(&category, &company);
    catalog.save_company(&company).await.unwrap();
    catalog.save_category(&category).await.unwrap();
    catalog.save_type(&policy_type).await.unwrap();

    let customer = UserBuilder::new().build();
    users.create(&customer).await.unwrap();
    (customer, policy_type)
}

/// Stores `policy` with its schedule and stages the way a purchase does
async fn purchase(pool: &PgPool, policy: &Policy) {
    let schedule = generate_schedule(
        policy.id,
        policy.premium_amount,
        policy.payment_frequency.installments(),
        policy.payment_frequency.interval_months(),
        policy.start_date,
    )
    .unwrap();
    PolicyRepository::new(pool.clone())
        .create_purchase(policy, &schedule, &workflow::initial_stages(policy.id), None)
        .await
        .unwrap();
}

fn note(user: &User, kind: NotificationKind) -> Notification {
    Notification::new(user.id, kind, "title", "message", "/dashboard")
}

mod user_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_email_lookup_is_case_insensitive() {
        let db = TestDatabase::new().await.unwrap();
        let users = UserRepository::new(db.pool.clone());
        let user = UserBuilder::new().email("Achieng@Example.co.ke").build();
        users.create(&user).await.unwrap();

        let found = users.find_by_email("ACHIENG@example.co.ke").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        let prefs = users.preferences(user.id).await.unwrap();
        assert_eq!(prefs.preferred_language, "en");
        assert!(prefs.in_app_enabled);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_duplicate_email_is_reported() {
        let db = TestDatabase::new().await.unwrap();
        let users = UserRepository::new(db.pool.clone());
        users.create(&UserBuilder::new().email("otieno@example.com").build()).await.unwrap();

        let err = users
            .create(&UserBuilder::new().email("otieno@example.com").build())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateEntry(_)));
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_user_search_filters_by_role() {
        let db = TestDatabase::new().await.unwrap();
        let users = UserRepository::new(db.pool.clone());
        users.create(&UserBuilder::new().build()).await.unwrap();
        users.create(&UserBuilder::new().role(Role::Assessor).build()).await.unwrap();

        let filter = UserFilter { role: Some(Role::Assessor), ..Default::default() };
        let found = users.list(&filter, Page::default()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].role, Role::Assessor);
    }
}

mod catalog_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_public_listing_hides_drafts() {
        let db = TestDatabase::new().await.unwrap();
        let (_, published) = seed(&db.pool).await;
        let catalog = CatalogRepository::new(db.pool.clone());

        let mut draft = PolicyType::new(
            published.category_id,
            published.insurance_company_id,
            "Third Party Motor",
            "third-party-motor",
            Money::kes(dec!(7500)),
        );
        draft.is_featured = true;
        catalog.save_type(&draft).await.unwrap();

        let public = catalog.list_types(&TypeFilter::public()).await.unwrap();
        assert_eq!(public.iter().map(|t| t.id).collect::<Vec<_>>(), vec![published.id]);

        let categories = catalog.list_categories(true).await.unwrap();
        assert_eq!(categories[0].policy_count, 1);

        let slugs = catalog.taken_slugs("Comprehensive Motor").await.unwrap();
        assert!(slugs.contains("comprehensive-motor"));
    }
}

mod policy_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_purchase_stores_schedule_and_stages() {
        let db = TestDatabase::new().await.unwrap();
        let (customer, policy_type) = seed(&db.pool).await;
        let policy = PolicyBuilder::new(customer.id)
            .frequency(PaymentFrequency::Quarterly)
            .build(&policy_type);
        purchase(&db.pool, &policy).await;

        let payments = PaymentRepository::new(db.pool.clone());
        let schedule = payments.schedules_for_policy(policy.id).await.unwrap();
        assert_eq!(schedule.len(), 4);
        assert_schedule_covers_premium(&schedule, &policy.premium_amount);

        let stages = WorkflowRepository::new(db.pool.clone())
            .stages_for_policy(policy.id)
            .await
            .unwrap();
        assert_eq!(stages.len(), 9);
        assert_stage(&stages, StageName::QuoteGenerated, StageStatus::Completed);
        assert_stage(&stages, StageName::PaymentPending, StageStatus::InProgress);
        assert_stage(&stages, StageName::Active, StageStatus::Pending);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_activation_closes_workflow() {
        let db = TestDatabase::new().await.unwrap();
        let (customer, policy_type) = seed(&db.pool).await;
        let mut policy = PolicyBuilder::new(customer.id).build(&policy_type);
        purchase(&db.pool, &policy).await;

        let policies = PolicyRepository::new(db.pool.clone());
        policy.activate().unwrap();
        policies
            .activate(&policy, &note(&customer, NotificationKind::PolicyIssued))
            .await
            .unwrap();

        let stored = policies.find(policy.id).await.unwrap();
        assert!(stored.activated_at.is_some());
        let stages = WorkflowRepository::new(db.pool.clone())
            .stages_for_policy(policy.id)
            .await
            .unwrap();
        assert!(stages.iter().all(|s| s.status.is_closed()));
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_cancel_voids_pending_installments() {
        let db = TestDatabase::new().await.unwrap();
        let (customer, policy_type) = seed(&db.pool).await;
        let mut policy = PolicyBuilder::new(customer.id)
            .frequency(PaymentFrequency::Monthly)
            .build(&policy_type);
        purchase(&db.pool, &policy).await;

        policy.cancel("Sold the car").unwrap();
        let voided = PolicyRepository::new(db.pool.clone()).cancel(&policy).await.unwrap();
        assert_eq!(voided, 12);

        let schedule = PaymentRepository::new(db.pool.clone())
            .schedules_for_policy(policy.id)
            .await
            .unwrap();
        assert!(schedule.iter().all(|s| s.status == ScheduleStatus::Cancelled));
    }
}

mod claim_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_new_claim_has_exactly_one_history_row() {
        let db = TestDatabase::new().await.unwrap();
        let (customer, policy_type) = seed(&db.pool).await;
        let policy = PolicyBuilder::new(customer.id).active().build(&policy_type);
        purchase(&db.pool, &policy).await;

        let claims = ClaimsRepository::new(db.pool.clone());
        let (claim, opening) = ClaimBuilder::new().build(&policy);
        claims
            .create(&claim, &opening, &note(&customer, NotificationKind::ClaimSubmitted))
            .await
            .unwrap();

        let stored = claims.find(claim.id).await.unwrap();
        assert_eq!(stored.status, ClaimStatus::Submitted);
        let history = claims.history(claim.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_history_consistent(&stored, &history);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_transitions_append_history() {
        let db = TestDatabase::new().await.unwrap();
        let (customer, policy_type) = seed(&db.pool).await;
        let policy = PolicyBuilder::new(customer.id).active().build(&policy_type);
        purchase(&db.pool, &policy).await;

        let assessor = UserBuilder::new().role(Role::Assessor).build();
        UserRepository::new(db.pool.clone()).create(&assessor).await.unwrap();

        let claims = ClaimsRepository::new(db.pool.clone());
        let (mut claim, opening) = ClaimBuilder::new().build(&policy);
        claims
            .create(&claim, &opening, &note(&customer, NotificationKind::ClaimSubmitted))
            .await
            .unwrap();

        let assigned = claim.assign(assessor.id, assessor.id).unwrap();
        claims.update(&claim, assigned.as_ref(), None).await.unwrap();
        let approved = claim.approve(Money::kes(dec!(40000)), "Garage quote verified", assessor.id).unwrap();
        claims
            .update(&claim, Some(&approved), Some(&note(&customer, NotificationKind::ClaimApproved)))
            .await
            .unwrap();

        let stored = claims.find(claim.id).await.unwrap();
        assert_kes(&stored.amount_approved.unwrap(), dec!(40000));
        let history = claims.history(claim.id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_history_consistent(&stored, &history);

        let pending = claims
            .list(&ClaimFilter { pending_review: true, ..Default::default() }, Page::default())
            .await
            .unwrap();
        assert!(pending.is_empty());

        let stats: ClaimStatistics = claims.statistics(Some(customer.id)).await.unwrap();
        assert_eq!(stats.count(ClaimStatus::Approved), 1);
        assert_eq!(stats.total_approved, dec!(40000));
    }
}

mod payment_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_completion_is_applied_once() {
        let db = TestDatabase::new().await.unwrap();
        let (customer, policy_type) = seed(&db.pool).await;
        let policy = PolicyBuilder::new(customer.id)
            .frequency(PaymentFrequency::SemiAnnual)
            .build(&policy_type);
        purchase(&db.pool, &policy).await;

        let payments = PaymentRepository::new(db.pool.clone());
        let mut txn = TransactionBuilder::new().amount(Money::kes(dec!(6000))).build(&policy);
        payments.create_transaction(&txn).await.unwrap();

        txn.complete(Completion {
            mpesa_receipt: Some("QGH7XY12AB".into()),
            ..Default::default()
        })
        .unwrap();
        let activity = UserActivity::record(Some(customer.id), ActivityAction::MakePayment);

        let first = payments
            .complete_transaction(&txn, &note(&customer, NotificationKind::PaymentReceived), &activity)
            .await
            .unwrap();
        assert!(first.applied);
        assert_eq!(first.installment.map(|s| s.installment_number), Some(1));

        let again = UserActivity::record(Some(customer.id), ActivityAction::MakePayment);
        let second = payments
            .complete_transaction(&txn, &note(&customer, NotificationKind::PaymentReceived), &again)
            .await
            .unwrap();
        assert!(!second.applied);

        let stored = payments.find_transaction(txn.id).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
        let pending = payments.schedules(Some(customer.id), ScheduleView::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);

        let stages = WorkflowRepository::new(db.pool.clone())
            .stages_for_policy(policy.id)
            .await
            .unwrap();
        assert_stage(&stages, StageName::PaymentReceived, StageStatus::Completed);

        let summary = payments.summary(Some(customer.id)).await.unwrap();
        assert_eq!(summary.successful_transactions, 1);
        assert_eq!(summary.successful_amount, dec!(6000));
        assert!(Utc::now() >= stored.completed_at.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_late_failure_does_not_overwrite_completion() {
        let db = TestDatabase::new().await.unwrap();
        let (customer, policy_type) = seed(&db.pool).await;
        let policy = PolicyBuilder::new(customer.id).build(&policy_type);
        purchase(&db.pool, &policy).await;

        let payments = PaymentRepository::new(db.pool.clone());
        let txn = TransactionBuilder::new().card().build(&policy);
        payments.create_transaction(&txn).await.unwrap();

        let mut paid = txn.clone();
        paid.complete(Completion::default()).unwrap();
        let activity = UserActivity::record(Some(customer.id), ActivityAction::MakePayment);
        payments
            .complete_transaction(&paid, &note(&customer, NotificationKind::PaymentReceived), &activity)
            .await
            .unwrap();

        let mut stale = txn.clone();
        stale.fail("Payment status: abandoned").unwrap();
        assert!(!payments.fail_transaction(&stale).await.unwrap());

        let stored = payments.find_transaction(txn.id).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
        assert_eq!(stored.failure_reason, None);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_gateway_success_completes_failed_payment() {
        let db = TestDatabase::new().await.unwrap();
        let (customer, policy_type) = seed(&db.pool).await;
        let policy = PolicyBuilder::new(customer.id).build(&policy_type);
        purchase(&db.pool, &policy).await;

        let payments = PaymentRepository::new(db.pool.clone());
        let mut txn = TransactionBuilder::new().card().build(&policy);
        payments.create_transaction(&txn).await.unwrap();
        txn.fail("Payment status: ongoing").unwrap();
        assert!(payments.fail_transaction(&txn).await.unwrap());

        txn.complete_from_gateway(Completion::default()).unwrap();
        let activity = UserActivity::record(Some(customer.id), ActivityAction::MakePayment);
        let outcome = payments
            .complete_transaction(&txn, &note(&customer, NotificationKind::PaymentReceived), &activity)
            .await
            .unwrap();

        assert!(outcome.applied);
        let stored = payments.find_transaction(txn.id).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_refund_is_claimed_once() {
        let db = TestDatabase::new().await.unwrap();
        let (customer, policy_type) = seed(&db.pool).await;
        let policy = PolicyBuilder::new(customer.id).build(&policy_type);
        purchase(&db.pool, &policy).await;

        let payments = PaymentRepository::new(db.pool.clone());
        let mut txn = TransactionBuilder::new().card().build(&policy);
        payments.create_transaction(&txn).await.unwrap();
        txn.complete(Completion::default()).unwrap();
        payments.save_transaction(&txn).await.unwrap();

        let refund = Refund::request(&txn, txn.amount, RefundReason::PolicyCancellation, "", &[]).unwrap();
        payments.create_refund(&refund).await.unwrap();

        let mut first = refund.clone();
        first.begin(&txn).unwrap();
        assert!(payments.start_refund(&first).await.unwrap());

        let mut second = refund.clone();
        second.begin(&txn).unwrap();
        assert!(!payments.start_refund(&second).await.unwrap());

        let stored = payments.find_refund(refund.id).await.unwrap();
        assert_eq!(stored.status, RefundStatus::Processing);
    }

    #[tokio::test]
    #[ignore = "requires docker"]
    async fn test_refund_processed_from_wrong_status_is_skipped() {
        let db = TestDatabase::new().await.unwrap();
        let (customer, policy_type) = seed(&db.pool).await;
        let policy = PolicyBuilder::new(customer.id).build(&policy_type);
        purchase(&db.pool, &policy).await;

        let payments = PaymentRepository::new(db.pool.clone());
        let mut txn = TransactionBuilder::new().card().build(&policy);
        payments.create_transaction(&txn).await.unwrap();
        txn.complete(Completion::default()).unwrap();
        payments.save_transaction(&txn).await.unwrap();

        let mut refund = Refund::request(&txn, txn.amount, RefundReason::Other, "", &[]).unwrap();
        payments.create_refund(&refund).await.unwrap();
        refund.fail("Rejected by staff", customer.id).unwrap();

        assert!(!payments.process_refund(&refund, RefundStatus::Processing, None).await.unwrap());
        assert!(payments.process_refund(&refund, RefundStatus::Pending, None).await.unwrap());
        assert!(!payments.process_refund(&refund, RefundStatus::Pending, None).await.unwrap());

        let stored = payments.find_refund(refund.id).await.unwrap();
        assert_eq!(stored.status, RefundStatus::Failed);
    }
}
