//! Tests for the billing domain
//!
//! Transactions, installment schedules, refunds, summaries and receipts.

use chrono::NaiveDate;
use core_kernel::{Money, PolicyId, TransactionId, UserId};
use domain_billing::{
    generate_schedule, next_due, BillingError, Completion, PaymentIntent, PaymentMethod,
    PaymentSummary, Receipt, Refund, RefundReason, RefundStatus, ScheduleStatus, Transaction,
    TransactionStatus,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Map};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn mpesa_payment(amount: Decimal) -> Transaction {
    Transaction::initiate(
        UserId::new(),
        PaymentIntent {
            policy_id: Some(PolicyId::new()),
            amount: Money::kes(amount),
            method: PaymentMethod::Mpesa,
            phone_number: Some("0712345678".into()),
            description: "Premium payment".into(),
        },
    )
    .unwrap()
}

fn completed(amount: Decimal) -> Transaction {
    let mut txn = mpesa_payment(amount);
    txn.mark_processing("ws_CO_191220191020363925").unwrap();
    let mut metadata = Map::new();
    metadata.insert("phone_number".into(), json!("254712345678"));
    txn.complete(Completion {
        mpesa_receipt: Some("NLJ7RT61SV".into()),
        metadata,
        ..Default::default()
    })
    .unwrap();
    txn
}

mod transaction_tests {
    use super::*;

    #[test]
    fn test_new_transaction_is_pending_with_reference() {
        let txn = mpesa_payment(dec!(1500));
        assert_eq!(txn.status, TransactionStatus::Pending);
        assert!(txn.transaction_number.starts_with("TXN-"));
        assert_eq!(txn.transaction_number.len(), "TXN-2024-".len() + 8);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let result = Transaction::initiate(
            UserId::new(),
            PaymentIntent {
                policy_id: None,
                amount: Money::kes(dec!(0)),
                method: PaymentMethod::Card,
                phone_number: None,
                description: String::new(),
            },
        );
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_processing_records_gateway_reference() {
        let mut txn = mpesa_payment(dec!(1500));
        txn.mark_processing("ws_CO_1").unwrap();
        assert_eq!(txn.status, TransactionStatus::Processing);
        assert_eq!(txn.gateway_reference.as_deref(), Some("ws_CO_1"));
        assert!(txn.ensure_pending().is_err());
    }

    #[test]
    fn test_completion_keeps_receipt_and_metadata() {
        let txn = completed(dec!(1500));
        assert_eq!(txn.status, TransactionStatus::Completed);
        assert_eq!(txn.mpesa_receipt.as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(txn.metadata["phone_number"], json!("254712345678"));
        assert_eq!(txn.gateway_reference.as_deref(), Some("ws_CO_191220191020363925"));
    }

    #[test]
    fn test_processing_cannot_be_cancelled() {
        let mut txn = mpesa_payment(dec!(1500));
        txn.mark_processing("ws_CO_1").unwrap();
        assert!(txn.cancel().is_err());
    }

    #[test]
    fn test_only_completed_can_be_refunded() {
        let mut txn = mpesa_payment(dec!(1500));
        assert!(txn.mark_refunded().is_err());
        let mut done = completed(dec!(1500));
        done.mark_refunded().unwrap();
        assert_eq!(done.status, TransactionStatus::Refunded);
    }

    #[test]
    fn test_gateway_success_revives_locally_failed_payment() {
        let mut txn = mpesa_payment(dec!(1500));
        txn.mark_processing("T_1").unwrap();
        txn.fail("Payment status: ongoing").unwrap();

        let applied = txn
            .complete_from_gateway(Completion {
                paystack_reference: Some("T_1".into()),
                ..Default::default()
            })
            .unwrap();

        assert!(applied);
        assert_eq!(txn.status, TransactionStatus::Completed);
        assert_eq!(txn.failure_reason, None);
        assert_eq!(txn.paystack_reference.as_deref(), Some("T_1"));
        assert!(txn.completed_at.is_some());
    }

    #[test]
    fn test_plain_completion_keeps_failed_payment_failed() {
        let mut txn = mpesa_payment(dec!(1500));
        txn.fail("Cancelled by user").unwrap();
        assert!(txn.complete(Completion::default()).is_err());
        assert_eq!(txn.status, TransactionStatus::Failed);
    }

    #[test]
    fn test_gateway_success_does_not_revive_cancelled_or_refunded() {
        let mut cancelled = mpesa_payment(dec!(1500));
        cancelled.cancel().unwrap();
        assert!(cancelled.complete_from_gateway(Completion::default()).is_err());

        let mut refunded = completed(dec!(1500));
        refunded.mark_refunded().unwrap();
        assert!(refunded.complete_from_gateway(Completion::default()).is_err());
        assert_eq!(refunded.status, TransactionStatus::Refunded);
    }

    #[test]
    fn test_repeated_gateway_success_is_a_no_op() {
        let mut txn = completed(dec!(1500));
        assert!(!txn.complete_from_gateway(Completion::default()).unwrap());
        assert_eq!(txn.mpesa_receipt.as_deref(), Some("NLJ7RT61SV"));
    }
}

mod schedule_tests {
    use super::*;

    #[test]
    fn test_annual_single_installment() {
        let schedule =
            generate_schedule(PolicyId::new(), Money::kes(dec!(36000)), 1, 12, date(2024, 5, 15)).unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].due_date, date(2024, 5, 15));
        assert_eq!(schedule[0].installment_number, 1);
    }

    #[test]
    fn test_quarterly_due_dates() {
        let schedule =
            generate_schedule(PolicyId::new(), Money::kes(dec!(10000)), 4, 3, date(2024, 11, 30)).unwrap();
        let dates: Vec<_> = schedule.iter().map(|s| s.due_date).collect();
        assert_eq!(dates, vec![date(2024, 11, 30), date(2025, 2, 28), date(2025, 5, 30), date(2025, 8, 30)]);
    }

    #[test]
    fn test_overdue_detection() {
        let mut schedule =
            generate_schedule(PolicyId::new(), Money::kes(dec!(10000)), 2, 6, date(2024, 1, 1)).unwrap();
        assert!(schedule[0].is_overdue(date(2024, 1, 2)));
        assert!(!schedule[0].is_overdue(date(2024, 1, 1)));
        schedule[0].mark_paid(TransactionId::new()).unwrap();
        assert!(!schedule[0].is_overdue(date(2024, 1, 2)));
    }

    #[test]
    fn test_paid_installment_cannot_be_paid_again() {
        let mut schedule =
            generate_schedule(PolicyId::new(), Money::kes(dec!(10000)), 2, 6, date(2024, 1, 1)).unwrap();
        schedule[0].mark_paid(TransactionId::new()).unwrap();
        assert!(schedule[0].mark_paid(TransactionId::new()).is_err());
    }

    #[test]
    fn test_cancel_leaves_paid_alone() {
        let mut schedule =
            generate_schedule(PolicyId::new(), Money::kes(dec!(10000)), 2, 6, date(2024, 1, 1)).unwrap();
        schedule[0].mark_paid(TransactionId::new()).unwrap();
        schedule.iter_mut().for_each(|s| s.cancel());
        assert_eq!(schedule[0].status, ScheduleStatus::Paid);
        assert_eq!(schedule[1].status, ScheduleStatus::Cancelled);
        assert!(next_due(&schedule).is_none());
    }
}

mod refund_tests {
    use super::*;

    #[test]
    fn test_refund_of_pending_payment_rejected() {
        let txn = mpesa_payment(dec!(1000));
        let result = Refund::request(&txn, Money::kes(dec!(100)), RefundReason::Overpayment, "", &[]);
        assert!(matches!(result, Err(BillingError::NotRefundable(_))));
    }

    #[test]
    fn test_refund_cannot_exceed_payment() {
        let txn = completed(dec!(1000));
        let result = Refund::request(&txn, Money::kes(dec!(1000.01)), RefundReason::Overpayment, "", &[]);
        assert!(matches!(result, Err(BillingError::RefundExceedsPayment)));
    }

    #[test]
    fn test_second_refund_blocked_unless_first_failed() {
        let txn = completed(dec!(1000));
        let mut first =
            Refund::request(&txn, Money::kes(dec!(500)), RefundReason::DuplicatePayment, "Paid twice", &[]).unwrap();
        assert!(first.refund_number.starts_with("RFD-"));
        let blocked = Refund::request(&txn, Money::kes(dec!(500)), RefundReason::Other, "", &[first.clone()]);
        assert!(matches!(blocked, Err(BillingError::RefundExists)));

        first.fail("Gateway rejected", UserId::new()).unwrap();
        assert!(Refund::request(&txn, Money::kes(dec!(500)), RefundReason::Other, "", &[first]).is_ok());
    }

    #[test]
    fn test_processed_refund_is_final() {
        let txn = completed(dec!(1000));
        let mut refund =
            Refund::request(&txn, Money::kes(dec!(1000)), RefundReason::PolicyCancellation, "", &[]).unwrap();
        refund.complete(Some("RF_123".into()), UserId::new()).unwrap();
        assert_eq!(refund.status, RefundStatus::Completed);
        assert!(refund.fail("late", UserId::new()).is_err());
    }

    #[test]
    fn test_begin_claims_pending_refund_once() {
        let txn = completed(dec!(1000));
        let mut refund = Refund::request(&txn, Money::kes(dec!(400)), RefundReason::Overpayment, "", &[]).unwrap();

        refund.begin(&txn).unwrap();
        assert_eq!(refund.status, RefundStatus::Processing);
        assert!(matches!(refund.begin(&txn), Err(BillingError::InvalidOperation(_))));
    }

    #[test]
    fn test_decided_refund_cannot_begin_again() {
        let txn = completed(dec!(1000));
        let mut done = Refund::request(&txn, Money::kes(dec!(400)), RefundReason::Overpayment, "", &[]).unwrap();
        done.complete(Some("RF_1".into()), UserId::new()).unwrap();
        assert!(done.begin(&txn).is_err());

        let mut failed = Refund::request(&txn, Money::kes(dec!(400)), RefundReason::Overpayment, "", &[]).unwrap();
        failed.fail("Gateway rejected", UserId::new()).unwrap();
        assert!(failed.begin(&txn).is_err());
    }

    #[test]
    fn test_begin_requires_completed_payment() {
        let mut txn = completed(dec!(1000));
        let mut refund = Refund::request(&txn, Money::kes(dec!(1000)), RefundReason::Other, "", &[]).unwrap();
        txn.mark_refunded().unwrap();

        assert!(matches!(refund.begin(&txn), Err(BillingError::NotRefundable(_))));
        assert_eq!(refund.status, RefundStatus::Pending);
    }

    #[test]
    fn test_begin_rejects_another_transaction() {
        let txn = completed(dec!(1000));
        let other = completed(dec!(1000));
        let mut refund = Refund::request(&txn, Money::kes(dec!(100)), RefundReason::Other, "", &[]).unwrap();

        assert!(matches!(refund.begin(&other), Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_reopen_returns_refund_to_queue() {
        let txn = completed(dec!(1000));
        let mut refund = Refund::request(&txn, Money::kes(dec!(100)), RefundReason::Other, "", &[]).unwrap();
        refund.begin(&txn).unwrap();

        refund.reopen();
        assert_eq!(refund.status, RefundStatus::Pending);
        refund.begin(&txn).unwrap();
    }
}

mod summary_tests {
    use super::*;

    #[test]
    fn test_summary_totals() {
        let done = completed(dec!(1000));
        let open = mpesa_payment(dec!(250));
        let mut failed = mpesa_payment(dec!(99));
        failed.fail("Insufficient funds").unwrap();

        let mut refund = Refund::request(&done, Money::kes(dec!(300)), RefundReason::Overpayment, "", &[]).unwrap();
        refund.complete(None, UserId::new()).unwrap();

        let summary = PaymentSummary::build([&done, &open, &failed], [&refund]);
        assert_eq!(summary.total_transactions, 3);
        assert_eq!(summary.successful_transactions, 1);
        assert_eq!(summary.failed_transactions, 1);
        assert_eq!(summary.pending_transactions, 1);
        assert_eq!(summary.total_amount, dec!(1250));
        assert_eq!(summary.successful_amount, dec!(1000));
        assert_eq!(summary.refunded_amount, dec!(300));
        assert_eq!(summary.currency, "KES");
    }

    #[test]
    fn test_receipt_only_for_completed() {
        let open = mpesa_payment(dec!(250));
        assert!(Receipt::for_transaction(&open, None, "Jane", "jane@example.com").is_err());

        let done = completed(dec!(1000));
        let receipt = Receipt::for_transaction(&done, Some("POL-2024-000001".into()), "Jane", "jane@example.com").unwrap();
        assert_eq!(receipt.payment_method, "M-Pesa");
        assert_eq!(receipt.reference.as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(receipt.amount, dec!(1000));
    }
}

proptest! {
    #[test]
    fn prop_installments_sum_to_premium(cents in 0i64..100_000_000, idx in 0usize..4) {
        let (count, interval) = [(1u32, 12u32), (2, 6), (4, 3), (12, 1)][idx];
        let premium = Money::from_minor(cents, core_kernel::Currency::KES);
        let schedule = generate_schedule(PolicyId::new(), premium, count, interval, date(2024, 1, 31)).unwrap();
        prop_assert_eq!(schedule.len(), count as usize);
        let total: Decimal = schedule.iter().map(|s| s.amount.amount()).sum();
        prop_assert_eq!(total, premium.amount());
        let max = schedule.iter().map(|s| s.amount.amount()).max().unwrap();
        let min = schedule.iter().map(|s| s.amount.amount()).min().unwrap();
        prop_assert!(max - min <= dec!(0.01));
    }

    #[test]
    fn prop_due_dates_strictly_increase(idx in 0usize..4, day in 1u32..=28) {
        let (count, interval) = [(1u32, 12u32), (2, 6), (4, 3), (12, 1)][idx];
        let schedule = generate_schedule(PolicyId::new(), Money::kes(dec!(1200)), count, interval, date(2024, 1, day)).unwrap();
        prop_assert!(schedule.windows(2).all(|w| w[0].due_date < w[1].due_date));
    }
}
