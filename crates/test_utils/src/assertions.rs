//! Custom Test Assertions
//!
//! Assertion helpers that print domain context on failure.

use core_kernel::Money;
use domain_billing::PaymentSchedule;
use domain_claims::{Claim, ClaimStatus, StatusChange};
use domain_policy::{StageName, StageStatus, WorkflowStage};
use rust_decimal::Decimal;

/// Asserts a shilling amount
pub fn assert_kes(actual: &Money, expected: Decimal) {
    assert_eq!(
        actual.currency().code(),
        "KES",
        "Expected a KES amount, got {}",
        actual.currency().code()
    );
    assert_eq!(
        actual.amount(),
        expected,
        "Expected KES {}, got KES {}",
        expected,
        actual.amount()
    );
}

/// Asserts that installments add up to the premium exactly and are numbered 1..n
pub fn assert_schedule_covers_premium(schedule: &[PaymentSchedule], premium: &Money) {
    let total: Decimal = schedule.iter().map(|s| s.amount.amount()).sum();
    assert_eq!(
        total,
        premium.amount(),
        "Installments sum to {} but the premium is {}",
        total,
        premium.amount()
    );
    for (i, installment) in schedule.iter().enumerate() {
        assert_eq!(
            installment.installment_number,
            i as i32 + 1,
            "Installment numbers must run 1..n"
        );
    }
    assert!(
        schedule.windows(2).all(|w| w[0].due_date < w[1].due_date),
        "Due dates must be strictly increasing"
    );
}

/// Asserts that a claim's history opens with its submission, chains from
/// status to status, and ends in the claim's current status
pub fn assert_history_consistent(claim: &Claim, history: &[StatusChange]) {
    let first = history.first().expect("a claim always has history");
    assert_eq!(first.from_status, None, "History must open from no status");
    assert_eq!(first.to_status, ClaimStatus::Submitted, "History must open with submission");
    for pair in history.windows(2) {
        assert_eq!(
            pair[1].from_status,
            Some(pair[0].to_status),
            "History row {} does not continue from {}",
            pair[1].to_status,
            pair[0].to_status
        );
    }
    let last = history.last().map(|h| h.to_status);
    assert_eq!(last, Some(claim.status), "History must end in the claim's status");
}

/// Asserts the status of one named workflow stage
pub fn assert_stage(stages: &[WorkflowStage], name: StageName, expected: StageStatus) {
    let stage = stages
        .iter()
        .find(|s| s.stage_name == name)
        .unwrap_or_else(|| panic!("No {} stage", name));
    assert_eq!(
        stage.status, expected,
        "Stage {} is {}, expected {}",
        name, stage.status, expected
    );
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that a result is Err and returns the error
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::PolicyId;
    use domain_billing::generate_schedule;
    use rust_decimal_macros::dec;

    #[test]
    fn test_schedule_assertion_accepts_generated_schedule() {
        let premium = Money::kes(dec!(1000.01));
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let schedule = generate_schedule(PolicyId::new(), premium, 12, 1, start).unwrap();
        assert_schedule_covers_premium(&schedule, &premium);
    }

    #[test]
    #[should_panic(expected = "Expected KES")]
    fn test_kes_assertion_reports_mismatch() {
        assert_kes(&Money::kes(dec!(10)), dec!(11));
    }
}
