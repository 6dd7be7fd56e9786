//! Unit tests for the claims domain
//!
//! Covers intake rules, the adjudication state machine, history entries,
//! settlement validation, documents and statistics.

use chrono::NaiveDate;
use core_kernel::{Money, PolicyId, UserId};
use domain_claims::{
    Claim, ClaimDocument, ClaimDocumentType, ClaimEdit, ClaimError, ClaimSettlement,
    ClaimStatistics, ClaimStatus, ClaimType, CoveredPolicy, NewClaim, SettlementMethod,
    SettlementRequest,
};
use proptest::prelude::*;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn covered(holder: UserId) -> CoveredPolicy {
    CoveredPolicy {
        id: PolicyId::new(),
        holder,
        is_active: true,
        start_date: date(2024, 1, 1),
        end_date: date(2024, 12, 31),
        coverage_amount: Money::kes(dec!(1000000)),
    }
}

fn file_claim() -> (Claim, UserId) {
    let holder = UserId::new();
    let (claim, _) = Claim::submit(
        &covered(holder),
        holder,
        NewClaim {
            claim_type: ClaimType::Theft,
            description: "Phone stolen at Kencom stage".into(),
            incident_date: date(2024, 5, 2),
            incident_location: "Nairobi CBD".into(),
            amount_claimed: Money::kes(dec!(85000)),
        },
        date(2024, 5, 3),
    )
    .unwrap();
    (claim, holder)
}

fn approved_claim() -> Claim {
    let (mut claim, _) = file_claim();
    let assessor = UserId::new();
    claim.assign(assessor, UserId::new()).unwrap();
    claim.approve(Money::kes(dec!(80000)), "", assessor).unwrap();
    claim
}

mod intake_tests {
    use super::*;

    #[test]
    fn test_claim_starts_submitted() {
        let (claim, holder) = file_claim();
        assert_eq!(claim.status, ClaimStatus::Submitted);
        assert_eq!(claim.user_id, holder);
        assert!(claim.claim_number.starts_with("CLM-"));
    }

    #[test]
    fn test_other_users_policy_rejected() {
        let holder = UserId::new();
        let result = Claim::submit(
            &covered(holder),
            UserId::new(),
            NewClaim {
                claim_type: ClaimType::Fire,
                description: "Kitchen fire".into(),
                incident_date: date(2024, 5, 2),
                incident_location: String::new(),
                amount_claimed: Money::kes(dec!(1)),
            },
            date(2024, 5, 3),
        );
        assert_eq!(result.unwrap_err(), ClaimError::NotPolicyHolder);
    }

    #[test]
    fn test_inactive_policy_rejected() {
        let holder = UserId::new();
        let mut policy = covered(holder);
        policy.is_active = false;
        let result = Claim::submit(
            &policy,
            holder,
            NewClaim {
                claim_type: ClaimType::Medical,
                description: "Hospital stay".into(),
                incident_date: date(2024, 5, 2),
                incident_location: String::new(),
                amount_claimed: Money::kes(dec!(1)),
            },
            date(2024, 5, 3),
        );
        assert_eq!(result.unwrap_err(), ClaimError::PolicyNotActive);
    }

    #[test]
    fn test_amount_above_coverage_rejected() {
        let holder = UserId::new();
        let result = Claim::submit(
            &covered(holder),
            holder,
            NewClaim {
                claim_type: ClaimType::Death,
                description: "Death benefit".into(),
                incident_date: date(2024, 5, 2),
                incident_location: String::new(),
                amount_claimed: Money::kes(dec!(1000000.01)),
            },
            date(2024, 5, 3),
        );
        assert_eq!(result.unwrap_err(), ClaimError::ExceedsCoverage);
    }

    #[test]
    fn test_incident_before_policy_start_rejected() {
        let holder = UserId::new();
        let result = Claim::submit(
            &covered(holder),
            holder,
            NewClaim {
                claim_type: ClaimType::Accident,
                description: "Old accident".into(),
                incident_date: date(2023, 12, 31),
                incident_location: String::new(),
                amount_claimed: Money::kes(dec!(100)),
            },
            date(2024, 5, 3),
        );
        assert_eq!(result.unwrap_err(), ClaimError::CoverageNotInForce);
    }

    #[test]
    fn test_edit_only_while_submitted() {
        let (mut claim, _) = file_claim();
        let cover = Money::kes(dec!(1000000));
        claim
            .edit(ClaimEdit { amount_claimed: Some(Money::kes(dec!(90000))), ..Default::default() }, &cover)
            .unwrap();
        assert_eq!(claim.amount_claimed, Money::kes(dec!(90000)));

        claim.assign(UserId::new(), UserId::new()).unwrap();
        let result = claim.edit(ClaimEdit { description: Some("changed".into()), ..Default::default() }, &cover);
        assert!(matches!(result, Err(ClaimError::NotEditable(_))));
    }
}

mod adjudication_tests {
    use super::*;

    #[test]
    fn test_assign_moves_to_under_review_with_history() {
        let (mut claim, _) = file_claim();
        let assessor = UserId::new();
        let change = claim.assign(assessor, UserId::new()).unwrap().unwrap();
        assert_eq!(change.from_status, Some(ClaimStatus::Submitted));
        assert_eq!(change.to_status, ClaimStatus::UnderReview);
        assert_eq!(claim.assessor_id, Some(assessor));
        assert!(claim.assigned_at.is_some());
    }

    #[test]
    fn test_reassign_during_review_records_no_history() {
        let (mut claim, _) = file_claim();
        claim.assign(UserId::new(), UserId::new()).unwrap();
        assert!(claim.assign(UserId::new(), UserId::new()).unwrap().is_none());
    }

    #[test]
    fn test_documents_requested_round_trip() {
        let (mut claim, _) = file_claim();
        let assessor = UserId::new();
        claim.request_documents("", assessor).unwrap();
        assert_eq!(claim.status, ClaimStatus::DocumentsRequested);
        let change = claim.transition(ClaimStatus::UnderReview, "Documents received", assessor).unwrap();
        assert_eq!(change.from_status, Some(ClaimStatus::DocumentsRequested));
    }

    #[test]
    fn test_approval_cannot_exceed_claimed() {
        let (mut claim, _) = file_claim();
        let assessor = UserId::new();
        claim.assign(assessor, assessor).unwrap();
        assert_eq!(
            claim.approve(Money::kes(dec!(85000.01)), "", assessor).unwrap_err(),
            ClaimError::ApprovedExceedsClaimed
        );
        assert!(claim.approve(Money::kes(dec!(0)), "", assessor).is_err());
    }

    #[test]
    fn test_complete_assessment_then_approve() {
        let (mut claim, _) = file_claim();
        let assessor = UserId::new();
        claim.assign(assessor, assessor).unwrap();
        claim.complete_assessment("Police abstract verified", assessor).unwrap();
        assert!(claim.assessment_date.is_some());
        claim.approve(Money::kes(dec!(85000)), "Full amount", assessor).unwrap();
        assert!(claim.assessor_notes.contains("Police abstract verified"));
        assert!(claim.assessor_notes.contains("Full amount"));
    }

    #[test]
    fn test_reject_requires_reason() {
        let (mut claim, _) = file_claim();
        let assessor = UserId::new();
        assert!(claim.reject("  ", assessor).is_err());
        claim.reject("Incident not covered", assessor).unwrap();
        assert_eq!(claim.status, ClaimStatus::Rejected);
        assert_eq!(claim.rejection_reason.as_deref(), Some("Incident not covered"));
        assert!(claim.assign(assessor, assessor).is_err());
    }
}

mod manual_status_tests {
    use super::*;

    #[test]
    fn test_outcomes_are_refused_without_their_action() {
        for outcome in [ClaimStatus::Approved, ClaimStatus::Rejected, ClaimStatus::Settled] {
            let (mut claim, _) = file_claim();
            let staff = UserId::new();
            claim.change_status(ClaimStatus::UnderReview, "", staff).unwrap();

            let result = claim.change_status(outcome, "Looks fine", staff);

            assert_eq!(result.unwrap_err(), ClaimError::RequiresAction(outcome.to_string()));
            assert_eq!(claim.status, ClaimStatus::UnderReview);
            assert!(claim.amount_approved.is_none());
            assert!(claim.rejection_reason.is_none());
        }
    }

    #[test]
    fn test_approved_claim_is_not_settled_without_settlement() {
        let mut claim = approved_claim();
        let result = claim.change_status(ClaimStatus::Settled, "", UserId::new());
        assert!(matches!(result, Err(ClaimError::RequiresAction(_))));
        assert_eq!(claim.status, ClaimStatus::Approved);
        assert!(claim.settlement_date.is_none());
    }

    #[test]
    fn test_review_moves_are_allowed_and_recorded() {
        let (mut claim, _) = file_claim();
        let staff = UserId::new();
        let change = claim.change_status(ClaimStatus::DocumentsRequested, "Need receipts", staff).unwrap();
        assert_eq!(change.to_status, ClaimStatus::DocumentsRequested);
        assert_eq!(change.notes, "Need receipts");
        claim.change_status(ClaimStatus::UnderReview, "", staff).unwrap();
        assert_eq!(claim.status, ClaimStatus::UnderReview);
    }

    #[test]
    fn test_manual_assessment_completion_stamps_date() {
        let (mut claim, _) = file_claim();
        let staff = UserId::new();
        claim.change_status(ClaimStatus::UnderReview, "", staff).unwrap();
        claim.change_status(ClaimStatus::AssessmentComplete, "Site visit done", staff).unwrap();
        assert!(claim.assessment_date.is_some());
        assert!(claim.assessor_notes.contains("Site visit done"));
    }

    #[test]
    fn test_invalid_manual_move_still_rejected() {
        let (mut claim, _) = file_claim();
        let result = claim.change_status(ClaimStatus::AssessmentComplete, "", UserId::new());
        assert!(matches!(result, Err(ClaimError::InvalidStatusTransition { .. })));
    }
}

mod settlement_tests {
    use super::*;

    #[test]
    fn test_settlement_defaults_to_approved_amount() {
        let claim = approved_claim();
        let settlement = ClaimSettlement::prepare(
            &claim,
            SettlementMethod::Mpesa,
            SettlementRequest { mpesa_phone: Some("254712345678".into()), ..Default::default() },
            UserId::new(),
        )
        .unwrap();
        assert_eq!(settlement.amount, Money::kes(dec!(80000)));
    }

    #[test]
    fn test_bank_transfer_requires_account_details() {
        let claim = approved_claim();
        let result = ClaimSettlement::prepare(
            &claim,
            SettlementMethod::BankTransfer,
            SettlementRequest { bank_name: Some("KCB".into()), ..Default::default() },
            UserId::new(),
        );
        assert!(matches!(result, Err(ClaimError::Validation(_))));
    }

    #[test]
    fn test_settlement_cannot_exceed_approved() {
        let claim = approved_claim();
        let result = ClaimSettlement::prepare(
            &claim,
            SettlementMethod::Cheque,
            SettlementRequest {
                amount: Some(Money::kes(dec!(80001))),
                cheque_number: Some("000123".into()),
                ..Default::default()
            },
            UserId::new(),
        );
        assert_eq!(result.unwrap_err(), ClaimError::SettlementExceedsApproved);
    }

    #[test]
    fn test_unapproved_claim_cannot_settle() {
        let (claim, _) = file_claim();
        let result = ClaimSettlement::prepare(
            &claim,
            SettlementMethod::Cheque,
            SettlementRequest { cheque_number: Some("1".into()), ..Default::default() },
            UserId::new(),
        );
        assert_eq!(result.unwrap_err(), ClaimError::NotApproved);
    }

    #[test]
    fn test_mark_settled_sets_date() {
        let mut claim = approved_claim();
        let change = claim.mark_settled("Paid via M-Pesa", UserId::new()).unwrap();
        assert_eq!(change.to_status, ClaimStatus::Settled);
        assert!(claim.settlement_date.is_some());
    }
}

mod document_tests {
    use super::*;

    #[test]
    fn test_zero_byte_document_rejected() {
        let (claim, holder) = file_claim();
        let result = ClaimDocument::new(
            claim.id,
            ClaimDocumentType::PoliceReport,
            "OB abstract",
            "claims/abc.pdf",
            0,
            "application/pdf",
            holder,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_document_type_parse() {
        assert_eq!("witness_statement".parse::<ClaimDocumentType>().unwrap(), ClaimDocumentType::WitnessStatement);
        assert!("selfie".parse::<ClaimDocumentType>().is_err());
    }
}

mod statistics_tests {
    use super::*;

    #[test]
    fn test_tally_and_approval_rate() {
        let approved = approved_claim();
        let (mut rejected, _) = file_claim();
        rejected.reject("Fraud suspected", UserId::new()).unwrap();
        let (open, _) = file_claim();

        let stats = ClaimStatistics::tally([&approved, &rejected, &open]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.count(ClaimStatus::Approved), 1);
        assert_eq!(stats.count(ClaimStatus::Submitted), 1);
        assert_eq!(stats.total_claimed, dec!(255000));
        assert_eq!(stats.total_approved, dec!(80000));
        assert_eq!(stats.approval_rate(), dec!(50));
    }
}

fn status_strategy() -> impl Strategy<Value = ClaimStatus> {
    (0usize..ClaimStatus::ALL.len()).prop_map(|i| ClaimStatus::ALL[i])
}

proptest! {
    #[test]
    fn prop_history_always_records_actual_move(targets in proptest::collection::vec(status_strategy(), 0..12)) {
        let (mut claim, _) = file_claim();
        let by = UserId::new();
        for to in targets {
            let before = claim.status;
            match claim.transition(to, "", by) {
                Ok(change) => {
                    prop_assert_eq!(change.from_status, Some(before));
                    prop_assert_eq!(change.to_status, to);
                    prop_assert_eq!(claim.status, to);
                }
                Err(_) => prop_assert_eq!(claim.status, before),
            }
        }
    }

    #[test]
    fn prop_no_transition_to_submitted(from in status_strategy()) {
        prop_assert!(!from.can_transition_to(ClaimStatus::Submitted));
    }
}
