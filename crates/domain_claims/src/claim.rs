//! Claim aggregate

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{calendar, reference, ClaimId, Money, PolicyId, ReferenceKind, UserId};

use crate::error::ClaimError;
use crate::history::StatusChange;

/// Claim status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// Filed by the customer
    Submitted,
    /// Picked up by an assessor
    UnderReview,
    /// Waiting on the customer for more evidence
    DocumentsRequested,
    /// Assessor finished the review, decision pending
    AssessmentComplete,
    /// Approved for payment
    Approved,
    /// Rejected
    Rejected,
    /// Paid out and closed
    Settled,
}

impl ClaimStatus {
    pub const ALL: [ClaimStatus; 7] = [
        ClaimStatus::Submitted,
        ClaimStatus::UnderReview,
        ClaimStatus::DocumentsRequested,
        ClaimStatus::AssessmentComplete,
        ClaimStatus::Approved,
        ClaimStatus::Rejected,
        ClaimStatus::Settled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Submitted => "submitted",
            ClaimStatus::UnderReview => "under_review",
            ClaimStatus::DocumentsRequested => "documents_requested",
            ClaimStatus::AssessmentComplete => "assessment_complete",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
            ClaimStatus::Settled => "settled",
        }
    }

    /// Checks if transition is valid
    pub fn can_transition_to(&self, target: ClaimStatus) -> bool {
        use ClaimStatus::*;
        matches!(
            (self, target),
            (Submitted, UnderReview) |
            (Submitted, DocumentsRequested) |
            (Submitted, Rejected) |
            (UnderReview, DocumentsRequested) |
            (UnderReview, AssessmentComplete) |
            (UnderReview, Approved) |
            (UnderReview, Rejected) |
            (DocumentsRequested, UnderReview) |
            (DocumentsRequested, Rejected) |
            (AssessmentComplete, Approved) |
            (AssessmentComplete, Rejected) |
            (Approved, Settled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ClaimStatus::Rejected | ClaimStatus::Settled)
    }

    /// Statuses that sit in the assessors' work queue
    pub fn is_pending_review(&self) -> bool {
        matches!(
            self,
            ClaimStatus::Submitted | ClaimStatus::UnderReview | ClaimStatus::DocumentsRequested
        )
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClaimStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ClaimError::Validation(format!("Unknown claim status: {}", s)))
    }
}

/// Type of loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Accident,
    Theft,
    Fire,
    Medical,
    Death,
    Disability,
    PropertyDamage,
    ThirdParty,
    Other,
}

impl ClaimType {
    pub const ALL: [ClaimType; 9] = [
        ClaimType::Accident,
        ClaimType::Theft,
        ClaimType::Fire,
        ClaimType::Medical,
        ClaimType::Death,
        ClaimType::Disability,
        ClaimType::PropertyDamage,
        ClaimType::ThirdParty,
        ClaimType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Accident => "accident",
            ClaimType::Theft => "theft",
            ClaimType::Fire => "fire",
            ClaimType::Medical => "medical",
            ClaimType::Death => "death",
            ClaimType::Disability => "disability",
            ClaimType::PropertyDamage => "property_damage",
            ClaimType::ThirdParty => "third_party",
            ClaimType::Other => "other",
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimType {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClaimType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ClaimError::Validation(format!("Unknown claim type: {}", s)))
    }
}

/// The facts about a policy a claim is checked against
#[derive(Debug, Clone)]
pub struct CoveredPolicy {
    pub id: PolicyId,
    pub holder: UserId,
    pub is_active: bool,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub coverage_amount: Money,
}

/// A customer's first notice of loss
#[derive(Debug, Clone)]
pub struct NewClaim {
    pub claim_type: ClaimType,
    pub description: String,
    pub incident_date: NaiveDate,
    pub incident_location: String,
    pub amount_claimed: Money,
}

/// Fields the claimant may edit while the claim is still `submitted`
#[derive(Debug, Clone, Default)]
pub struct ClaimEdit {
    pub description: Option<String>,
    pub incident_location: Option<String>,
    pub amount_claimed: Option<Money>,
}

/// A claim against a policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub claim_number: String,
    pub policy_id: PolicyId,
    pub user_id: UserId,
    pub claim_type: ClaimType,
    pub description: String,
    pub incident_date: NaiveDate,
    pub incident_location: String,
    pub amount_claimed: Money,
    pub amount_approved: Option<Money>,
    pub status: ClaimStatus,
    pub assessor_id: Option<UserId>,
    pub assessor_notes: String,
    pub rejection_reason: Option<String>,
    pub filed_date: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub assessment_date: Option<DateTime<Utc>>,
    pub settlement_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    /// Files a new claim against `policy` on behalf of `claimant`
    ///
    /// Returns the claim in `submitted` together with its opening history
    /// entry; both must be stored in the same transaction.
    pub fn submit(
        policy: &CoveredPolicy,
        claimant: UserId,
        input: NewClaim,
        today: NaiveDate,
    ) -> Result<(Self, StatusChange), ClaimError> {
        if policy.holder != claimant {
            return Err(ClaimError::NotPolicyHolder);
        }
        if !policy.is_active {
            return Err(ClaimError::PolicyNotActive);
        }
        if input.incident_date > today {
            return Err(ClaimError::Validation("Incident date cannot be in the future".into()));
        }
        if input.incident_date < policy.start_date || input.incident_date > policy.end_date {
            return Err(ClaimError::CoverageNotInForce);
        }
        if input.description.trim().is_empty() {
            return Err(ClaimError::Validation("Description is required".into()));
        }
        check_amount(&input.amount_claimed, &policy.coverage_amount)?;

        let now = Utc::now();
        let claim = Self {
            id: ClaimId::new_v7(),
            claim_number: reference::generate(ReferenceKind::Claim, calendar::year_of(now)),
            policy_id: policy.id,
            user_id: claimant,
            claim_type: input.claim_type,
            description: input.description,
            incident_date: input.incident_date,
            incident_location: input.incident_location,
            amount_claimed: input.amount_claimed.round_to_currency(),
            amount_approved: None,
            status: ClaimStatus::Submitted,
            assessor_id: None,
            assessor_notes: String::new(),
            rejection_reason: None,
            filed_date: now,
            assigned_at: None,
            assessment_date: None,
            settlement_date: None,
            updated_at: now,
        };
        let opening = StatusChange::opening(claim.id, claimant, now);
        Ok((claim, opening))
    }

    /// Moves to `to` and returns the history entry to record
    pub fn transition(
        &mut self,
        to: ClaimStatus,
        notes: impl Into<String>,
        changed_by: UserId,
    ) -> Result<StatusChange, ClaimError> {
        if !self.status.can_transition_to(to) {
            return Err(ClaimError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        let from = self.status;
        self.status = to;
        self.updated_at = Utc::now();
        Ok(StatusChange::new(self.id, Some(from), to, notes, Some(changed_by), self.updated_at))
    }

    /// Manual status change by staff
    ///
    /// Outcomes carry data of their own (approved amount, rejection reason,
    /// settlement record), so they are reached only through `approve`,
    /// `reject` and `mark_settled`.
    pub fn change_status(
        &mut self,
        to: ClaimStatus,
        notes: impl Into<String>,
        changed_by: UserId,
    ) -> Result<StatusChange, ClaimError> {
        let notes: String = notes.into();
        match to {
            ClaimStatus::Approved | ClaimStatus::Rejected | ClaimStatus::Settled => {
                Err(ClaimError::RequiresAction(to.to_string()))
            }
            ClaimStatus::AssessmentComplete => self.complete_assessment(&notes, changed_by),
            _ => self.transition(to, notes, changed_by),
        }
    }

    /// Claimant edits, allowed only before review starts
    pub fn edit(&mut self, edit: ClaimEdit, coverage: &Money) -> Result<(), ClaimError> {
        if self.status != ClaimStatus::Submitted {
            return Err(ClaimError::NotEditable(self.status.to_string()));
        }
        if let Some(amount) = &edit.amount_claimed {
            check_amount(amount, coverage)?;
        }
        if let Some(description) = edit.description {
            if description.trim().is_empty() {
                return Err(ClaimError::Validation("Description is required".into()));
            }
            self.description = description;
        }
        if let Some(location) = edit.incident_location {
            self.incident_location = location;
        }
        if let Some(amount) = edit.amount_claimed {
            self.amount_claimed = amount.round_to_currency();
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Hands the claim to an assessor
    ///
    /// A `submitted` claim moves to `under_review`; reassignment in later
    /// states only changes the assessor.
    pub fn assign(&mut self, assessor: UserId, by: UserId) -> Result<Option<StatusChange>, ClaimError> {
        if self.status.is_terminal() {
            return Err(ClaimError::ClaimClosed);
        }
        let now = Utc::now();
        self.assessor_id = Some(assessor);
        self.assigned_at = Some(now);
        self.updated_at = now;
        if self.status == ClaimStatus::Submitted {
            return self
                .transition(ClaimStatus::UnderReview, "Claim assigned to assessor", by)
                .map(Some);
        }
        Ok(None)
    }

    pub fn request_documents(&mut self, notes: &str, by: UserId) -> Result<StatusChange, ClaimError> {
        let notes = if notes.trim().is_empty() {
            "Additional documents requested".to_string()
        } else {
            notes.to_string()
        };
        self.transition(ClaimStatus::DocumentsRequested, notes, by)
    }

    pub fn complete_assessment(&mut self, notes: &str, by: UserId) -> Result<StatusChange, ClaimError> {
        let change = self.transition(ClaimStatus::AssessmentComplete, notes, by)?;
        self.assessment_date = Some(self.updated_at);
        self.append_notes(notes);
        Ok(change)
    }

    /// Approves `amount`, which must be positive and no more than claimed
    pub fn approve(&mut self, amount: Money, notes: &str, by: UserId) -> Result<StatusChange, ClaimError> {
        if !amount.is_positive() {
            return Err(ClaimError::Validation("Approved amount must be greater than zero".into()));
        }
        if amount.amount() > self.amount_claimed.amount() {
            return Err(ClaimError::ApprovedExceedsClaimed);
        }
        let change = self.transition(
            ClaimStatus::Approved,
            format!("Claim approved for {}", amount.round_to_currency()),
            by,
        )?;
        self.amount_approved = Some(amount.round_to_currency());
        self.assessment_date = Some(self.updated_at);
        self.append_notes(notes);
        Ok(change)
    }

    pub fn reject(&mut self, reason: &str, by: UserId) -> Result<StatusChange, ClaimError> {
        if reason.trim().is_empty() {
            return Err(ClaimError::Validation("Rejection reason is required".into()));
        }
        let change = self.transition(ClaimStatus::Rejected, format!("Claim rejected: {}", reason.trim()), by)?;
        self.rejection_reason = Some(reason.trim().to_string());
        self.assessment_date.get_or_insert(self.updated_at);
        Ok(change)
    }

    /// Marks an approved claim settled
    pub fn mark_settled(&mut self, notes: impl Into<String>, by: UserId) -> Result<StatusChange, ClaimError> {
        if self.status != ClaimStatus::Approved {
            return Err(ClaimError::NotApproved);
        }
        let change = self.transition(ClaimStatus::Settled, notes, by)?;
        self.settlement_date = Some(self.updated_at);
        Ok(change)
    }

    pub fn append_notes(&mut self, notes: &str) {
        let notes = notes.trim();
        if notes.is_empty() {
            return;
        }
        if self.assessor_notes.is_empty() {
            self.assessor_notes = notes.to_string();
        } else {
            self.assessor_notes = format!("{}\n{}", self.assessor_notes, notes);
        }
    }
}

fn check_amount(amount: &Money, coverage: &Money) -> Result<(), ClaimError> {
    if amount.is_negative() {
        return Err(ClaimError::Validation("Claim amount cannot be negative".into()));
    }
    if amount.amount() > coverage.amount() {
        return Err(ClaimError::ExceedsCoverage);
    }
    Ok(())
}
