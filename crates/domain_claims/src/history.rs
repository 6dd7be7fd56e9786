//! Claim status audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use core_kernel::{ClaimId, UserId};

use crate::claim::ClaimStatus;

/// One row of a claim's status history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub id: Uuid,
    pub claim_id: ClaimId,
    /// `None` only for the opening entry
    pub from_status: Option<ClaimStatus>,
    pub to_status: ClaimStatus,
    pub notes: String,
    pub changed_by: Option<UserId>,
    pub changed_at: DateTime<Utc>,
}

impl StatusChange {
    pub fn new(
        claim_id: ClaimId,
        from_status: Option<ClaimStatus>,
        to_status: ClaimStatus,
        notes: impl Into<String>,
        changed_by: Option<UserId>,
        changed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            claim_id,
            from_status,
            to_status,
            notes: notes.into(),
            changed_by,
            changed_at,
        }
    }

    /// Entry written when the customer files the claim
    pub fn opening(claim_id: ClaimId, claimant: UserId, at: DateTime<Utc>) -> Self {
        Self::new(
            claim_id,
            None,
            ClaimStatus::Submitted,
            "Claim submitted by customer",
            Some(claimant),
            at,
        )
    }
}
