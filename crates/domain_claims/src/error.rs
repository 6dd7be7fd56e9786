//! Claims domain errors

use thiserror::Error;

/// Errors that can occur in the claims domain
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClaimError {
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("You can only file claims against your own policies")]
    NotPolicyHolder,

    #[error("Claims can only be filed against active policies")]
    PolicyNotActive,

    #[error("Incident date is outside the policy period")]
    CoverageNotInForce,

    #[error("Claim amount cannot exceed policy coverage")]
    ExceedsCoverage,

    #[error("Approved amount cannot exceed claimed amount")]
    ApprovedExceedsClaimed,

    #[error("Settlement amount cannot exceed approved amount")]
    SettlementExceedsApproved,

    #[error("Only approved claims can be settled")]
    NotApproved,

    #[error("Claim already has a settlement")]
    AlreadySettled,

    #[error("Claim can no longer be edited in status {0}")]
    NotEditable(String),

    #[error("Status {0} can only be set by its own claim action")]
    RequiresAction(String),

    #[error("Claim already closed")]
    ClaimClosed,

    #[error("Validation error: {0}")]
    Validation(String),
}
