//! Policy domain errors
//!
//! This module defines all error types that can occur within the
//! catalog, policy lifecycle, reviews and workflow stages.

use thiserror::Error;

use core_kernel::{CalendarError, MoneyError};

/// Errors that can occur in the policy domain
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Invalid state transition attempted
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        from: String,
        to: String,
    },

    /// Policy type is not published or not active
    #[error("Policy type is not available for purchase: {0}")]
    NotPurchasable(String),

    #[error("Policy is already cancelled")]
    AlreadyCancelled,

    #[error("Cannot cancel an expired policy")]
    AlreadyExpired,

    /// Only active or expired policies renew
    #[error("Policy cannot be renewed from status {0}")]
    NotRenewable(String),

    /// A user reviews a policy at most once
    #[error("You have already reviewed this policy")]
    DuplicateReview,

    /// Workflow stage action not allowed in the stage's current status
    #[error("Workflow stage error: {0}")]
    Stage(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Financial calculation error
    #[error("Financial error: {0}")]
    Financial(#[from] MoneyError),

    /// Date arithmetic error
    #[error("Date error: {0}")]
    Calendar(#[from] CalendarError),
}

impl PolicyError {
    /// Creates a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PolicyError::Validation(message.into())
    }

    /// Creates a workflow stage error
    pub fn stage(message: impl Into<String>) -> Self {
        PolicyError::Stage(message.into())
    }
}
