//! Billing domain errors

use thiserror::Error;

use core_kernel::{CalendarError, MoneyError};

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Status change not allowed
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    /// Gateway actions need a pending transaction
    #[error("Transaction is not pending (status: {0})")]
    NotPending(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    /// Only completed payments can be refunded
    #[error("Only completed transactions can be refunded (status: {0})")]
    NotRefundable(String),

    #[error("A refund already exists for this transaction")]
    RefundExists,

    #[error("Refund amount cannot exceed transaction amount")]
    RefundExceedsPayment,

    #[error("Receipts are only available for completed transactions")]
    ReceiptUnavailable,

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Calculation error
    #[error("Calculation error: {0}")]
    Calculation(#[from] MoneyError),

    #[error("Date error: {0}")]
    Calendar(#[from] CalendarError),
}
