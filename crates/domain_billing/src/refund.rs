//! Refunds of completed payments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{calendar, reference, Money, RefundId, ReferenceKind, TransactionId, UserId};

use crate::error::BillingError;
use crate::transaction::{Transaction, TransactionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    PolicyCancellation,
    Overpayment,
    DuplicatePayment,
    Other,
}

impl RefundReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundReason::PolicyCancellation => "policy_cancellation",
            RefundReason::Overpayment => "overpayment",
            RefundReason::DuplicatePayment => "duplicate_payment",
            RefundReason::Other => "other",
        }
    }
}

impl FromStr for RefundReason {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "policy_cancellation" => Ok(RefundReason::PolicyCancellation),
            "overpayment" => Ok(RefundReason::Overpayment),
            "duplicate_payment" => Ok(RefundReason::DuplicatePayment),
            "other" => Ok(RefundReason::Other),
            other => Err(BillingError::Validation(format!("Unknown refund reason: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Processing => "processing",
            RefundStatus::Completed => "completed",
            RefundStatus::Failed => "failed",
        }
    }

    /// A refund in one of these states blocks another for the same payment
    pub fn is_live(&self) -> bool {
        matches!(self, RefundStatus::Pending | RefundStatus::Processing | RefundStatus::Completed)
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefundStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RefundStatus::Pending),
            "processing" => Ok(RefundStatus::Processing),
            "completed" => Ok(RefundStatus::Completed),
            "failed" => Ok(RefundStatus::Failed),
            other => Err(BillingError::Validation(format!("Unknown refund status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    pub transaction_id: TransactionId,
    pub refund_number: String,
    pub amount: Money,
    pub reason: RefundReason,
    pub reason_description: String,
    pub status: RefundStatus,
    pub processed_by: Option<UserId>,
    pub refund_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Refund {
    /// Opens a refund request against a completed transaction
    ///
    /// `existing` are the refunds already recorded for that transaction.
    pub fn request(
        transaction: &Transaction,
        amount: Money,
        reason: RefundReason,
        reason_description: impl Into<String>,
        existing: &[Refund],
    ) -> Result<Self, BillingError> {
        if transaction.status != TransactionStatus::Completed {
            return Err(BillingError::NotRefundable(transaction.status.to_string()));
        }
        if existing.iter().any(|r| r.status.is_live()) {
            return Err(BillingError::RefundExists);
        }
        if !amount.is_positive() {
            return Err(BillingError::Validation("Refund amount must be greater than zero".into()));
        }
        if amount.amount() > transaction.amount.amount() {
            return Err(BillingError::RefundExceedsPayment);
        }
        let now = Utc::now();
        Ok(Self {
            id: RefundId::new_v7(),
            transaction_id: transaction.id,
            refund_number: reference::generate(ReferenceKind::Refund, calendar::year_of(now)),
            amount: amount.round_to_currency(),
            reason,
            reason_description: reason_description.into(),
            status: RefundStatus::Pending,
            processed_by: None,
            refund_reference: None,
            failure_reason: None,
            created_at: now,
            processed_at: None,
        })
    }

    fn ensure_pending(&self) -> Result<(), BillingError> {
        if !matches!(self.status, RefundStatus::Pending | RefundStatus::Processing) {
            return Err(BillingError::InvalidOperation(format!("Refund is already {}", self.status)));
        }
        Ok(())
    }

    /// Takes a pending refund of `transaction` into processing
    ///
    /// Runs before any money is returned, so a refund that is already
    /// decided, or a payment that is no longer completed, never reaches
    /// the gateway.
    pub fn begin(&mut self, transaction: &Transaction) -> Result<(), BillingError> {
        if self.status != RefundStatus::Pending {
            return Err(BillingError::InvalidOperation(format!("Refund is already {}", self.status)));
        }
        if transaction.id != self.transaction_id {
            return Err(BillingError::Validation("Refund belongs to another transaction".into()));
        }
        if transaction.status != TransactionStatus::Completed {
            return Err(BillingError::NotRefundable(transaction.status.to_string()));
        }
        self.status = RefundStatus::Processing;
        Ok(())
    }

    /// Back to the queue after the gateway refused the refund
    pub fn reopen(&mut self) {
        if self.status == RefundStatus::Processing {
            self.status = RefundStatus::Pending;
        }
    }

    pub fn complete(&mut self, refund_reference: Option<String>, by: UserId) -> Result<(), BillingError> {
        self.ensure_pending()?;
        self.status = RefundStatus::Completed;
        self.refund_reference = refund_reference;
        self.processed_by = Some(by);
        self.processed_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>, by: UserId) -> Result<(), BillingError> {
        self.ensure_pending()?;
        self.status = RefundStatus::Failed;
        self.failure_reason = Some(reason.into());
        self.processed_by = Some(by);
        self.processed_at = Some(Utc::now());
        Ok(())
    }
}
