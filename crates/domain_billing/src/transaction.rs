//! Payment transactions
//!
//! One `Transaction` per attempt to collect money from a customer. The
//! gateway-specific references are filled in as the payment progresses.
//!
//! ```text
//! pending -> processing -> completed -> refunded
//!    |            \-> failed
//!    \-> completed | failed | cancelled
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use core_kernel::{calendar, reference, Currency, Money, PolicyId, ReferenceKind, TransactionId, UserId};

use crate::error::BillingError;
use crate::phone;

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// M-Pesa STK push
    Mpesa,
    /// Card via Paystack
    Card,
    BankTransfer,
    Cash,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Mpesa,
        PaymentMethod::Card,
        PaymentMethod::BankTransfer,
        PaymentMethod::Cash,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Mpesa => "mpesa",
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Cash => "cash",
        }
    }

    /// Label printed on receipts
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Mpesa => "M-Pesa",
            PaymentMethod::Card => "Card Payment",
            PaymentMethod::BankTransfer => "Bank Transfer",
            PaymentMethod::Cash => "Cash",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| BillingError::Validation(format!("Unknown payment method: {}", s)))
    }
}

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 6] = [
        TransactionStatus::Pending,
        TransactionStatus::Processing,
        TransactionStatus::Completed,
        TransactionStatus::Failed,
        TransactionStatus::Refunded,
        TransactionStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Refunded => "refunded",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, target: TransactionStatus) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, target),
            (Pending, Processing) |
            (Pending, Completed) |
            (Pending, Failed) |
            (Pending, Cancelled) |
            (Processing, Completed) |
            (Processing, Failed) |
            (Completed, Refunded)
        )
    }

    /// Still waiting on the gateway
    pub fn is_open(&self) -> bool {
        matches!(self, TransactionStatus::Pending | TransactionStatus::Processing)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| BillingError::Validation(format!("Unknown transaction status: {}", s)))
    }
}

/// Request to start a payment
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub policy_id: Option<PolicyId>,
    pub amount: Money,
    pub method: PaymentMethod,
    pub phone_number: Option<String>,
    pub description: String,
}

/// What the gateway told us when the payment succeeded
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub mpesa_receipt: Option<String>,
    pub paystack_reference: Option<String>,
    pub gateway_reference: Option<String>,
    /// Merged into the transaction metadata
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub transaction_number: String,
    pub user_id: UserId,
    pub policy_id: Option<PolicyId>,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    pub description: String,
    pub phone_number: Option<String>,
    pub gateway_reference: Option<String>,
    pub mpesa_receipt: Option<String>,
    pub paystack_reference: Option<String>,
    pub reference_number: String,
    pub metadata: Value,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Creates a pending transaction for `payer`
    pub fn initiate(payer: UserId, intent: PaymentIntent) -> Result<Self, BillingError> {
        if !intent.amount.is_positive() {
            return Err(BillingError::Validation("Amount must be greater than zero".into()));
        }
        if intent.amount.currency() != Currency::KES {
            return Err(BillingError::Validation("Payments are collected in KES".into()));
        }
        let phone_number = match intent.method {
            PaymentMethod::Mpesa => {
                let phone = intent
                    .phone_number
                    .as_deref()
                    .ok_or_else(|| BillingError::Validation("Phone number is required for M-Pesa payments".into()))?;
                if !phone::is_valid_payer_phone(phone) {
                    return Err(BillingError::InvalidPhone(phone.to_string()));
                }
                Some(phone.trim().to_string())
            }
            _ => intent.phone_number.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
        };

        let now = Utc::now();
        let number = reference::generate(ReferenceKind::Transaction, calendar::year_of(now));
        Ok(Self {
            id: TransactionId::new_v7(),
            reference_number: number.clone(),
            transaction_number: number,
            user_id: payer,
            policy_id: intent.policy_id,
            amount: intent.amount.round_to_currency(),
            payment_method: intent.method,
            status: TransactionStatus::Pending,
            description: intent.description,
            phone_number,
            gateway_reference: None,
            mpesa_receipt: None,
            paystack_reference: None,
            metadata: Value::Object(Map::new()),
            failure_reason: None,
            created_at: now,
            updated_at: now,
            processed_at: None,
            completed_at: None,
        })
    }

    fn move_to(&mut self, target: TransactionStatus) -> Result<(), BillingError> {
        if !self.status.can_transition_to(target) {
            return Err(BillingError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Only pending transactions can be sent to a gateway
    pub fn ensure_pending(&self) -> Result<(), BillingError> {
        if self.status != TransactionStatus::Pending {
            return Err(BillingError::NotPending(self.status.to_string()));
        }
        Ok(())
    }

    /// The gateway accepted the request and we now wait for the callback
    pub fn mark_processing(&mut self, gateway_reference: impl Into<String>) -> Result<(), BillingError> {
        self.move_to(TransactionStatus::Processing)?;
        self.gateway_reference = Some(gateway_reference.into());
        self.processed_at = Some(self.updated_at);
        Ok(())
    }

    /// Completes the payment
    ///
    /// Returns `Ok(false)` when the transaction was already completed, so a
    /// redelivered webhook changes nothing.
    pub fn complete(&mut self, completion: Completion) -> Result<bool, BillingError> {
        if self.status == TransactionStatus::Completed {
            return Ok(false);
        }
        self.move_to(TransactionStatus::Completed)?;
        self.apply_completion(completion);
        Ok(true)
    }

    /// Completes a payment the gateway itself reports as settled
    ///
    /// Unlike [`complete`](Self::complete) this also revives a `failed`
    /// transaction: a card charge can succeed after an early verification
    /// saw it still in progress and failed it locally.
    pub fn complete_from_gateway(&mut self, completion: Completion) -> Result<bool, BillingError> {
        if self.status != TransactionStatus::Failed {
            return self.complete(completion);
        }
        self.status = TransactionStatus::Completed;
        self.updated_at = Utc::now();
        self.failure_reason = None;
        self.apply_completion(completion);
        Ok(true)
    }

    fn apply_completion(&mut self, completion: Completion) {
        let now = self.updated_at;
        self.completed_at = Some(now);
        self.processed_at.get_or_insert(now);
        if completion.mpesa_receipt.is_some() {
            self.mpesa_receipt = completion.mpesa_receipt;
        }
        if completion.paystack_reference.is_some() {
            self.paystack_reference = completion.paystack_reference;
        }
        if completion.gateway_reference.is_some() {
            self.gateway_reference = completion.gateway_reference;
        }
        self.merge_metadata(completion.metadata);
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), BillingError> {
        self.move_to(TransactionStatus::Failed)?;
        self.failure_reason = Some(reason.into());
        self.processed_at = Some(self.updated_at);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), BillingError> {
        self.move_to(TransactionStatus::Cancelled)
    }

    pub fn mark_refunded(&mut self) -> Result<(), BillingError> {
        self.move_to(TransactionStatus::Refunded)
    }

    pub fn merge_metadata(&mut self, extra: Map<String, Value>) {
        if extra.is_empty() {
            return;
        }
        match &mut self.metadata {
            Value::Object(map) => map.extend(extra),
            other => *other = Value::Object(extra),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn intent(method: PaymentMethod, phone: Option<&str>) -> PaymentIntent {
        PaymentIntent {
            policy_id: Some(PolicyId::new()),
            amount: Money::kes(dec!(2500)),
            method,
            phone_number: phone.map(String::from),
            description: "Premium".into(),
        }
    }

    #[test]
    fn test_mpesa_requires_valid_phone() {
        assert!(Transaction::initiate(UserId::new(), intent(PaymentMethod::Mpesa, None)).is_err());
        assert!(Transaction::initiate(UserId::new(), intent(PaymentMethod::Mpesa, Some("12345"))).is_err());
        assert!(Transaction::initiate(UserId::new(), intent(PaymentMethod::Mpesa, Some("+254712345678"))).is_ok());
    }

    #[test]
    fn test_complete_is_idempotent() {
        let mut txn = Transaction::initiate(UserId::new(), intent(PaymentMethod::Card, None)).unwrap();
        assert!(txn.complete(Completion::default()).unwrap());
        let completed_at = txn.completed_at;
        assert!(!txn.complete(Completion::default()).unwrap());
        assert_eq!(txn.completed_at, completed_at);
    }

    #[test]
    fn test_failed_transaction_cannot_complete() {
        let mut txn = Transaction::initiate(UserId::new(), intent(PaymentMethod::Card, None)).unwrap();
        txn.fail("Declined").unwrap();
        assert!(txn.complete(Completion::default()).is_err());
    }
}
