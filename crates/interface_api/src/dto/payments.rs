//! Payment, refund and webhook DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{Money, PolicyId, UserId};
use domain_billing::{PaymentIntent, PaymentMethod, RefundReason, Refund, Transaction, TransactionStatus};
use infra_db::TransactionFilter;

#[derive(Debug, Deserialize, Validate)]
pub struct InitiateRequest {
    pub policy_id: Option<Uuid>,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub phone_number: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub description: String,
}

impl From<InitiateRequest> for PaymentIntent {
    fn from(input: InitiateRequest) -> Self {
        PaymentIntent {
            policy_id: input.policy_id.map(PolicyId::from_uuid),
            amount: Money::kes(input.amount),
            method: input.payment_method,
            phone_number: input.phone_number,
            description: input.description,
        }
    }
}

/// Creates (or reuses) a transaction and sends an STK push for it
#[derive(Debug, Deserialize)]
pub struct MpesaInitiateRequest {
    /// Existing pending transaction; a new one is created from the other fields otherwise
    pub transaction_id: Option<Uuid>,
    pub policy_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    pub phone_number: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct MpesaInitiateResponse {
    pub transaction: Transaction,
    pub checkout_request_id: String,
    pub customer_message: String,
}

#[derive(Debug, Serialize)]
pub struct MpesaStatusResponse {
    pub transaction: Transaction,
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaystackInitializeRequest {
    pub transaction_id: Option<Uuid>,
    pub policy_id: Option<Uuid>,
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub description: String,
    /// Overrides the configured return URL
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaystackInitializeResponse {
    pub transaction: Transaction,
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionQuery {
    pub status: Option<TransactionStatus>,
    #[serde(rename = "payment_method")]
    pub method: Option<PaymentMethod>,
    pub policy: Option<Uuid>,
    pub search: Option<String>,
}

impl TransactionQuery {
    pub fn into_filter(self, user: Option<UserId>) -> TransactionFilter {
        TransactionFilter {
            user,
            status: self.status,
            method: self.method,
            policy: self.policy.map(PolicyId::from_uuid),
            search: self.search.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RefundInput {
    pub transaction_id: Uuid,
    pub amount: Decimal,
    pub reason: RefundReason,
    #[serde(default)]
    pub reason_description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundAction {
    Complete,
    Fail,
}

#[derive(Debug, Deserialize)]
pub struct ProcessRefundRequest {
    pub action: RefundAction,
    /// Reference for refunds paid outside Paystack
    pub refund_reference: Option<String>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionDetail {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub refunds: Vec<Refund>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub secret: Option<String>,
}

/// Daraja expects this exact shape in reply to a callback
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CallbackAck {
    pub result_code: i32,
    pub result_desc: String,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self { result_code: 0, result_desc: "Success".to_string() }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self { result_code: 1, result_desc: reason.into() }
    }
}
