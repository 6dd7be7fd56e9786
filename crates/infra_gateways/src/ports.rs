//! Gateway traits the API layer depends on

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::mpesa::{StkPushRequest, StkPushResponse, StkQueryResult};
use crate::paystack::{CardCheckout, CardRefund, CardVerification, CheckoutRequest};
use core_kernel::Money;

#[async_trait]
pub trait MpesaGateway: Send + Sync {
    /// Sends the payment prompt to the payer's phone
    async fn stk_push(&self, request: StkPushRequest) -> Result<StkPushResponse, GatewayError>;

    /// Asks Daraja how an earlier prompt ended
    async fn stk_query(&self, checkout_request_id: &str) -> Result<StkQueryResult, GatewayError>;
}

#[async_trait]
pub trait CardGateway: Send + Sync {
    async fn initialize(&self, request: CheckoutRequest) -> Result<CardCheckout, GatewayError>;

    async fn verify(&self, reference: &str) -> Result<CardVerification, GatewayError>;

    /// Refunds `amount` of the payment, or all of it when `None`
    async fn refund(&self, reference: &str, amount: Option<Money>) -> Result<CardRefund, GatewayError>;
}
