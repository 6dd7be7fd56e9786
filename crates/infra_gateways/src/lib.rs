//! Payment gateway adapters
//!
//! Thin HTTP clients for the two ways customers pay:
//! - M-Pesa Daraja STK Push (mobile money prompt on the payer's phone)
//! - Paystack card checkout
//!
//! Handlers depend on the [`MpesaGateway`] and [`CardGateway`] traits so
//! tests can substitute canned gateways. Inbound notification parsing and
//! authentication (callback secret, webhook HMAC) live here as well.

pub mod error;
pub mod mpesa;
pub mod paystack;
pub mod ports;

pub use error::GatewayError;
pub use mpesa::{
    normalize_phone, verify_callback_secret, MpesaClient, MpesaConfig, MpesaEnvironment,
    StkCallback, StkPushRequest, StkPushResponse, StkQueryResult,
};
pub use paystack::{
    sign_webhook_body, verify_webhook_signature, CardCheckout, CardRefund, CardVerification,
    CheckoutRequest, PaystackClient, PaystackConfig, PaystackEvent, PaystackEventKind,
};
pub use ports::{CardGateway, MpesaGateway};
