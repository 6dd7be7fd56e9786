//! Paystack card payments

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::Sha512;
use std::fmt;
use tracing::{debug, info, warn};

use core_kernel::{Currency, Money};

use crate::error::GatewayError;
use crate::ports::CardGateway;

const GATEWAY: &str = "Paystack";
const DEFAULT_URL: &str = "https://api.paystack.co";
const TIMEOUT_SECS: u64 = 30;

type HmacSha512 = Hmac<Sha512>;

#[derive(Clone, Default, Deserialize)]
pub struct PaystackConfig {
    pub secret_key: String,
    pub api_url: Option<String>,
}

impl PaystackConfig {
    pub fn base_url(&self) -> String {
        self.api_url
            .as_deref()
            .unwrap_or(DEFAULT_URL)
            .trim_end_matches('/')
            .to_string()
    }
}

impl fmt::Debug for PaystackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaystackConfig")
            .field("api_url", &self.base_url())
            .finish_non_exhaustive()
    }
}

/// Hex HMAC-SHA512 of a webhook body, as sent in `X-Paystack-Signature`
pub fn sign_webhook_body(secret: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks `X-Paystack-Signature` against the raw body in constant time
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub email: String,
    pub amount: Money,
    /// Our transaction number
    pub reference: String,
    pub callback_url: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardCheckout {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardVerification {
    /// Paystack reports the charge as `success`
    pub verified: bool,
    pub status: String,
    pub amount: Money,
    pub reference: String,
    pub paid_at: Option<String>,
    pub channel: Option<String>,
    pub gateway_response: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardRefund {
    pub status: String,
    pub amount: Money,
    pub reference: Option<String>,
}

/// Paystack's `{status, message, data}` envelope
#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

impl Envelope {
    fn into_data(self, fallback: &str) -> Result<Value, GatewayError> {
        match (self.status, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(GatewayError::Rejected {
                gateway: GATEWAY,
                message: self.message.unwrap_or_else(|| fallback.to_string()),
            }),
        }
    }
}

fn str_field(data: &Value, name: &str) -> Option<String> {
    match data.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn minor_amount(data: &Value) -> Money {
    let minor = data.get("amount").and_then(Value::as_i64).unwrap_or(0);
    Money::from_minor(minor, Currency::KES)
}

pub struct PaystackClient {
    config: PaystackConfig,
    base_url: String,
    client: Client,
}

impl PaystackClient {
    pub fn new(config: PaystackConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(TIMEOUT_SECS))
            .build()?;
        Ok(Self { base_url: config.base_url(), config, client })
    }

    pub fn webhook_secret(&self) -> &str {
        &self.config.secret_key
    }

    fn ensure_configured(&self) -> Result<(), GatewayError> {
        if self.config.secret_key.is_empty() {
            return Err(GatewayError::NotConfigured(GATEWAY));
        }
        Ok(())
    }

    /// Error statuses still carry the envelope, with `status: false`
    async fn read(response: reqwest::Response) -> Result<Envelope, GatewayError> {
        let status = response.status();
        let mut envelope: Envelope = response.json().await.map_err(|e| GatewayError::decode(GATEWAY, e))?;
        if !status.is_success() {
            envelope.status = false;
        }
        Ok(envelope)
    }
}

#[async_trait]
impl CardGateway for PaystackClient {
    async fn initialize(&self, request: CheckoutRequest) -> Result<CardCheckout, GatewayError> {
        self.ensure_configured()?;
        let mut payload = json!({
            "email": request.email,
            "amount": request.amount.to_minor()?,
            "reference": request.reference,
            "currency": request.amount.currency().code(),
        });
        if let Some(url) = &request.callback_url {
            payload["callback_url"] = json!(url);
        }
        if let Some(metadata) = request.metadata {
            payload["metadata"] = Value::Object(metadata);
        }

        let url = format!("{}/transaction/initialize", self.base_url);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .json(&payload)
            .send()
            .await?;
        let data = Self::read(response).await?.into_data("Failed to initialize transaction")?;

        let checkout = CardCheckout {
            authorization_url: str_field(&data, "authorization_url").unwrap_or_default(),
            access_code: str_field(&data, "access_code").unwrap_or_default(),
            reference: str_field(&data, "reference").unwrap_or(request.reference),
        };
        info!(reference = %checkout.reference, "Card checkout initialized");
        Ok(checkout)
    }

    async fn verify(&self, reference: &str) -> Result<CardVerification, GatewayError> {
        self.ensure_configured()?;
        let url = format!("{}/transaction/verify/{}", self.base_url, reference);
        debug!("GET {}", url);
        let response = self.client.get(&url).bearer_auth(&self.config.secret_key).send().await?;
        let data = Self::read(response).await?.into_data("Verification failed")?;

        let status = str_field(&data, "status").unwrap_or_default();
        Ok(CardVerification {
            verified: status == "success",
            amount: minor_amount(&data),
            reference: str_field(&data, "reference").unwrap_or_else(|| reference.to_string()),
            paid_at: str_field(&data, "paid_at"),
            channel: str_field(&data, "channel"),
            gateway_response: str_field(&data, "gateway_response"),
            status,
        })
    }

    async fn refund(&self, reference: &str, amount: Option<Money>) -> Result<CardRefund, GatewayError> {
        self.ensure_configured()?;
        let mut payload = json!({ "transaction": reference, "currency": Currency::KES.code() });
        if let Some(amount) = amount {
            payload["amount"] = json!(amount.to_minor()?);
        }

        let url = format!("{}/refund", self.base_url);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.secret_key)
            .json(&payload)
            .send()
            .await?;
        let data = match Self::read(response).await?.into_data("Refund failed") {
            Ok(data) => data,
            Err(err) => {
                warn!(%reference, error = %err, "Paystack refund rejected");
                return Err(err);
            }
        };

        Ok(CardRefund {
            status: str_field(&data, "status").unwrap_or_default(),
            amount: minor_amount(&data),
            reference: str_field(&data, "id"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaystackEventKind {
    ChargeSuccess,
    ChargeFailed,
    Other(String),
}

/// A parsed webhook delivery
#[derive(Debug, Clone, PartialEq)]
pub struct PaystackEvent {
    pub kind: PaystackEventKind,
    pub reference: Option<String>,
    pub status: Option<String>,
    pub amount: Money,
    pub gateway_response: Option<String>,
    pub channel: Option<String>,
    pub paid_at: Option<String>,
    pub customer_email: Option<String>,
}

impl PaystackEvent {
    pub fn parse(body: &[u8]) -> Result<Self, GatewayError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| GatewayError::decode(GATEWAY, e))?;
        let event = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::decode(GATEWAY, "missing event"))?;
        let data = value.get("data").cloned().unwrap_or(Value::Null);

        let kind = match event {
            "charge.success" => PaystackEventKind::ChargeSuccess,
            "charge.failed" => PaystackEventKind::ChargeFailed,
            other => PaystackEventKind::Other(other.to_string()),
        };
        Ok(PaystackEvent {
            kind,
            reference: str_field(&data, "reference"),
            status: str_field(&data, "status"),
            amount: minor_amount(&data),
            gateway_response: str_field(&data, "gateway_response"),
            channel: str_field(&data, "channel"),
            paid_at: str_field(&data, "paid_at"),
            customer_email: data.get("customer").and_then(|c| str_field(c, "email")),
        })
    }

    pub fn metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (key, value) in [
            ("channel", &self.channel),
            ("paid_at", &self.paid_at),
            ("customer_email", &self.customer_email),
        ] {
            if let Some(v) = value {
                map.insert(key.to_string(), json!(v));
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"event":"charge.success"}"#;
        let signature = sign_webhook_body("sk_test_x", body);
        assert_eq!(signature.len(), 128);
        assert!(verify_webhook_signature("sk_test_x", body, &signature));
        assert!(!verify_webhook_signature("sk_test_y", body, &signature));
        assert!(!verify_webhook_signature("sk_test_x", b"{}", &signature));
        assert!(!verify_webhook_signature("sk_test_x", body, "not-hex"));
        assert!(!verify_webhook_signature("", body, &signature));
    }

    #[test]
    fn test_parse_charge_failed() {
        let body = br#"{"event":"charge.failed","data":{"reference":"TXN-2024-00000001","status":"failed","amount":150000,"gateway_response":"Declined","customer":{"email":"a@b.co"}}}"#;
        let event = PaystackEvent::parse(body).unwrap();
        assert_eq!(event.kind, PaystackEventKind::ChargeFailed);
        assert_eq!(event.reference.as_deref(), Some("TXN-2024-00000001"));
        assert_eq!(event.amount, Money::from_minor(150000, Currency::KES));
        assert_eq!(event.gateway_response.as_deref(), Some("Declined"));
        assert_eq!(event.customer_email.as_deref(), Some("a@b.co"));
    }

    #[test]
    fn test_unknown_event_kept() {
        let event = PaystackEvent::parse(br#"{"event":"transfer.success","data":{}}"#).unwrap();
        assert_eq!(event.kind, PaystackEventKind::Other("transfer.success".into()));
        assert!(PaystackEvent::parse(b"{}").is_err());
    }
}
