//! M-Pesa Daraja client
//!
//! STK Push sends a payment prompt to the customer's phone; the outcome
//! arrives later on our callback URL, or can be polled with a status query.
//! Daraja wants an OAuth token (HTTP Basic with the consumer key and
//! secret) on every call, and a password derived from the shortcode,
//! passkey and a timestamp.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use core_kernel::{Money, BUSINESS_TZ};

use crate::error::GatewayError;
use crate::ports::MpesaGateway;

const GATEWAY: &str = "M-Pesa";
const SANDBOX_URL: &str = "https://sandbox.safaricom.co.ke";
const PRODUCTION_URL: &str = "https://api.safaricom.co.ke";
const TIMEOUT_SECS: u64 = 30;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MpesaEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            MpesaEnvironment::Sandbox => SANDBOX_URL,
            MpesaEnvironment::Production => PRODUCTION_URL,
        }
    }
}

impl FromStr for MpesaEnvironment {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sandbox" => Ok(MpesaEnvironment::Sandbox),
            "production" => Ok(MpesaEnvironment::Production),
            _ => Err(GatewayError::NotConfigured("M-Pesa environment")),
        }
    }
}

#[derive(Clone, Default, Deserialize)]
pub struct MpesaConfig {
    pub environment: MpesaEnvironment,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub shortcode: String,
    pub passkey: String,
    pub callback_url: String,
    /// Shared secret Daraja echoes back in the callback query string
    pub callback_secret: Option<String>,
    /// Replaces the environment's base URL (local mocks)
    pub api_url: Option<String>,
}

impl MpesaConfig {
    pub fn base_url(&self) -> String {
        self.api_url
            .as_deref()
            .unwrap_or(self.environment.base_url())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn is_configured(&self) -> bool {
        !self.consumer_key.is_empty() && !self.consumer_secret.is_empty() && !self.shortcode.is_empty()
    }

    /// `base64(shortcode + passkey + timestamp)`
    pub fn password(&self, timestamp: &str) -> String {
        STANDARD.encode(format!("{}{}{}", self.shortcode, self.passkey, timestamp))
    }
}

impl fmt::Debug for MpesaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpesaConfig")
            .field("environment", &self.environment)
            .field("shortcode", &self.shortcode)
            .field("callback_url", &self.callback_url)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

/// Converts Kenyan phone numbers to the `254XXXXXXXXX` form Daraja expects
///
/// Spaces, dashes and `+` are dropped; a leading `0`, `7` or `1` gets the
/// country code, as does anything else not already carrying it.
pub fn normalize_phone(phone: &str) -> Result<String, GatewayError> {
    let digits: String = phone.chars().filter(|c| !matches!(c, ' ' | '-' | '+')).collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(GatewayError::InvalidPhone(phone.to_string()));
    }
    let normalized = if let Some(rest) = digits.strip_prefix('0') {
        format!("254{}", rest)
    } else if digits.starts_with('7') || digits.starts_with('1') || !digits.starts_with("254") {
        format!("254{}", digits)
    } else {
        digits
    };
    Ok(normalized)
}

/// Compares the secret presented on a callback with the configured one
///
/// Both sides go through HMAC-SHA256 keyed with the configured secret and
/// the tags are checked with `verify_slice`, which compares in constant
/// time. A missing configured secret rejects every callback.
pub fn verify_callback_secret(configured: Option<&str>, presented: Option<&str>) -> bool {
    let (Some(expected), Some(given)) = (configured, presented) else {
        return false;
    };
    if expected.is_empty() {
        return false;
    }
    let Ok(mut reference) = HmacSha256::new_from_slice(expected.as_bytes()) else {
        return false;
    };
    reference.update(expected.as_bytes());
    let tag = reference.finalize().into_bytes();

    let Ok(mut candidate) = HmacSha256::new_from_slice(expected.as_bytes()) else {
        return false;
    };
    candidate.update(given.as_bytes());
    candidate.verify_slice(&tag).is_ok()
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.with_timezone(&BUSINESS_TZ).format("%Y%m%d%H%M%S").to_string()
}

/// A payment prompt to send
#[derive(Debug, Clone)]
pub struct StkPushRequest {
    pub phone_number: String,
    pub amount: Money,
    /// Shown on the payer's statement; we use the transaction number
    pub account_reference: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StkPushResponse {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub customer_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StkQueryResult {
    pub result_code: Option<i64>,
    pub result_desc: Option<String>,
    pub raw: Value,
}

impl StkQueryResult {
    pub fn succeeded(&self) -> bool {
        self.result_code == Some(0)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<Value>,
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

pub struct MpesaClient {
    config: MpesaConfig,
    base_url: String,
    client: Client,
    token: RwLock<Option<CachedToken>>,
}

impl MpesaClient {
    pub fn new(config: MpesaConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            base_url: config.base_url(),
            config,
            client,
            token: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &MpesaConfig {
        &self.config
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.expires_at > Utc::now() {
                return Ok(cached.value.clone());
            }
        }
        if !self.config.is_configured() {
            return Err(GatewayError::NotConfigured(GATEWAY));
        }

        let url = format!("{}/oauth/v1/generate", self.base_url);
        debug!("GET {}", url);
        let response = self
            .client
            .get(&url)
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "M-Pesa token request failed");
            return Err(GatewayError::Authentication(GATEWAY));
        }
        let token: TokenResponse = response.json().await.map_err(|e| GatewayError::decode(GATEWAY, e))?;

        let lifetime = token
            .expires_in
            .as_ref()
            .and_then(value_as_i64)
            .unwrap_or(3599);
        // refresh a minute early
        let expires_at = Utc::now() + Duration::seconds((lifetime - 60).max(0));
        *self.token.write().await = Some(CachedToken { value: token.access_token.clone(), expires_at });
        Ok(token.access_token)
    }
}

#[async_trait]
impl MpesaGateway for MpesaClient {
    async fn stk_push(&self, request: StkPushRequest) -> Result<StkPushResponse, GatewayError> {
        let token = self.access_token().await?;
        let phone = normalize_phone(&request.phone_number)?;
        let stamp = timestamp(Utc::now());

        let payload = json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": self.config.password(&stamp),
            "Timestamp": stamp,
            "TransactionType": "CustomerPayBillOnline",
            "Amount": request.amount.whole_units()?,
            "PartyA": phone,
            "PartyB": self.config.shortcode,
            "PhoneNumber": phone,
            "CallBackURL": self.config.callback_url,
            "AccountReference": request.account_reference,
            "TransactionDesc": request.description,
        });

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.base_url);
        debug!("POST {}", url);
        let response = self.client.post(&url).bearer_auth(token).json(&payload).send().await?;
        let status = response.status();
        let body: Value = response.json().await.map_err(|e| GatewayError::decode(GATEWAY, e))?;

        if status != StatusCode::OK || body.get("ResponseCode").and_then(Value::as_str) != Some("0") {
            let message = body
                .get("errorMessage")
                .or_else(|| body.get("ResponseDescription"))
                .and_then(Value::as_str)
                .unwrap_or("Failed to initiate payment")
                .to_string();
            warn!(%status, %message, reference = %request.account_reference, "STK push rejected");
            return Err(GatewayError::Rejected { gateway: GATEWAY, message });
        }

        let field = |name: &str| body.get(name).and_then(Value::as_str).unwrap_or_default().to_string();
        let response = StkPushResponse {
            merchant_request_id: field("MerchantRequestID"),
            checkout_request_id: field("CheckoutRequestID"),
            customer_message: body
                .get("CustomerMessage")
                .and_then(Value::as_str)
                .unwrap_or("Payment request sent")
                .to_string(),
        };
        if response.checkout_request_id.is_empty() {
            return Err(GatewayError::decode(GATEWAY, "missing CheckoutRequestID"));
        }
        info!(
            checkout_request_id = %response.checkout_request_id,
            reference = %request.account_reference,
            "STK push sent"
        );
        Ok(response)
    }

    async fn stk_query(&self, checkout_request_id: &str) -> Result<StkQueryResult, GatewayError> {
        let token = self.access_token().await?;
        let stamp = timestamp(Utc::now());
        let payload = json!({
            "BusinessShortCode": self.config.shortcode,
            "Password": self.config.password(&stamp),
            "Timestamp": stamp,
            "CheckoutRequestID": checkout_request_id,
        });

        let url = format!("{}/mpesa/stkpushquery/v1/query", self.base_url);
        debug!("POST {}", url);
        let response = self.client.post(&url).bearer_auth(token).json(&payload).send().await?;
        let status = response.status();
        let body: Value = response.json().await.map_err(|e| GatewayError::decode(GATEWAY, e))?;

        if status != StatusCode::OK {
            let message = body
                .get("errorMessage")
                .and_then(Value::as_str)
                .unwrap_or("Query failed")
                .to_string();
            return Err(GatewayError::Rejected { gateway: GATEWAY, message });
        }
        Ok(StkQueryResult {
            result_code: body.get("ResultCode").and_then(value_as_i64),
            result_desc: body.get("ResultDesc").and_then(Value::as_str).map(str::to_string),
            raw: body,
        })
    }
}

/// Daraja mixes numbers and numeric strings for the same fields
fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Deserialize)]
struct CallbackEnvelope {
    #[serde(rename = "Body")]
    body: CallbackBody,
}

#[derive(Deserialize)]
struct CallbackBody {
    #[serde(rename = "stkCallback")]
    stk_callback: RawStkCallback,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawStkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: String,
    result_code: Value,
    #[serde(default)]
    result_desc: String,
    #[serde(default)]
    callback_metadata: Option<RawMetadata>,
}

#[derive(Deserialize)]
struct RawMetadata {
    #[serde(rename = "Item", default)]
    item: Vec<RawItem>,
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value", default)]
    value: Option<Value>,
}

/// The outcome Daraja posts to our callback URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StkCallback {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub result_code: i64,
    pub result_desc: String,
    pub amount: Option<Decimal>,
    pub mpesa_receipt: Option<String>,
    pub transaction_date: Option<String>,
    pub phone_number: Option<String>,
}

impl StkCallback {
    /// Parses `Body.stkCallback`; metadata items are only read on success
    pub fn parse(payload: &Value) -> Result<Self, GatewayError> {
        let envelope = CallbackEnvelope::deserialize(payload).map_err(|e| GatewayError::decode(GATEWAY, e))?;
        let raw = envelope.body.stk_callback;
        let result_code = value_as_i64(&raw.result_code)
            .ok_or_else(|| GatewayError::decode(GATEWAY, "ResultCode is not a number"))?;

        let mut callback = StkCallback {
            merchant_request_id: raw.merchant_request_id,
            checkout_request_id: raw.checkout_request_id,
            result_code,
            result_desc: raw.result_desc,
            amount: None,
            mpesa_receipt: None,
            transaction_date: None,
            phone_number: None,
        };
        if result_code != 0 {
            return Ok(callback);
        }

        for item in raw.callback_metadata.map(|m| m.item).unwrap_or_default() {
            let Some(value) = item.value.as_ref().and_then(value_as_string) else {
                continue;
            };
            match item.name.as_str() {
                "Amount" => callback.amount = Decimal::from_str(&value).ok(),
                "MpesaReceiptNumber" => callback.mpesa_receipt = Some(value),
                "TransactionDate" => callback.transaction_date = Some(value),
                "PhoneNumber" => callback.phone_number = Some(value),
                _ => {}
            }
        }
        Ok(callback)
    }

    pub fn succeeded(&self) -> bool {
        self.result_code == 0
    }

    /// Gateway details kept on the transaction's metadata
    pub fn metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("merchant_request_id".into(), json!(self.merchant_request_id));
        if let Some(date) = &self.transaction_date {
            map.insert("transaction_date".into(), json!(date));
        }
        if let Some(phone) = &self.phone_number {
            map.insert("phone_number".into(), json!(phone));
        }
        if let Some(amount) = self.amount {
            map.insert("amount".into(), json!(amount.to_string()));
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_phone_formats() {
        assert_eq!(normalize_phone("0712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("712345678").unwrap(), "254712345678");
        assert_eq!(normalize_phone("110345678").unwrap(), "254110345678");
        assert_eq!(normalize_phone("+254 712-345-678").unwrap(), "254712345678");
        assert!(normalize_phone("07x2").is_err());
        assert!(normalize_phone(" - ").is_err());
    }

    #[test]
    fn test_password_is_base64_of_parts() {
        let config = MpesaConfig {
            shortcode: "174379".into(),
            passkey: "pk".into(),
            ..Default::default()
        };
        let decoded = STANDARD.decode(config.password("20240101120000")).unwrap();
        assert_eq!(decoded, b"174379pk20240101120000");
    }

    #[test]
    fn test_timestamp_uses_nairobi_time() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 21, 30, 5).unwrap();
        assert_eq!(timestamp(instant), "20240102003005");
    }

    #[test]
    fn test_callback_secret() {
        assert!(verify_callback_secret(Some("s3cret"), Some("s3cret")));
        assert!(!verify_callback_secret(Some("s3cret"), Some("s3cre")));
        assert!(!verify_callback_secret(Some("s3cret"), None));
        assert!(!verify_callback_secret(None, Some("anything")));
        assert!(!verify_callback_secret(Some(""), Some("")));
    }

    #[test]
    fn test_callback_secret_rejects_same_length_and_longer_guesses() {
        assert!(!verify_callback_secret(Some("s3cret"), Some("s3creT")));
        assert!(!verify_callback_secret(Some("s3cret"), Some("s3cret ")));
        assert!(!verify_callback_secret(Some("s3cret"), Some("")));
    }

    #[test]
    fn test_environment_urls() {
        let mut config = MpesaConfig::default();
        assert_eq!(config.base_url(), SANDBOX_URL);
        config.environment = "production".parse().unwrap();
        assert_eq!(config.base_url(), PRODUCTION_URL);
        config.api_url = Some("http://127.0.0.1:9000/".into());
        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = MpesaConfig {
            consumer_secret: "very-secret".into(),
            passkey: "passkey-value".into(),
            ..Default::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("very-secret"));
        assert!(!printed.contains("passkey-value"));
    }
}
