//! Gateway callbacks. These routes carry no bearer token; each request is
//! authenticated by a shared secret or an HMAC signature instead.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use domain_billing::Completion;
use infra_gateways::{verify_callback_secret, verify_webhook_signature, PaystackEvent, PaystackEventKind, StkCallback};

use crate::dto::payments::{CallbackAck, CallbackQuery};
use crate::dto::MessageResponse;
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::handlers::payments::{fail_payment, finish_payment, gateway_metadata};
use crate::middleware::ClientInfo;
use crate::AppState;

const SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Daraja STK push result
///
/// Always answers in Daraja's `{ResultCode, ResultDesc}` shape.
pub async fn mpesa_callback(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CallbackQuery>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<CallbackAck>), ApiError> {
    let configured = state.config.mpesa_callback_secret.as_deref().filter(|s| !s.is_empty());
    if !verify_callback_secret(configured, query.secret.as_deref()) {
        warn!("Rejected M-Pesa callback with a missing or wrong secret");
        return Ok((StatusCode::BAD_REQUEST, Json(CallbackAck::rejected("Unauthorized"))));
    }

    let callback = match StkCallback::parse(&payload) {
        Ok(callback) => callback,
        Err(e) => {
            warn!(error = %e, "Malformed M-Pesa callback");
            return Ok((StatusCode::BAD_REQUEST, Json(CallbackAck::rejected("Invalid payload"))));
        }
    };

    let payments = state.payments();
    let Some(txn) = payments.find_by_gateway_reference(&callback.checkout_request_id).await? else {
        warn!(checkout_request_id = %callback.checkout_request_id, "M-Pesa callback for unknown checkout");
        return Ok((StatusCode::OK, Json(CallbackAck::rejected("Transaction not found"))));
    };

    if callback.succeeded() {
        let completion = Completion {
            mpesa_receipt: callback.mpesa_receipt.clone(),
            metadata: callback.metadata(),
            ..Completion::default()
        };
        let txn = finish_payment(&state, txn, completion, &ClientInfo::default()).await?;
        info!(transaction_id = %txn.id, receipt = ?txn.mpesa_receipt, "M-Pesa callback processed");
    } else {
        info!(
            checkout_request_id = %callback.checkout_request_id,
            result_code = callback.result_code,
            "M-Pesa payment was not completed"
        );
        fail_payment(&state, txn, callback.result_desc.clone()).await?;
    }
    Ok((StatusCode::OK, Json(CallbackAck::accepted())))
}

/// Paystack event delivery, signed with HMAC-SHA512 of the raw body
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<MessageResponse>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let secret = state.config.paystack_secret_key.as_str();
    if secret.is_empty() || !verify_webhook_signature(secret, &body, signature) {
        warn!("Rejected Paystack webhook with an invalid signature");
        return Err(ApiError::bad_request("Invalid signature"));
    }

    let event = PaystackEvent::parse(&body).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let Some(reference) = event.reference.clone() else {
        return Ok(Json(MessageResponse::new("Event acknowledged")));
    };

    match &event.kind {
        PaystackEventKind::ChargeSuccess => {
            let Some(txn) = state.payments().find_by_reference(&reference).await? else {
                warn!(reference = %reference, "Paystack charge for unknown transaction");
                return Ok(Json(MessageResponse::new("Event acknowledged")));
            };
            let mut metadata = event.metadata();
            metadata.extend(gateway_metadata("webhook", json!("charge.success")));
            let completion = Completion {
                paystack_reference: Some(reference),
                metadata,
                ..Completion::default()
            };
            finish_payment(&state, txn, completion, &ClientInfo::default()).await?;
        }
        PaystackEventKind::ChargeFailed => {
            if let Some(txn) = state.payments().find_by_reference(&reference).await? {
                let reason = event.gateway_response.clone().unwrap_or_else(|| "Card charge failed".to_string());
                fail_payment(&state, txn, reason).await?;
            }
        }
        PaystackEventKind::Other(kind) => {
            info!(event = %kind, reference = %reference, "Ignoring Paystack event");
        }
    }
    Ok(Json(MessageResponse::new("Event processed")))
}
