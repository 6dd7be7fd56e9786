//! Payments: gateway checkouts, transactions, schedules and refunds

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{calendar, Money, PolicyId, RefundId, TransactionId, UserId};
use domain_analytics::{ActivityAction, UserActivity};
use domain_billing::{
    Completion, PaymentIntent, PaymentMethod, PaymentSchedule, PaymentSummary, Receipt, Refund, RefundStatus,
    Transaction,
};
use domain_notifications::{MessageArgs, NotificationKind};
use infra_db::{Page, ScheduleView};
use infra_gateways::{normalize_phone, CheckoutRequest, GatewayError, StkPushRequest};

use crate::dto::payments::*;
use crate::dto::Listing;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::handlers::page;
use crate::middleware::{AuthUser, ClientInfo};
use crate::notify;
use crate::AppState;

/// Records a gateway-confirmed payment with its notification and activity
///
/// Completing an already-completed transaction returns it unchanged, so
/// callbacks and polling can race without double-crediting. A transaction
/// failed locally is still completed when the gateway reports success.
pub(crate) async fn finish_payment(
    state: &AppState,
    mut txn: Transaction,
    completion: Completion,
    client: &ClientInfo,
) -> Result<Transaction, ApiError> {
    if !txn.complete_from_gateway(completion)? {
        return Ok(txn);
    }

    let args = MessageArgs::new()
        .with("amount", txn.amount.to_string())
        .with("transaction_number", &txn.transaction_number);
    let notification = notify::compose(
        state,
        txn.user_id,
        NotificationKind::PaymentReceived,
        args,
        format!("/dashboard/payments/{}", txn.id.into_uuid()),
    )
    .await?;
    let activity = UserActivity::record(Some(txn.user_id), ActivityAction::MakePayment)
        .on("transaction", txn.id)
        .with_metadata("amount", txn.amount.amount().to_string())
        .from_client(client.ip_address.clone(), client.user_agent.clone());

    let outcome = state.payments().complete_transaction(&txn, &notification, &activity).await?;
    if outcome.applied {
        info!(
            transaction_id = %txn.id,
            transaction_number = %txn.transaction_number,
            installment = outcome.installment.as_ref().map(|s| s.installment_number),
            "Payment completed"
        );
    }
    Ok(txn)
}

/// Marks an open transaction failed; closed ones are left alone
pub(crate) async fn fail_payment(
    state: &AppState,
    mut txn: Transaction,
    reason: impl Into<String>,
) -> Result<Transaction, ApiError> {
    if !txn.status.is_open() {
        return Ok(txn);
    }
    txn.fail(reason)?;
    if !state.payments().fail_transaction(&txn).await? {
        // Completed or cancelled concurrently; keep what is stored
        return Ok(state.payments().find_transaction(txn.id).await?);
    }
    warn!(transaction_id = %txn.id, reason = ?txn.failure_reason, "Payment failed");
    Ok(txn)
}

async fn visible_transaction(state: &AppState, caller: &AuthUser, id: Uuid) -> Result<Transaction, ApiError> {
    let txn = state.payments().find_transaction(TransactionId::from_uuid(id)).await?;
    caller.ensure_owner_or_staff(txn.user_id)?;
    Ok(txn)
}

/// The payer of a new transaction is the policy holder when a policy is named
async fn payer_for(state: &AppState, caller: &AuthUser, policy: Option<PolicyId>) -> Result<UserId, ApiError> {
    match policy {
        Some(id) => {
            let policy = state.policies().find(id).await?;
            caller.ensure_owner_or_staff(policy.user_id)?;
            Ok(policy.user_id)
        }
        None => Ok(caller.id),
    }
}

async fn open_transaction(state: &AppState, caller: &AuthUser, intent: PaymentIntent) -> Result<Transaction, ApiError> {
    let payer = payer_for(state, caller, intent.policy_id).await?;
    let txn = Transaction::initiate(payer, intent)?;
    state.payments().create_transaction(&txn).await?;
    info!(transaction_id = %txn.id, method = %txn.payment_method, amount = %txn.amount, "Transaction initiated");
    Ok(txn)
}

/// Reuses `existing` when given, otherwise opens a transaction from the other fields
async fn pending_or_new(
    state: &AppState,
    caller: &AuthUser,
    existing: Option<Uuid>,
    intent: impl FnOnce() -> Result<PaymentIntent, ApiError>,
) -> Result<Transaction, ApiError> {
    match existing {
        Some(id) => {
            let txn = visible_transaction(state, caller, id).await?;
            txn.ensure_pending()?;
            Ok(txn)
        }
        None => open_transaction(state, caller, intent()?).await,
    }
}

/// Gateway refusals are the caller's problem; missing configuration is ours
fn checkout_error(err: GatewayError) -> ApiError {
    match err {
        GatewayError::NotConfigured(_) | GatewayError::InvalidPhone(_) => err.into(),
        other => {
            warn!(error = %other, "Payment gateway refused checkout");
            ApiError::bad_request(other.to_string())
        }
    }
}

pub async fn initiate(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(request): ApiJson<InitiateRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    request.validate()?;
    let txn = open_transaction(&state, &caller, request.into()).await?;
    Ok((StatusCode::CREATED, Json(txn)))
}

/// Sends an STK push to the payer's phone
pub async fn mpesa_initiate(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(request): ApiJson<MpesaInitiateRequest>,
) -> Result<Json<MpesaInitiateResponse>, ApiError> {
    let phone = normalize_phone(&request.phone_number)?;
    let mut txn = pending_or_new(&state, &caller, request.transaction_id, || {
        let amount = request.amount.ok_or_else(|| ApiError::validation("amount is required"))?;
        Ok(PaymentIntent {
            policy_id: request.policy_id.map(PolicyId::from_uuid),
            amount: Money::kes(amount),
            method: PaymentMethod::Mpesa,
            phone_number: Some(phone.clone()),
            description: request.description.clone(),
        })
    })
    .await?;

    let description = if txn.description.is_empty() {
        format!("Payment {}", txn.transaction_number)
    } else {
        txn.description.clone()
    };
    let push = state
        .mpesa
        .stk_push(StkPushRequest {
            phone_number: phone.clone(),
            amount: txn.amount,
            account_reference: txn.transaction_number.clone(),
            description,
        })
        .await
        .map_err(checkout_error)?;

    txn.phone_number = Some(phone);
    txn.mark_processing(push.checkout_request_id.clone())?;
    state.payments().save_transaction(&txn).await?;

    info!(transaction_id = %txn.id, checkout_request_id = %push.checkout_request_id, "STK push sent");
    Ok(Json(MpesaInitiateResponse {
        transaction: txn,
        checkout_request_id: push.checkout_request_id,
        customer_message: push.customer_message,
    }))
}

/// Polls Daraja for an STK push that has not called back yet
pub async fn mpesa_status(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MpesaStatusResponse>, ApiError> {
    let txn = visible_transaction(&state, &caller, id).await?;
    let checkout_id = txn
        .gateway_reference
        .clone()
        .ok_or_else(|| ApiError::bad_request("Transaction has no M-Pesa checkout request"))?;

    let result = state.mpesa.stk_query(&checkout_id).await?;
    let txn = if result.succeeded() && txn.status.is_open() {
        let completion = Completion {
            gateway_reference: Some(checkout_id),
            metadata: gateway_metadata("stk_query", result.raw.clone()),
            ..Completion::default()
        };
        finish_payment(&state, txn, completion, &ClientInfo::default()).await?
    } else {
        txn
    };

    Ok(Json(MpesaStatusResponse {
        transaction: txn,
        result_code: result.result_code,
        result_desc: result.result_desc,
    }))
}

/// Starts a Paystack card checkout
pub async fn paystack_initialize(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(request): ApiJson<PaystackInitializeRequest>,
) -> Result<Json<PaystackInitializeResponse>, ApiError> {
    let mut txn = pending_or_new(&state, &caller, request.transaction_id, || {
        let amount = request.amount.ok_or_else(|| ApiError::validation("amount is required"))?;
        Ok(PaymentIntent {
            policy_id: request.policy_id.map(PolicyId::from_uuid),
            amount: Money::kes(amount),
            method: PaymentMethod::Card,
            phone_number: None,
            description: request.description.clone(),
        })
    })
    .await?;
    let payer = state.users().find_by_id(txn.user_id).await?;

    let mut metadata = Map::new();
    metadata.insert("transaction_id".to_string(), json!(txn.id.into_uuid()));
    if let Some(policy) = txn.policy_id {
        metadata.insert("policy_id".to_string(), json!(policy.into_uuid()));
    }
    let checkout = state
        .paystack
        .initialize(CheckoutRequest {
            email: payer.email,
            amount: txn.amount,
            reference: txn.transaction_number.clone(),
            callback_url: request.callback_url.or_else(|| state.config.paystack_callback_url.clone()),
            metadata: Some(metadata),
        })
        .await
        .map_err(checkout_error)?;

    txn.paystack_reference = Some(checkout.reference.clone());
    txn.mark_processing(checkout.reference.clone())?;
    state.payments().save_transaction(&txn).await?;

    info!(transaction_id = %txn.id, reference = %checkout.reference, "Card checkout initialized");
    Ok(Json(PaystackInitializeResponse {
        transaction: txn,
        authorization_url: checkout.authorization_url,
        access_code: checkout.access_code,
        reference: checkout.reference,
    }))
}

/// Confirms a card charge with Paystack after the customer returns
pub async fn paystack_verify(
    State(state): State<AppState>,
    caller: AuthUser,
    client: ClientInfo,
    Path(reference): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    let txn = state
        .payments()
        .find_by_reference(&reference)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Transaction with reference {} not found", reference)))?;
    caller.ensure_owner_or_staff(txn.user_id)?;

    let verification = state.paystack.verify(&reference).await?;
    let txn = if verification.verified {
        let mut metadata = Map::new();
        metadata.insert("channel".to_string(), json!(verification.channel));
        metadata.insert("paid_at".to_string(), json!(verification.paid_at));
        let completion = Completion {
            paystack_reference: Some(verification.reference),
            metadata,
            ..Completion::default()
        };
        finish_payment(&state, txn, completion, &client).await?
    } else {
        let reason = verification.gateway_response.unwrap_or(verification.status);
        fail_payment(&state, txn, reason).await?
    };
    Ok(Json(txn))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(requested): ApiQuery<Page>,
    ApiQuery(query): ApiQuery<TransactionQuery>,
) -> Result<Json<Listing<Transaction>>, ApiError> {
    let filter = query.into_filter(caller.scope());
    Ok(Json(state.payments().list_transactions(&filter, page(requested)).await?.into()))
}

pub async fn summary(State(state): State<AppState>, caller: AuthUser) -> Result<Json<PaymentSummary>, ApiError> {
    Ok(Json(state.payments().summary(caller.scope()).await?))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionDetail>, ApiError> {
    let transaction = visible_transaction(&state, &caller, id).await?;
    let refunds = state.payments().refunds_for_transaction(transaction.id).await?;
    Ok(Json(TransactionDetail { transaction, refunds }))
}

pub async fn receipt(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Receipt>, ApiError> {
    let txn = visible_transaction(&state, &caller, id).await?;
    let payer = state.users().find_by_id(txn.user_id).await?;
    let policy_number = match txn.policy_id {
        Some(policy) => Some(state.policies().find(policy).await?.policy_number),
        None => None,
    };
    Ok(Json(Receipt::for_transaction(&txn, policy_number, payer.full_name(), payer.email)?))
}

pub async fn schedules(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Listing<PaymentSchedule>>, ApiError> {
    Ok(Json(state.payments().schedules(caller.scope(), ScheduleView::All).await?.into()))
}

pub async fn pending_schedules(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Listing<PaymentSchedule>>, ApiError> {
    Ok(Json(state.payments().schedules(caller.scope(), ScheduleView::Pending).await?.into()))
}

pub async fn overdue_schedules(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Listing<PaymentSchedule>>, ApiError> {
    let view = ScheduleView::OverdueOn(calendar::today());
    Ok(Json(state.payments().schedules(caller.scope(), view).await?.into()))
}

pub async fn list_refunds(State(state): State<AppState>, caller: AuthUser) -> Result<Json<Listing<Refund>>, ApiError> {
    Ok(Json(state.payments().list_refunds(caller.scope()).await?.into()))
}

/// Requests a refund of a completed payment
pub async fn create_refund(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(input): ApiJson<RefundInput>,
) -> Result<(StatusCode, Json<Refund>), ApiError> {
    let txn = visible_transaction(&state, &caller, input.transaction_id).await?;
    let payments = state.payments();
    let existing = payments.refunds_for_transaction(txn.id).await?;

    let amount = Money::new(input.amount, txn.amount.currency());
    let refund = Refund::request(&txn, amount, input.reason, input.reason_description, &existing)?;
    payments.create_refund(&refund).await?;

    info!(refund_id = %refund.id, transaction_id = %txn.id, amount = %refund.amount, "Refund requested");
    Ok((StatusCode::CREATED, Json(refund)))
}

pub async fn get_refund(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Refund>, ApiError> {
    let payments = state.payments();
    let refund = payments.find_refund(RefundId::from_uuid(id)).await?;
    let txn = payments.find_transaction(refund.transaction_id).await?;
    caller.ensure_owner_or_staff(txn.user_id)?;
    Ok(Json(refund))
}

fn refund_taken() -> ApiError {
    ApiError::Conflict("Refund is already being processed or has been decided".to_string())
}

/// Staff decision on a refund; card payments are refunded through Paystack
///
/// The refund is claimed before the gateway is called, so a repeated or
/// concurrent request cannot return the money twice.
pub async fn process_refund(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<ProcessRefundRequest>,
) -> Result<Json<Refund>, ApiError> {
    caller.require_staff()?;
    let payments = state.payments();
    let mut refund = payments.find_refund(RefundId::from_uuid(id)).await?;

    match request.action {
        RefundAction::Complete => {
            let mut txn = payments.find_transaction(refund.transaction_id).await?;
            refund.begin(&txn)?;
            if !payments.start_refund(&refund).await? {
                return Err(refund_taken());
            }

            let reference = if txn.payment_method == PaymentMethod::Card {
                let charge = txn.paystack_reference.clone().unwrap_or_else(|| txn.transaction_number.clone());
                match state.paystack.refund(&charge, Some(refund.amount)).await {
                    Ok(card_refund) => card_refund.reference.or(request.refund_reference),
                    Err(e) => {
                        warn!(refund_id = %refund.id, error = %e, "Paystack refused the refund");
                        refund.reopen();
                        payments.save_refund(&refund).await?;
                        return Err(e.into());
                    }
                }
            } else {
                request.refund_reference
            };
            refund.complete(reference, caller.id)?;
            txn.mark_refunded()?;
            if !payments.process_refund(&refund, RefundStatus::Processing, Some(&txn)).await? {
                return Err(refund_taken());
            }
            info!(refund_id = %refund.id, transaction_id = %txn.id, "Refund completed");
        }
        RefundAction::Fail => {
            let reason = request
                .failure_reason
                .filter(|r| !r.trim().is_empty())
                .ok_or_else(|| ApiError::validation("failure_reason is required"))?;
            if refund.status != RefundStatus::Pending {
                return Err(refund_taken());
            }
            refund.fail(reason, caller.id)?;
            if !payments.process_refund(&refund, RefundStatus::Pending, None).await? {
                return Err(refund_taken());
            }
            info!(refund_id = %refund.id, "Refund marked failed");
        }
    }
    Ok(Json(refund))
}

/// Metadata echoed back from a gateway, kept on the transaction
pub(crate) fn gateway_metadata(key: &str, value: Value) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(key.to_string(), value);
    metadata
}
