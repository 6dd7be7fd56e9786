//! Claim handlers
//!
//! Customers file and follow their own claims. Assessors work the review
//! queue; staff assign claims and record settlements. Every status change
//! is saved together with its history row and the claimant's notification.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use core_kernel::{calendar, ClaimId, Money, UserId};
use domain_analytics::{ActivityAction, UserActivity};
use domain_claims::{
    Claim, ClaimDocument, ClaimError, ClaimSettlement, ClaimStatistics, StatusChange,
};
use domain_notifications::{MessageArgs, Notification, NotificationKind};
use infra_db::{ClaimFilter, DatabaseError, Page};

use crate::dto::claims::*;
use crate::dto::Listing;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::handlers::page;
use crate::middleware::{AuthUser, ClientInfo};
use crate::notify;
use crate::AppState;

fn claim_url(claim: &Claim) -> String {
    format!("/dashboard/claims/{}", claim.id.into_uuid())
}

/// The claim if the caller filed it or reviews claims
async fn visible_claim(state: &AppState, caller: &AuthUser, id: Uuid) -> Result<Claim, ApiError> {
    let claim = state.claims().find(ClaimId::from_uuid(id)).await?;
    if caller.claims_scope().is_some_and(|owner| owner != claim.user_id) {
        return Err(DatabaseError::not_found("Claim", id).into());
    }
    Ok(claim)
}

/// `claim_status_update` for the claimant
async fn status_notification(state: &AppState, claim: &Claim, notes: &str) -> Result<Notification, ApiError> {
    let args = MessageArgs::new()
        .with("claim_number", &claim.claim_number)
        .with("status", claim.status.as_str().replace('_', " "))
        .with("notes", notes);
    notify::compose(state, claim.user_id, NotificationKind::ClaimStatusUpdate, args, claim_url(claim)).await
}

pub async fn list_claims(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(requested): ApiQuery<Page>,
    ApiQuery(query): ApiQuery<ClaimQuery>,
) -> Result<Json<Listing<Claim>>, ApiError> {
    let filter = query.into_filter(caller.claims_scope());
    Ok(Json(state.claims().list(&filter, page(requested)).await?.into()))
}

/// Files a claim against one of the caller's active policies
pub async fn create_claim(
    State(state): State<AppState>,
    caller: AuthUser,
    client: ClientInfo,
    ApiJson(input): ApiJson<ClaimInput>,
) -> Result<(StatusCode, Json<Claim>), ApiError> {
    input.validate()?;
    let claims = state.claims();
    let covered = claims.covered_policy(input.policy_id()).await?;
    let (claim, opening) = Claim::submit(&covered, caller.id, input.into_new_claim(), calendar::today())?;

    let args = MessageArgs::new().with("claim_number", &claim.claim_number);
    let notification =
        notify::compose(&state, claim.user_id, NotificationKind::ClaimSubmitted, args, claim_url(&claim)).await?;
    claims.create(&claim, &opening, &notification).await?;

    info!(claim_number = %claim.claim_number, policy_id = %claim.policy_id, "Claim submitted");
    notify::record(
        &state,
        UserActivity::record(Some(caller.id), ActivityAction::FileClaim)
            .on("claim", claim.id)
            .with_metadata("claim_number", claim.claim_number.clone()),
        &client,
    )
    .await;
    Ok((StatusCode::CREATED, Json(claim)))
}

pub async fn get_claim(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ClaimDetail>, ApiError> {
    let claim = visible_claim(&state, &caller, id).await?;
    let claims = state.claims();
    let status_history = claims.history(claim.id).await?;
    let documents = claims.documents(claim.id).await?;
    let settlement = claims.settlement(claim.id).await?;
    Ok(Json(ClaimDetail { claim, status_history, documents, settlement }))
}

/// Claimant edits while `submitted`; staff status changes and notes
///
/// Approval, rejection and settlement have their own routes and are refused here.
pub async fn update_claim(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(update): ApiJson<ClaimUpdate>,
) -> Result<Json<Claim>, ApiError> {
    let claims = state.claims();
    let mut claim = visible_claim(&state, &caller, id).await?;

    if update.has_edits() {
        if claim.user_id != caller.id {
            return Err(ClaimError::NotPolicyHolder.into());
        }
        let covered = claims.covered_policy(claim.policy_id).await?;
        claim.edit(update.edit(), &covered.coverage_amount)?;
    }

    let notes = update.notes.clone().unwrap_or_default();
    let mut change = None;
    if let Some(status) = update.status {
        caller.require_staff()?;
        change = Some(claim.change_status(status, notes.clone(), caller.id)?);
    } else if !notes.trim().is_empty() {
        caller.require_assessor()?;
        claim.append_notes(&notes);
    }

    let notification = match &change {
        Some(_) => Some(status_notification(&state, &claim, &notes).await?),
        None => None,
    };
    claims.update(&claim, change.as_ref(), notification.as_ref()).await?;
    Ok(Json(claim))
}

/// Hands a claim to an assessor
pub async fn assign(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<AssignRequest>,
) -> Result<Json<Claim>, ApiError> {
    caller.require_staff()?;
    let assessor = state.users().find_by_id(UserId::from_uuid(request.assessor_id)).await?;
    if !assessor.role.can_assess_claims() || !assessor.is_active {
        return Err(ApiError::validation("Assigned user cannot assess claims"));
    }

    let mut claim = visible_claim(&state, &caller, id).await?;
    let change = claim.assign(assessor.id, caller.id)?;
    let notification = match &change {
        Some(change) => Some(status_notification(&state, &claim, &change.notes).await?),
        None => None,
    };
    state.claims().update(&claim, change.as_ref(), notification.as_ref()).await?;

    info!(claim_number = %claim.claim_number, assessor = %assessor.id, "Claim assigned");
    Ok(Json(claim))
}

pub async fn request_documents(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<ApiJson<NotesRequest>>,
) -> Result<Json<Claim>, ApiError> {
    caller.require_assessor()?;
    let notes = body.map(|ApiJson(b)| b.notes).unwrap_or_default();
    let mut claim = visible_claim(&state, &caller, id).await?;
    let change = claim.request_documents(&notes, caller.id)?;
    save_transition(&state, &claim, change).await?;
    Ok(Json(claim))
}

pub async fn complete_assessment(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<ApiJson<NotesRequest>>,
) -> Result<Json<Claim>, ApiError> {
    caller.require_assessor()?;
    let notes = body.map(|ApiJson(b)| b.notes).unwrap_or_default();
    let mut claim = visible_claim(&state, &caller, id).await?;
    let change = claim.complete_assessment(&notes, caller.id)?;
    save_transition(&state, &claim, change).await?;
    Ok(Json(claim))
}

async fn save_transition(state: &AppState, claim: &Claim, change: StatusChange) -> Result<(), ApiError> {
    let notification = status_notification(state, claim, &change.notes).await?;
    state.claims().update(claim, Some(&change), Some(&notification)).await?;
    Ok(())
}

pub async fn approve(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<ApproveRequest>,
) -> Result<Json<Claim>, ApiError> {
    caller.require_assessor()?;
    let mut claim = visible_claim(&state, &caller, id).await?;
    let change = claim.approve(Money::kes(request.amount_approved), &request.notes, caller.id)?;

    let amount = claim.amount_approved.map(|m| m.amount()).unwrap_or_default();
    let args = MessageArgs::new()
        .with("claim_number", &claim.claim_number)
        .with("amount", amount);
    let notification =
        notify::compose(&state, claim.user_id, NotificationKind::ClaimApproved, args, claim_url(&claim)).await?;
    state.claims().update(&claim, Some(&change), Some(&notification)).await?;
    Ok(Json(claim))
}

pub async fn reject(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<RejectRequest>,
) -> Result<Json<Claim>, ApiError> {
    caller.require_assessor()?;
    let mut claim = visible_claim(&state, &caller, id).await?;
    let change = claim.reject(&request.rejection_reason, caller.id)?;

    let args = MessageArgs::new()
        .with("claim_number", &claim.claim_number)
        .with("reason", claim.rejection_reason.clone().unwrap_or_default());
    let notification =
        notify::compose(&state, claim.user_id, NotificationKind::ClaimRejected, args, claim_url(&claim)).await?;
    state.claims().update(&claim, Some(&change), Some(&notification)).await?;
    Ok(Json(claim))
}

/// Records the payout of an approved claim
pub async fn settle(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<SettleRequest>,
) -> Result<(StatusCode, Json<ClaimSettlement>), ApiError> {
    caller.require_staff()?;
    let claims = state.claims();
    let mut claim = visible_claim(&state, &caller, id).await?;
    if claims.settlement(claim.id).await?.is_some() {
        return Err(ClaimError::AlreadySettled.into());
    }

    let (method, payout) = request.into_parts();
    let settlement = ClaimSettlement::prepare(&claim, method, payout, caller.id)?;
    let change = claim.mark_settled(format!("Settled via {}", method.label()), caller.id)?;

    let args = MessageArgs::new()
        .with("claim_number", &claim.claim_number)
        .with("amount", settlement.amount.amount())
        .with("method", method.label());
    let notification =
        notify::compose(&state, claim.user_id, NotificationKind::ClaimSettled, args, claim_url(&claim)).await?;
    claims.settle(&claim, &settlement, &change, &notification).await?;

    info!(claim_number = %claim.claim_number, amount = %settlement.amount, "Claim settled");
    Ok((StatusCode::CREATED, Json(settlement)))
}

pub async fn get_settlement(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ClaimSettlement>, ApiError> {
    let claim = visible_claim(&state, &caller, id).await?;
    let settlement = state
        .claims()
        .settlement(claim.id)
        .await?
        .ok_or_else(|| DatabaseError::not_found("ClaimSettlement", claim.id))?;
    Ok(Json(settlement))
}

pub async fn list_documents(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Listing<ClaimDocument>>, ApiError> {
    let claim = visible_claim(&state, &caller, id).await?;
    Ok(Json(state.claims().documents(claim.id).await?.into()))
}

pub async fn add_document(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<ClaimDocumentInput>,
) -> Result<(StatusCode, Json<ClaimDocument>), ApiError> {
    input.validate()?;
    let claim = visible_claim(&state, &caller, id).await?;
    let document = ClaimDocument::new(
        claim.id,
        input.document_type,
        input.title,
        input.file_url,
        input.file_size,
        input.mime_type,
        caller.id,
    )?;
    state.claims().add_document(&document).await?;
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn history(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatusChange>>, ApiError> {
    let claim = visible_claim(&state, &caller, id).await?;
    Ok(Json(state.claims().history(claim.id).await?))
}

pub async fn statistics(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<ClaimStatistics>, ApiError> {
    Ok(Json(state.claims().statistics(caller.claims_scope()).await?))
}

/// Review queue: submitted, under review or awaiting documents
pub async fn pending_claims(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(requested): ApiQuery<Page>,
) -> Result<Json<Listing<Claim>>, ApiError> {
    caller.require_assessor()?;
    let filter = ClaimFilter { pending_review: true, ..ClaimFilter::default() };
    Ok(Json(state.claims().list(&filter, page(requested)).await?.into()))
}
