//! Customer policies and reviews

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Duration;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use core_kernel::{calendar, PolicyId, PolicyTypeId, ReviewId};
use domain_analytics::{ActivityAction, UserActivity};
use domain_billing::{generate_schedule, PaymentSchedule};
use domain_notifications::{MessageArgs, NotificationKind};
use domain_policy::{workflow, Policy, PolicyReview, PolicyStatistics, PolicyStatus, WorkflowStage};
use infra_db::{Page, PolicyFilter};

use crate::dto::policies::*;
use crate::dto::Listing;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::handlers::page;
use crate::middleware::{AuthUser, ClientInfo};
use crate::notify;
use crate::AppState;

const DEFAULT_EXPIRY_DAYS: i64 = 30;

/// Installments and workflow stages created with every new policy
fn purchase_plan(policy: &Policy) -> Result<(Vec<PaymentSchedule>, Vec<WorkflowStage>), ApiError> {
    let frequency = policy.payment_frequency;
    let schedule = generate_schedule(
        policy.id,
        policy.premium_amount,
        frequency.installments(),
        frequency.interval_months(),
        policy.start_date,
    )?;
    Ok((schedule, workflow::initial_stages(policy.id)))
}

async fn owned_policy(state: &AppState, caller: &AuthUser, id: Uuid) -> Result<Policy, ApiError> {
    let policy = state.policies().find(PolicyId::from_uuid(id)).await?;
    caller.ensure_owner_or_staff(policy.user_id)?;
    Ok(policy)
}

pub async fn list_policies(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(requested): ApiQuery<Page>,
    ApiQuery(query): ApiQuery<PolicyQuery>,
) -> Result<Json<Listing<Policy>>, ApiError> {
    let filter = query.into_filter(caller.scope());
    Ok(Json(state.policies().list(&filter, page(requested)).await?.into()))
}

/// Buys a policy: a pending policy with its installment plan and workflow
pub async fn purchase(
    State(state): State<AppState>,
    caller: AuthUser,
    client: ClientInfo,
    ApiJson(input): ApiJson<PurchaseInput>,
) -> Result<(StatusCode, Json<PolicyDetail>), ApiError> {
    input.validate()?;
    let policy_type = state
        .catalog()
        .find_type(PolicyTypeId::from_uuid(input.policy_type_id))
        .await?;

    let policy = Policy::purchase(caller.id, &policy_type, input.into())?;
    let (schedule, stages) = purchase_plan(&policy)?;
    state.policies().create_purchase(&policy, &schedule, &stages, None).await?;

    info!(policy_id = %policy.id, policy_number = %policy.policy_number, "Policy purchased");
    notify::record(
        &state,
        UserActivity::record(Some(caller.id), ActivityAction::PurchasePolicy)
            .on("policy", policy.id)
            .with_metadata("policy_number", policy.policy_number.clone()),
        &client,
    )
    .await;

    let days_remaining = policy.days_remaining(calendar::today());
    Ok((
        StatusCode::CREATED,
        Json(PolicyDetail { policy, days_remaining, payment_schedule: schedule, workflow: stages }),
    ))
}

pub async fn get_policy(
    State(state): State<AppState>,
    caller: AuthUser,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> Result<Json<PolicyDetail>, ApiError> {
    let policy = owned_policy(&state, &caller, id).await?;
    let payment_schedule = state.payments().schedules_for_policy(policy.id).await?;
    let workflow = state.workflows().stages_for_policy(policy.id).await?;

    notify::record(
        &state,
        UserActivity::record(Some(caller.id), ActivityAction::ViewPolicy).on("policy", policy.id),
        &client,
    )
    .await;

    let days_remaining = policy.days_remaining(calendar::today());
    Ok(Json(PolicyDetail { policy, days_remaining, payment_schedule, workflow }))
}

pub async fn active_policies(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Listing<Policy>>, ApiError> {
    let filter = PolicyFilter {
        status: Some(PolicyStatus::Active),
        ..PolicyFilter::for_user(Some(caller.id))
    };
    Ok(Json(state.policies().list(&filter, Page::first(Page::MAX_LIMIT)).await?.into()))
}

/// Own active policies ending within `days` (30 by default)
pub async fn expiring_soon(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(query): ApiQuery<ExpiringQuery>,
) -> Result<Json<Listing<Policy>>, ApiError> {
    let days = query.horizon(DEFAULT_EXPIRY_DAYS)?;
    let today = calendar::today();
    let policies = state
        .policies()
        .expiring(Some(caller.id), today, today + Duration::days(days))
        .await?;
    Ok(Json(policies.into()))
}

pub async fn statistics(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<PolicyStatistics>, ApiError> {
    Ok(Json(state.policies().statistics(caller.scope()).await?))
}

/// Issues the follow-on policy for the next period
pub async fn renew(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Policy>), ApiError> {
    let current = owned_policy(&state, &caller, id).await?;
    let renewal = current.renew()?;
    let (schedule, stages) = purchase_plan(&renewal)?;

    let args = MessageArgs::new()
        .with("policy_number", &current.policy_number)
        .with("new_policy_number", &renewal.policy_number)
        .with("start_date", renewal.start_date);
    let notification = notify::compose(
        &state,
        renewal.user_id,
        NotificationKind::PolicyRenewed,
        args,
        format!("/dashboard/my-policies/{}", renewal.id.into_uuid()),
    )
    .await?;

    state
        .policies()
        .create_purchase(&renewal, &schedule, &stages, Some(&notification))
        .await?;

    info!(policy_id = %current.id, renewal_id = %renewal.id, "Policy renewed");
    Ok((StatusCode::CREATED, Json(renewal)))
}

pub async fn cancel(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<ApiJson<CancelRequest>>,
) -> Result<Json<Policy>, ApiError> {
    let mut policy = owned_policy(&state, &caller, id).await?;
    let reason = body.and_then(|ApiJson(request)| request.reason).unwrap_or_default();
    policy.cancel(reason)?;
    let voided = state.policies().cancel(&policy).await?;

    info!(policy_id = %policy.id, voided_installments = voided, "Policy cancelled");
    Ok(Json(policy))
}

/// Staff activation of a pending policy
pub async fn activate(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Policy>, ApiError> {
    caller.require_staff()?;
    Ok(Json(activate_policy(&state, PolicyId::from_uuid(id)).await?))
}

/// Activates `id`, closes its workflow and tells the holder
pub(crate) async fn activate_policy(state: &AppState, id: PolicyId) -> Result<Policy, ApiError> {
    let policies = state.policies();
    let mut policy = policies.find(id).await?;
    policy.activate()?;

    let args = MessageArgs::new()
        .with("policy_number", &policy.policy_number)
        .with("end_date", policy.end_date);
    let notification = notify::compose(
        state,
        policy.user_id,
        NotificationKind::PolicyIssued,
        args,
        format!("/dashboard/my-policies/{}", policy.id.into_uuid()),
    )
    .await?;
    policies.activate(&policy, &notification).await?;

    info!(policy_id = %policy.id, "Policy activated");
    Ok(policy)
}

/// Reviews of a policy type; staff also see unpublished ones
pub async fn list_reviews(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(query): ApiQuery<ReviewQuery>,
) -> Result<Json<Listing<PolicyReview>>, ApiError> {
    let reviews = state
        .policies()
        .reviews_for_type(PolicyTypeId::from_uuid(query.policy_type), !caller.is_staff())
        .await?;
    Ok(Json(reviews.into()))
}

pub async fn create_review(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(input): ApiJson<ReviewInput>,
) -> Result<(StatusCode, Json<PolicyReview>), ApiError> {
    input.validate()?;
    let policies = state.policies();
    let policy = policies.find(PolicyId::from_uuid(input.policy_id)).await?;
    let verified = policies.has_completed_payment(policy.id).await?;

    let review = PolicyReview::write(&policy, caller.id, input.rating, input.title, input.comment, verified)?;
    policies.create_review(&review).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn publish_review(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PolicyReview>, ApiError> {
    caller.require_staff()?;
    let policies = state.policies();
    let mut review = policies.find_review(ReviewId::from_uuid(id)).await?;
    review.publish();
    policies.save_review(&review).await?;
    Ok(Json(review))
}
