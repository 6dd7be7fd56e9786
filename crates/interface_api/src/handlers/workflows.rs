//! Policy processing stages

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;
use uuid::Uuid;

use core_kernel::{PolicyId, UserId, WorkflowStageId};
use domain_policy::WorkflowStage;

use crate::dto::records::{StageAssignment, StageNotes};
use crate::dto::Listing;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::AuthUser;
use crate::AppState;

/// Stages of one policy in processing order; holders may read their own
pub async fn policy_stages(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Listing<WorkflowStage>>, ApiError> {
    let policy = state.policies().find(PolicyId::from_uuid(id)).await?;
    caller.ensure_owner_or_staff(policy.user_id)?;
    Ok(Json(state.workflows().stages_for_policy(policy.id).await?.into()))
}

async fn staff_stage(state: &AppState, caller: &AuthUser, id: Uuid) -> Result<WorkflowStage, ApiError> {
    caller.require_staff()?;
    Ok(state.workflows().find(WorkflowStageId::from_uuid(id)).await?)
}

pub async fn assign(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<ApiJson<StageAssignment>>,
) -> Result<Json<WorkflowStage>, ApiError> {
    let mut stage = staff_stage(&state, &caller, id).await?;
    let assignee = match body.and_then(|ApiJson(b)| b.user_id) {
        Some(user) => {
            let user = state.users().find_by_id(UserId::from_uuid(user)).await?;
            if !user.role.is_staff() {
                return Err(ApiError::validation("Stages can only be assigned to staff"));
            }
            user.id
        }
        None => caller.id,
    };
    stage.assign_to(assignee);
    state.workflows().save(&stage).await?;

    info!(stage_id = %stage.id, stage = %stage.stage_name, assignee = %assignee, "Workflow stage assigned");
    Ok(Json(stage))
}

pub async fn complete(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<ApiJson<StageNotes>>,
) -> Result<Json<WorkflowStage>, ApiError> {
    let mut stage = staff_stage(&state, &caller, id).await?;
    stage.complete(body.and_then(|ApiJson(b)| b.notes))?;
    state.workflows().save(&stage).await?;

    info!(stage_id = %stage.id, stage = %stage.stage_name, "Workflow stage completed");
    Ok(Json(stage))
}

pub async fn skip(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<ApiJson<StageNotes>>,
) -> Result<Json<WorkflowStage>, ApiError> {
    let mut stage = staff_stage(&state, &caller, id).await?;
    stage.skip(body.and_then(|ApiJson(b)| b.notes))?;
    state.workflows().save(&stage).await?;
    Ok(Json(stage))
}

pub async fn fail(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<StageNotes>,
) -> Result<Json<WorkflowStage>, ApiError> {
    let mut stage = staff_stage(&state, &caller, id).await?;
    stage.fail(body.notes.as_deref().unwrap_or_default())?;
    state.workflows().save(&stage).await?;

    info!(stage_id = %stage.id, stage = %stage.stage_name, "Workflow stage failed");
    Ok(Json(stage))
}
