//! In-app notifications

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use core_kernel::{NotificationId, UserId};
use domain_notifications::Notification;
use infra_db::Page;

use crate::dto::records::*;
use crate::dto::{Listing, MessageResponse};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::handlers::page;
use crate::middleware::AuthUser;
use crate::AppState;

pub async fn list(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(requested): ApiQuery<Page>,
    ApiQuery(query): ApiQuery<NotificationQuery>,
) -> Result<Json<Listing<Notification>>, ApiError> {
    let notifications = state.notifications().list(caller.id, query.read, page(requested)).await?;
    Ok(Json(notifications.into()))
}

/// Staff message to a single user
pub async fn create_system_message(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(input): ApiJson<SystemMessageInput>,
) -> Result<(StatusCode, Json<Notification>), ApiError> {
    caller.require_staff()?;
    let recipient = state.users().find_by_id(UserId::from_uuid(input.user_id)).await?;
    let notification = Notification::system_message(recipient.id, &input.title, &input.message, input.action_url)?;
    state.notifications().create(&notification).await?;

    info!(notification_id = %notification.id, recipient = %recipient.id, sent_by = %caller.id, "System message sent");
    Ok((StatusCode::CREATED, Json(notification)))
}

pub async fn unread(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(requested): ApiQuery<Page>,
) -> Result<Json<Listing<Notification>>, ApiError> {
    let notifications = state.notifications().list(caller.id, Some(false), page(requested)).await?;
    Ok(Json(notifications.into()))
}

pub async fn unread_count(State(state): State<AppState>, caller: AuthUser) -> Result<Json<CountResponse>, ApiError> {
    let count = state.notifications().unread_count(caller.id).await?;
    Ok(Json(CountResponse { count }))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    let updated = state.notifications().mark_all_read(caller.id).await?;
    Ok(Json(MessageResponse::new(format!("{} notifications marked as read", updated))))
}

pub async fn get(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    let notification = state
        .notifications()
        .find_for_user(NotificationId::from_uuid(id), caller.id)
        .await?;
    Ok(Json(notification))
}

pub async fn delete(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.notifications().delete(NotificationId::from_uuid(id), caller.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_as_read(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    let notifications = state.notifications();
    let mut notification = notifications.find_for_user(NotificationId::from_uuid(id), caller.id).await?;
    if notification.mark_as_read() {
        notifications.mark_read(&notification).await?;
    }
    Ok(Json(notification))
}
