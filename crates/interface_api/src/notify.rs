//! Notification and activity helpers shared by handlers

use tracing::warn;

use core_kernel::UserId;
use domain_analytics::UserActivity;
use domain_notifications::{MessageArgs, Notification, NotificationKind};

use crate::error::ApiError;
use crate::middleware::ClientInfo;
use crate::AppState;

/// Renders `kind` for `user` in their preferred language
pub async fn compose(
    state: &AppState,
    user: UserId,
    kind: NotificationKind,
    args: MessageArgs,
    action_url: impl Into<String>,
) -> Result<Notification, ApiError> {
    let language = state.users().preferred_language(user).await?;
    Ok(Notification::compose(user, kind, &language, &args, action_url)?)
}

/// Records an activity row; a failure is logged and never fails the request
pub async fn record(state: &AppState, activity: UserActivity, client: &ClientInfo) {
    let activity = activity.from_client(client.ip_address.clone(), client.user_agent.clone());
    if let Err(e) = state.analytics().record_activity(&activity).await {
        warn!(action = %activity.action, error = %e, "Failed to record user activity");
    }
}
