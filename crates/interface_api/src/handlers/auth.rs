//! Account handlers: sign-up, sign-in, tokens, profile and preferences

use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, Utc};
use tracing::{debug, info};
use validator::Validate;

use domain_analytics::{ActivityAction, UserActivity};
use domain_users::{
    authenticate, NotificationPreference, PasswordChange, PasswordPolicy, PasswordResetConfirm,
    PreferenceUpdate, ProfileUpdate, Registration, ResetToken, User, UserError,
};

use crate::auth::{create_token, issue_pair, validate_token, AuthError, TokenType};
use crate::dto::auth::*;
use crate::dto::MessageResponse;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::{AuthUser, ClientInfo};
use crate::notify;
use crate::AppState;

const RESET_REQUESTED: &str = "If an account exists for that e-mail, a reset link has been sent.";

/// Self-service customer sign-up
pub async fn register(
    State(state): State<AppState>,
    ApiJson(registration): ApiJson<Registration>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let users = state.users();
    if users.email_exists(&registration.email).await? {
        return Err(ApiError::Conflict("A user with this e-mail already exists".to_string()));
    }

    let user = registration.into_user(&PasswordPolicy::default())?;
    users.create(&user).await?;
    let tokens = issue_pair(&user, &state.config)?;

    info!(user_id = %user.id, "Registered new customer");
    Ok((StatusCode::CREATED, Json(AuthResponse { user, tokens })))
}

pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    request.validate()?;

    let users = state.users();
    let found = users.find_by_email(&request.email).await?;
    authenticate(found.as_ref(), &request.password)?;
    let mut user = found.ok_or(UserError::InvalidCredentials)?;

    user.record_login();
    users.save(&user).await?;
    let tokens = issue_pair(&user, &state.config)?;

    notify::record(&state, UserActivity::record(Some(user.id), ActivityAction::Login), &client).await;
    Ok(Json(AuthResponse { user, tokens }))
}

/// Revokes the caller's refresh token
pub async fn logout(
    State(state): State<AppState>,
    caller: AuthUser,
    client: ClientInfo,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let claims = validate_token(&request.refresh, &state.config.jwt_secret, TokenType::Refresh)?;
    if claims.user_id() != caller.id {
        return Err(ApiError::bad_request("Refresh token belongs to another user"));
    }
    state.users().revoke_token(claims.jti, caller.id, claims.expires_at()).await?;

    notify::record(&state, UserActivity::record(Some(caller.id), ActivityAction::Logout), &client).await;
    Ok(Json(MessageResponse::new("Successfully logged out")))
}

/// Mints a new access token from a refresh token
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, ApiError> {
    let claims = validate_token(&request.refresh, &state.config.jwt_secret, TokenType::Refresh)?;

    let users = state.users();
    if users.is_token_revoked(claims.jti).await? {
        return Err(AuthError::Revoked.into());
    }
    let user = users.find_by_id(claims.user_id()).await.map_err(|_| AuthError::InvalidToken)?;
    user.ensure_active()?;

    let access = create_token(
        user.id,
        user.role,
        TokenType::Access,
        &state.config.jwt_secret,
        state.config.jwt_expiration_secs,
    )?;
    Ok(Json(AccessTokenResponse {
        access,
        token_type: "Bearer",
        expires_in: state.config.jwt_expiration_secs,
    }))
}

pub async fn verify(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VerifyRequest>,
) -> Json<VerifyResponse> {
    let response = match validate_token(&request.token, &state.config.jwt_secret, TokenType::Access) {
        Ok(claims) => VerifyResponse {
            valid: true,
            user_id: Some(claims.sub),
            role: Some(claims.role),
        },
        Err(_) => VerifyResponse { valid: false, user_id: None, role: None },
    };
    Json(response)
}

/// Always answers the same way so e-mail addresses cannot be probed
pub async fn request_password_reset(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    request.validate()?;

    let users = state.users();
    if let Some(user) = users.find_by_email(&request.email).await? {
        if user.is_active {
            let token = ResetToken::generate(Duration::seconds(state.config.password_reset_ttl_secs as i64));
            users.store_reset_token(user.id, &token).await?;
            info!(user_id = %user.id, expires_at = %token.expires_at, "Password reset requested");
            debug!(user_id = %user.id, token = %token.token, "Password reset token issued");
        }
    }
    Ok(Json(MessageResponse::new(RESET_REQUESTED)))
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    ApiJson(confirm): ApiJson<PasswordResetConfirm>,
) -> Result<Json<MessageResponse>, ApiError> {
    let hash = confirm.new_hash(&PasswordPolicy::default())?;
    let user = state
        .users()
        .reset_password(&ResetToken::digest_of(confirm.token.trim()), &hash)
        .await?
        .ok_or(UserError::InvalidResetToken)?;

    info!(user_id = %user, "Password reset completed");
    Ok(Json(MessageResponse::new("Password has been reset successfully")))
}

pub async fn profile(State(state): State<AppState>, caller: AuthUser) -> Result<Json<User>, ApiError> {
    Ok(Json(state.users().find_by_id(caller.id).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<User>, ApiError> {
    let users = state.users();
    let mut user = users.find_by_id(caller.id).await?;
    user.apply_profile_update(update)?;
    users.save(&user).await?;
    Ok(Json(user))
}

pub async fn change_password(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(change): ApiJson<PasswordChange>,
) -> Result<Json<MessageResponse>, ApiError> {
    let users = state.users();
    let mut user = users.find_by_id(caller.id).await?;
    user.password_hash = change.apply(&user, &PasswordPolicy::default())?;
    user.updated_at = Utc::now();
    users.save(&user).await?;

    info!(user_id = %user.id, "Password changed");
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

pub async fn preferences(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<NotificationPreference>, ApiError> {
    Ok(Json(state.users().preferences(caller.id).await?))
}

pub async fn update_preferences(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(update): ApiJson<PreferenceUpdate>,
) -> Result<Json<NotificationPreference>, ApiError> {
    let users = state.users();
    let mut preferences = users.preferences(caller.id).await?;
    preferences.apply(update)?;
    users.save_preferences(&preferences).await?;
    Ok(Json(preferences))
}
