//! API middleware and request extractors

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use core_kernel::UserId;
use domain_users::Role;

use crate::auth::{bearer_token, validate_token, TokenType};
use crate::error::ApiError;
use crate::AppState;

/// The caller of an authenticated request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub role: Role,
    pub jti: Uuid,
}

impl AuthUser {
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Staff privileges required"))
        }
    }

    pub fn require_assessor(&self) -> Result<(), ApiError> {
        if self.role.can_assess_claims() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Claim assessor privileges required"))
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role.can_manage_roles() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin privileges required"))
        }
    }

    /// `None` for staff, who see every record; the caller's id otherwise
    pub fn scope(&self) -> Option<UserId> {
        (!self.is_staff()).then_some(self.id)
    }

    /// Claim queues are visible to assessors as well as staff
    pub fn claims_scope(&self) -> Option<UserId> {
        (!self.role.can_assess_claims()).then_some(self.id)
    }

    /// Owners and staff may act on a record
    pub fn ensure_owner_or_staff(&self, owner: UserId) -> Result<(), ApiError> {
        if self.id == owner || self.is_staff() {
            Ok(())
        } else {
            Err(ApiError::NotFound("Resource not found".to_string()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or_else(|| ApiError::Unauthorized("Authentication credentials were not provided".to_string()))
    }
}

/// Client address and user agent, recorded on activity rows
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let ip_address = header("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .or_else(|| header("x-real-ip"));
        Ok(ClientInfo {
            ip_address,
            user_agent: header(header::USER_AGENT.as_str()),
        })
    }
}

/// Authentication middleware
///
/// Validates the bearer access token and stores the caller as [`AuthUser`]
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let claims = bearer_token(auth_header)
        .and_then(|token| validate_token(token, &state.config.jwt_secret, TokenType::Access));

    match claims {
        Ok(claims) => {
            request.extensions_mut().insert(AuthUser {
                id: claims.user_id(),
                role: claims.role,
                jti: claims.jti,
            });
            next.run(request).await
        }
        Err(e) => {
            warn!(uri = %request.uri(), error = %e, "Rejected unauthenticated request");
            ApiError::from(e).into_response()
        }
    }
}

/// Audit logging middleware
///
/// Logs every authenticated API call
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let user_id = request
        .extensions()
        .get::<AuthUser>()
        .map(|u| u.id.into_uuid().to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        user = %user_id,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role) -> AuthUser {
        AuthUser { id: UserId::new(), role, jti: Uuid::new_v4() }
    }

    #[test]
    fn test_role_gates() {
        assert!(caller(Role::Customer).require_staff().is_err());
        assert!(caller(Role::Staff).require_staff().is_ok());
        assert!(caller(Role::Assessor).require_staff().is_err());
        assert!(caller(Role::Assessor).require_assessor().is_ok());
        assert!(caller(Role::Staff).require_admin().is_err());
        assert!(caller(Role::Admin).require_admin().is_ok());
    }

    #[test]
    fn test_scopes() {
        let customer = caller(Role::Customer);
        assert_eq!(customer.scope(), Some(customer.id));
        assert_eq!(caller(Role::Admin).scope(), None);

        let assessor = caller(Role::Assessor);
        assert_eq!(assessor.scope(), Some(assessor.id));
        assert_eq!(assessor.claims_scope(), None);
    }

    #[test]
    fn test_other_users_records_are_hidden() {
        let customer = caller(Role::Customer);
        assert!(customer.ensure_owner_or_staff(customer.id).is_ok());
        assert!(matches!(customer.ensure_owner_or_staff(UserId::new()), Err(ApiError::NotFound(_))));
        assert!(caller(Role::Staff).ensure_owner_or_staff(UserId::new()).is_ok());
    }
}
