//! API error handling

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use core_kernel::MoneyError;
use domain_billing::BillingError;
use domain_claims::ClaimError;
use domain_documents::DocumentError;
use domain_notifications::NotificationError;
use domain_policy::PolicyError;
use domain_users::UserError;
use infra_db::DatabaseError;
use infra_gateways::GatewayError;

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {message}")]
    Validation { message: String, details: Vec<String> },

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation { message: message.into(), details: Vec::new() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_type, message, details) = match self {
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::Validation { message, details } => {
                ("validation_error", message, (!details.is_empty()).then_some(details))
            }
            ApiError::Gateway(msg) => ("gateway_error", msg, None),
            ApiError::Unavailable(msg) => ("service_unavailable", msg, None),
            ApiError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                ("internal_error", "An internal error occurred".to_string(), None)
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(msg) => ApiError::NotFound(msg),
            DatabaseError::DuplicateEntry(msg) => ApiError::Conflict(msg),
            DatabaseError::ForeignKeyViolation(msg) => ApiError::BadRequest(msg),
            DatabaseError::ConstraintViolation(msg) => ApiError::BadRequest(msg),
            DatabaseError::PoolExhausted | DatabaseError::ConnectionFailed(_) => {
                ApiError::Unavailable("Database unavailable".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            UserError::AccountDisabled => ApiError::Forbidden(err.to_string()),
            UserError::InvalidResetToken => ApiError::BadRequest(err.to_string()),
            UserError::Hashing(msg) => ApiError::Internal(msg),
            other => ApiError::validation(other.to_string()),
        }
    }
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::DuplicateReview => ApiError::Conflict(err.to_string()),
            PolicyError::Validation(msg) => ApiError::validation(msg),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<ClaimError> for ApiError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::NotPolicyHolder => ApiError::Forbidden(err.to_string()),
            ClaimError::AlreadySettled => ApiError::Conflict(err.to_string()),
            ClaimError::Validation(msg) => ApiError::validation(msg),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::RefundExists => ApiError::Conflict(err.to_string()),
            BillingError::Validation(msg) => ApiError::validation(msg),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Validation(msg) => ApiError::validation(msg),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::Validation(msg) => ApiError::validation(msg),
            NotificationError::UnknownKind(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        warn!(error = %err, "Payment gateway call failed");
        match err {
            GatewayError::NotConfigured(what) => ApiError::Unavailable(format!("{} is not configured", what)),
            GatewayError::InvalidPhone(phone) => ApiError::validation(format!("Invalid phone number: {}", phone)),
            other => ApiError::Gateway(other.to_string()),
        }
    }
}

impl From<MoneyError> for ApiError {
    fn from(err: MoneyError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Encoding(msg) => ApiError::Internal(msg),
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{}: {}", field, msg),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        details.sort();
        ApiError::Validation { message: "Request validation failed".to_string(), details }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<csv::Error> for ApiError {
    fn from(err: csv::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_errors_map_to_status() {
        let dup: ApiError = DatabaseError::duplicate("User", "email", "a@b.co").into();
        assert_eq!(dup.status(), StatusCode::CONFLICT);

        let missing: ApiError = DatabaseError::not_found("Claim", "x").into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let pool: ApiError = DatabaseError::PoolExhausted.into();
        assert_eq!(pool.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_domain_errors_map_to_status() {
        assert_eq!(ApiError::from(UserError::InvalidCredentials).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(UserError::AccountDisabled).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(UserError::PasswordMismatch).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::from(ClaimError::NotPolicyHolder).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(ClaimError::NotApproved).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(ClaimError::RequiresAction("approved".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::from(BillingError::RefundExists).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(GatewayError::NotConfigured("Paystack")).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(GatewayError::Rejected { gateway: "M-Pesa", message: "busy".into() }).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_internal_message_is_not_leaked() {
        let response = ApiError::Internal("relation \"users\" does not exist".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
