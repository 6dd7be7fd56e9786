//! Authentication tokens
//!
//! HS256 JWTs in two flavours: short-lived access tokens that authenticate
//! API calls and longer-lived refresh tokens that mint new access tokens.
//! Every token carries a `jti` so a refresh token can be revoked at logout.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use core_kernel::UserId;
use domain_users::{Role, User};

use crate::config::ApiConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    pub role: Role,
    pub token_type: TokenType,
    pub jti: Uuid,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

impl TokenClaims {
    pub fn user_id(&self) -> UserId {
        UserId::from_uuid(self.sub)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_else(Utc::now)
    }
}

/// Auth errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Expected a {0:?} token")]
    WrongTokenType(TokenType),
    #[error("Token has been revoked")]
    Revoked,
    #[error("Missing or malformed Authorization header")]
    MissingCredentials,
    #[error("Could not sign token: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

/// Signs a token of `token_type` for `user_id`
pub fn create_token(
    user_id: UserId,
    role: Role,
    token_type: TokenType,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = TokenClaims {
        sub: user_id.into_uuid(),
        role,
        token_type,
        jti: Uuid::new_v4(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Encoding(e.to_string()))
}

/// Issues a fresh access/refresh pair for `user`
pub fn issue_pair(user: &User, config: &ApiConfig) -> Result<TokenPair, AuthError> {
    Ok(TokenPair {
        access: create_token(user.id, user.role, TokenType::Access, &config.jwt_secret, config.jwt_expiration_secs)?,
        refresh: create_token(
            user.id,
            user.role,
            TokenType::Refresh,
            &config.jwt_secret,
            config.refresh_expiration_secs,
        )?,
        token_type: "Bearer",
        expires_in: config.jwt_expiration_secs,
    })
}

/// Validates a JWT token and checks it is of the expected type
pub fn validate_token(token: &str, secret: &str, expected: TokenType) -> Result<TokenClaims, AuthError> {
    let token_data = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    if token_data.claims.token_type != expected {
        return Err(AuthError::WrongTokenType(expected));
    }
    Ok(token_data.claims)
}

/// Extracts the token from an `Authorization: Bearer ...` header value
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_access_token_round_trip() {
        let user = UserId::new();
        let token = create_token(user, Role::Assessor, TokenType::Access, SECRET, 60).unwrap();
        let claims = validate_token(&token, SECRET, TokenType::Access).unwrap();
        assert_eq!(claims.user_id(), user);
        assert_eq!(claims.role, Role::Assessor);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let token = create_token(UserId::new(), Role::Customer, TokenType::Refresh, SECRET, 60).unwrap();
        assert_eq!(
            validate_token(&token, SECRET, TokenType::Access).unwrap_err(),
            AuthError::WrongTokenType(TokenType::Access)
        );
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = create_token(UserId::new(), Role::Customer, TokenType::Access, SECRET, 60).unwrap();
        assert_eq!(validate_token(&token, "other", TokenType::Access).unwrap_err(), AuthError::InvalidToken);
    }

    #[test]
    fn test_each_token_gets_its_own_jti() {
        let user = UserId::new();
        let a = create_token(user, Role::Customer, TokenType::Refresh, SECRET, 60).unwrap();
        let b = create_token(user, Role::Customer, TokenType::Refresh, SECRET, 60).unwrap();
        let a = validate_token(&a, SECRET, TokenType::Refresh).unwrap();
        let b = validate_token(&b, SECRET, TokenType::Refresh).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
        assert_eq!(bearer_token(Some("Basic abc")).unwrap_err(), AuthError::MissingCredentials);
        assert_eq!(bearer_token(Some("Bearer ")).unwrap_err(), AuthError::MissingCredentials);
        assert_eq!(bearer_token(None).unwrap_err(), AuthError::MissingCredentials);
    }
}
