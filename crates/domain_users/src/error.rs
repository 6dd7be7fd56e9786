//! User domain errors

use thiserror::Error;

/// Errors that can occur in the user domain
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User account is disabled")]
    AccountDisabled,

    #[error("Password fields didn't match")]
    PasswordMismatch,

    #[error("Old password is incorrect")]
    IncorrectOldPassword,

    #[error("Weak password: {0}")]
    WeakPassword(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}
