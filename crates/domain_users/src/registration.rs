//! Credential-bearing inputs: sign-up, password change, password reset

use serde::Deserialize;
use validator::Validate;

use crate::error::UserError;
use crate::password::{hash_password, verify_password, PasswordPolicy};
use crate::role::Role;
use crate::user::User;

/// Self-service sign-up
///
/// The role is never taken from the request; every self-registered account
/// is a customer.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Registration {
    #[validate(email)]
    pub email: String,
    pub password: String,
    pub password2: String,
    #[validate(length(min = 1, max = 150))]
    pub first_name: String,
    #[validate(length(min = 1, max = 150))]
    pub last_name: String,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
}

impl Registration {
    /// Validates the form and produces a new customer account
    pub fn into_user(self, policy: &PasswordPolicy) -> Result<User, UserError> {
        self.validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;
        if self.password != self.password2 {
            return Err(UserError::PasswordMismatch);
        }
        policy.check(&self.password)?;

        let hash = hash_password(&self.password)?;
        let mut user = User::new(&self.email, hash, self.first_name.trim(), self.last_name.trim(), Role::Customer);
        user.phone_number = self
            .phone_number
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        Ok(user)
    }
}

/// Authenticated password change
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
    pub new_password2: String,
}

impl PasswordChange {
    /// Verifies the old password and returns the new hash
    pub fn apply(&self, user: &User, policy: &PasswordPolicy) -> Result<String, UserError> {
        if !verify_password(&self.old_password, &user.password_hash) {
            return Err(UserError::IncorrectOldPassword);
        }
        if self.new_password != self.new_password2 {
            return Err(UserError::PasswordMismatch);
        }
        policy.check(&self.new_password)?;
        hash_password(&self.new_password)
    }
}

/// Completion of a password reset
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub new_password: String,
    pub new_password2: String,
}

impl PasswordResetConfirm {
    /// Checks the new password pair and returns its hash
    pub fn new_hash(&self, policy: &PasswordPolicy) -> Result<String, UserError> {
        if self.new_password != self.new_password2 {
            return Err(UserError::PasswordMismatch);
        }
        policy.check(&self.new_password)?;
        hash_password(&self.new_password)
    }
}

/// Authenticates a login attempt
///
/// Unknown e-mail and wrong password produce the same error.
pub fn authenticate(user: Option<&User>, password: &str) -> Result<(), UserError> {
    let user = user.ok_or(UserError::InvalidCredentials)?;
    if !verify_password(password, &user.password_hash) {
        return Err(UserError::InvalidCredentials);
    }
    user.ensure_active()
}
