//! Password policy, hashing, and reset tokens

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::UserError;

/// Rules a new password must satisfy
#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { min_length: 8 }
    }
}

impl PasswordPolicy {
    /// Checks length, rejects all-digit passwords, and requires both a
    /// letter and a digit
    pub fn check(&self, password: &str) -> Result<(), UserError> {
        if password.chars().count() < self.min_length {
            return Err(UserError::WeakPassword(format!(
                "must be at least {} characters",
                self.min_length
            )));
        }
        if password.chars().all(|c| c.is_ascii_digit()) {
            return Err(UserError::WeakPassword("cannot be entirely numeric".into()));
        }
        let has_letter = password.chars().any(|c| c.is_alphabetic());
        let has_digit = password.chars().any(|c| c.is_ascii_digit());
        if !(has_letter && has_digit) {
            return Err(UserError::WeakPassword(
                "must contain at least one letter and one digit".into(),
            ));
        }
        Ok(())
    }
}

/// Hashes a password into an Argon2id PHC string
pub fn hash_password(password: &str) -> Result<String, UserError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::Hashing(e.to_string()))
}

/// Verifies a password against a stored PHC string
///
/// Malformed hashes verify as false rather than erroring, so a corrupt row
/// cannot be distinguished from a wrong password by the caller.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// A single-use password reset token
///
/// Only the SHA-256 digest is persisted; the plain token is handed to the
/// delivery channel once.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub token: String,
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    /// Generates a 256-bit random token valid for `ttl`
    pub fn generate(ttl: Duration) -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        let digest = Self::digest_of(&token);
        Self {
            token,
            digest,
            expires_at: Utc::now() + ttl,
        }
    }

    /// Digest used to look up a presented token
    pub fn digest_of(token: &str) -> String {
        hex::encode(Sha256::digest(token.trim().as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_accepts_reasonable_password() {
        assert!(PasswordPolicy::default().check("safari2024").is_ok());
    }

    #[test]
    fn test_policy_rejects_short_numeric_and_letter_only() {
        let policy = PasswordPolicy::default();
        assert!(policy.check("ab1").is_err());
        assert!(policy.check("1234567890").is_err());
        assert!(policy.check("onlyletters").is_err());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("safari2024").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("safari2024", &hash));
        assert!(!verify_password("safari2025", &hash));
    }

    #[test]
    fn test_verify_with_garbage_hash_is_false() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_reset_token_digest_matches() {
        let token = ResetToken::generate(Duration::hours(1));
        assert_eq!(token.token.len(), 64);
        assert_eq!(ResetToken::digest_of(&token.token), token.digest);
        assert_ne!(token.token, token.digest);
        assert!(token.expires_at > Utc::now());
    }
}
