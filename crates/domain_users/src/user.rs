//! User aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::UserId;
use crate::error::UserError;
use crate::role::Role;

/// A brokerage user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Login identity, stored lower-cased
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    /// National ID or passport number
    pub id_number: Option<String>,
    /// Kenya Revenue Authority personal identification number
    pub kra_pin: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Creates an active user with an already-hashed password
    pub fn new(
        email: &str,
        password_hash: String,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        role: Role,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new_v7(),
            email: normalize_email(email),
            password_hash,
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone_number: None,
            id_number: None,
            kra_pin: None,
            role,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Fails for suspended accounts
    pub fn ensure_active(&self) -> Result<(), UserError> {
        if self.is_active {
            Ok(())
        } else {
            Err(UserError::AccountDisabled)
        }
    }

    pub fn record_login(&mut self) {
        let now = Utc::now();
        self.last_login = Some(now);
        self.updated_at = now;
    }

    pub fn suspend(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }

    pub fn activate(&mut self) {
        self.is_active = true;
        self.updated_at = Utc::now();
    }

    pub fn change_role(&mut self, role: Role) {
        self.role = role;
        self.updated_at = Utc::now();
    }

    /// Applies a validated profile update; absent fields are left alone
    pub fn apply_profile_update(&mut self, update: ProfileUpdate) -> Result<(), UserError> {
        update
            .validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        if let Some(first_name) = update.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            self.last_name = last_name;
        }
        if let Some(phone) = update.phone_number {
            self.phone_number = non_blank(phone);
        }
        if let Some(id_number) = update.id_number {
            self.id_number = non_blank(id_number);
        }
        if let Some(kra_pin) = update.kra_pin {
            self.kra_pin = non_blank(kra_pin.to_ascii_uppercase());
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Editable profile fields
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 150))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 150))]
    pub last_name: Option<String>,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
    #[validate(length(max = 50))]
    pub id_number: Option<String>,
    #[validate(length(max = 50))]
    pub kra_pin: Option<String>,
}

/// Lower-cases and trims an e-mail address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new(" Jane@Example.COM ", "hash".into(), "Jane", "Wanjiku", Role::Customer)
    }

    #[test]
    fn test_new_user_is_active_customer_with_normalized_email() {
        let u = user();
        assert_eq!(u.email, "jane@example.com");
        assert!(u.is_active);
        assert_eq!(u.role, Role::Customer);
        assert_eq!(u.full_name(), "Jane Wanjiku");
    }

    #[test]
    fn test_suspended_user_is_not_active() {
        let mut u = user();
        u.suspend();
        assert_eq!(u.ensure_active(), Err(UserError::AccountDisabled));
        u.activate();
        assert!(u.ensure_active().is_ok());
    }

    #[test]
    fn test_profile_update_uppercases_kra_pin_and_clears_blanks() {
        let mut u = user();
        u.phone_number = Some("0712345678".into());
        u.apply_profile_update(ProfileUpdate {
            kra_pin: Some("a123456789z".into()),
            phone_number: Some("  ".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(u.kra_pin.as_deref(), Some("A123456789Z"));
        assert_eq!(u.phone_number, None);
        assert_eq!(u.first_name, "Jane");
    }

    #[test]
    fn test_profile_update_rejects_empty_name() {
        let mut u = user();
        let result = u.apply_profile_update(ProfileUpdate {
            first_name: Some(String::new()),
            ..Default::default()
        });
        assert!(matches!(result, Err(UserError::Validation(_))));
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let json = serde_json::to_value(user()).unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
