//! Unit tests for the user accounts domain
//!
//! Covers registration, login, password changes, roles and preferences.

use domain_users::{
    authenticate, hash_password, NotificationChannel, NotificationPreference, NotificationTopic,
    PasswordChange, PasswordPolicy, PasswordResetConfirm, PreferenceUpdate, Registration, Role,
    User, UserError,
};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;

fn registration(password: &str, password2: &str) -> Registration {
    Registration {
        email: SafeEmail().fake(),
        password: password.to_string(),
        password2: password2.to_string(),
        first_name: FirstName().fake(),
        last_name: LastName().fake(),
        phone_number: Some("0712345678".to_string()),
    }
}

mod registration_tests {
    use super::*;

    #[test]
    fn test_registration_creates_customer() {
        let user = registration("mombasa2024", "mombasa2024")
            .into_user(&PasswordPolicy::default())
            .unwrap();
        assert_eq!(user.role, Role::Customer);
        assert!(user.is_active);
        assert_ne!(user.password_hash, "mombasa2024");
        assert_eq!(user.phone_number.as_deref(), Some("0712345678"));
    }

    #[test]
    fn test_registration_rejects_mismatched_passwords() {
        let result = registration("mombasa2024", "mombasa2025").into_user(&PasswordPolicy::default());
        assert_eq!(result.unwrap_err(), UserError::PasswordMismatch);
    }

    #[test]
    fn test_registration_rejects_weak_password() {
        let result = registration("12345678", "12345678").into_user(&PasswordPolicy::default());
        assert!(matches!(result, Err(UserError::WeakPassword(_))));
    }

    #[test]
    fn test_registration_rejects_bad_email() {
        let mut form = registration("mombasa2024", "mombasa2024");
        form.email = "not-an-email".into();
        let result = form.into_user(&PasswordPolicy::default());
        assert!(matches!(result, Err(UserError::Validation(_))));
    }
}

mod login_tests {
    use super::*;

    fn account(password: &str) -> User {
        User::new("amina@example.com", hash_password(password).unwrap(), "Amina", "Otieno", Role::Customer)
    }

    #[test]
    fn test_correct_password_authenticates() {
        let user = account("kisumu2024");
        assert!(authenticate(Some(&user), "kisumu2024").is_ok());
    }

    #[test]
    fn test_unknown_user_and_wrong_password_look_the_same() {
        let user = account("kisumu2024");
        assert_eq!(authenticate(None, "kisumu2024"), Err(UserError::InvalidCredentials));
        assert_eq!(authenticate(Some(&user), "nakuru2024"), Err(UserError::InvalidCredentials));
    }

    #[test]
    fn test_suspended_user_cannot_log_in() {
        let mut user = account("kisumu2024");
        user.suspend();
        assert_eq!(authenticate(Some(&user), "kisumu2024"), Err(UserError::AccountDisabled));
    }
}

mod password_change_tests {
    use super::*;

    #[test]
    fn test_change_requires_old_password() {
        let user = User::new("a@b.co", hash_password("eldoret2024").unwrap(), "A", "B", Role::Customer);
        let change = PasswordChange {
            old_password: "wrong1234".into(),
            new_password: "thika2025x".into(),
            new_password2: "thika2025x".into(),
        };
        assert_eq!(change.apply(&user, &PasswordPolicy::default()), Err(UserError::IncorrectOldPassword));
    }

    #[test]
    fn test_change_returns_new_hash() {
        let user = User::new("a@b.co", hash_password("eldoret2024").unwrap(), "A", "B", Role::Customer);
        let change = PasswordChange {
            old_password: "eldoret2024".into(),
            new_password: "thika2025x".into(),
            new_password2: "thika2025x".into(),
        };
        let hash = change.apply(&user, &PasswordPolicy::default()).unwrap();
        assert!(domain_users::verify_password("thika2025x", &hash));
    }

    #[test]
    fn test_reset_confirm_checks_pair() {
        let confirm = PasswordResetConfirm {
            token: "abc".into(),
            new_password: "thika2025x".into(),
            new_password2: "thika2025y".into(),
        };
        assert_eq!(confirm.new_hash(&PasswordPolicy::default()), Err(UserError::PasswordMismatch));
    }
}

mod role_tests {
    use super::*;

    #[test]
    fn test_role_capabilities() {
        assert!(Role::Admin.is_staff());
        assert!(Role::Staff.is_staff());
        assert!(!Role::Assessor.is_staff());
        assert!(Role::Assessor.can_assess_claims());
        assert!(!Role::Customer.can_assess_claims());
        assert!(Role::Admin.can_manage_roles());
        assert!(!Role::Staff.can_manage_roles());
    }

    #[test]
    fn test_role_parse_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }
}

mod preference_tests {
    use super::*;
    use core_kernel::UserId;

    #[test]
    fn test_disabling_in_app_blocks_every_topic() {
        let mut prefs = NotificationPreference::defaults_for(UserId::new());
        prefs
            .apply(PreferenceUpdate { in_app_enabled: Some(false), ..Default::default() })
            .unwrap();
        assert!(!prefs.allows(NotificationChannel::InApp, NotificationTopic::PolicyUpdates));
        assert!(!prefs.allows(NotificationChannel::InApp, NotificationTopic::ClaimUpdates));
        assert!(prefs.allows(NotificationChannel::Email, NotificationTopic::ClaimUpdates));
    }

    #[test]
    fn test_sms_marketing_is_never_allowed() {
        let prefs = NotificationPreference::defaults_for(UserId::new());
        assert!(!prefs.allows(NotificationChannel::Sms, NotificationTopic::Marketing));
    }
}
