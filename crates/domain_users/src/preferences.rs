//! Per-user notification preferences

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::UserId;
use crate::error::UserError;

/// Languages notifications can be rendered in
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "sw"];

/// Delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Sms,
    WhatsApp,
    InApp,
}

/// What a notification is about, for opt-in purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTopic {
    PolicyUpdates,
    PaymentReminders,
    ClaimUpdates,
    Marketing,
}

/// Opt-in flags per channel and topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub user_id: UserId,
    pub email_policy_updates: bool,
    pub email_payment_reminders: bool,
    pub email_claim_updates: bool,
    pub email_marketing: bool,
    pub sms_policy_updates: bool,
    pub sms_payment_reminders: bool,
    pub sms_claim_updates: bool,
    pub whatsapp_enabled: bool,
    pub in_app_enabled: bool,
    pub preferred_language: String,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreference {
    /// Defaults created at registration: everything on except marketing and WhatsApp
    pub fn defaults_for(user_id: UserId) -> Self {
        Self {
            user_id,
            email_policy_updates: true,
            email_payment_reminders: true,
            email_claim_updates: true,
            email_marketing: false,
            sms_policy_updates: true,
            sms_payment_reminders: true,
            sms_claim_updates: true,
            whatsapp_enabled: false,
            in_app_enabled: true,
            preferred_language: "en".to_string(),
            updated_at: Utc::now(),
        }
    }

    /// Whether a message on `topic` may be sent over `channel`
    pub fn allows(&self, channel: NotificationChannel, topic: NotificationTopic) -> bool {
        use NotificationChannel::*;
        use NotificationTopic::*;
        match (channel, topic) {
            (InApp, _) => self.in_app_enabled,
            (WhatsApp, Marketing) => false,
            (WhatsApp, _) => self.whatsapp_enabled,
            (Email, PolicyUpdates) => self.email_policy_updates,
            (Email, PaymentReminders) => self.email_payment_reminders,
            (Email, ClaimUpdates) => self.email_claim_updates,
            (Email, Marketing) => self.email_marketing,
            (Sms, PolicyUpdates) => self.sms_policy_updates,
            (Sms, PaymentReminders) => self.sms_payment_reminders,
            (Sms, ClaimUpdates) => self.sms_claim_updates,
            (Sms, Marketing) => false,
        }
    }

    /// Applies a partial update
    pub fn apply(&mut self, update: PreferenceUpdate) -> Result<(), UserError> {
        update
            .validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        let language = match &update.preferred_language {
            Some(language) => {
                let language = language.to_ascii_lowercase();
                if !SUPPORTED_LANGUAGES.contains(&language.as_str()) {
                    return Err(UserError::Validation(format!("Unsupported language: {}", language)));
                }
                Some(language)
            }
            None => None,
        };

        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(v) = update.$field { self.$field = v; })*
            };
        }
        set!(
            email_policy_updates,
            email_payment_reminders,
            email_claim_updates,
            email_marketing,
            sms_policy_updates,
            sms_payment_reminders,
            sms_claim_updates,
            whatsapp_enabled,
            in_app_enabled
        );

        if let Some(language) = language {
            self.preferred_language = language;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Partial update of preferences
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PreferenceUpdate {
    pub email_policy_updates: Option<bool>,
    pub email_payment_reminders: Option<bool>,
    pub email_claim_updates: Option<bool>,
    pub email_marketing: Option<bool>,
    pub sms_policy_updates: Option<bool>,
    pub sms_payment_reminders: Option<bool>,
    pub sms_claim_updates: Option<bool>,
    pub whatsapp_enabled: Option<bool>,
    pub in_app_enabled: Option<bool>,
    #[validate(length(min = 2, max = 8))]
    pub preferred_language: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let prefs = NotificationPreference::defaults_for(UserId::new());
        assert!(prefs.allows(NotificationChannel::InApp, NotificationTopic::ClaimUpdates));
        assert!(prefs.allows(NotificationChannel::Email, NotificationTopic::PaymentReminders));
        assert!(!prefs.allows(NotificationChannel::Email, NotificationTopic::Marketing));
        assert!(!prefs.allows(NotificationChannel::WhatsApp, NotificationTopic::PolicyUpdates));
        assert_eq!(prefs.preferred_language, "en");
    }

    #[test]
    fn test_partial_update_only_touches_given_fields() {
        let mut prefs = NotificationPreference::defaults_for(UserId::new());
        prefs
            .apply(PreferenceUpdate {
                in_app_enabled: Some(false),
                preferred_language: Some("SW".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(!prefs.in_app_enabled);
        assert_eq!(prefs.preferred_language, "sw");
        assert!(prefs.email_claim_updates);
    }

    #[test]
    fn test_unsupported_language_rejected() {
        let mut prefs = NotificationPreference::defaults_for(UserId::new());
        let result = prefs.apply(PreferenceUpdate {
            preferred_language: Some("fr".into()),
            ..Default::default()
        });
        assert!(result.is_err());
        assert_eq!(prefs.preferred_language, "en");
    }
}
