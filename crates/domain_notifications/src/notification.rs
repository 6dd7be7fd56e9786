//! In-app notification records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{NotificationId, UserId};

use crate::error::NotificationError;
use crate::kind::NotificationKind;
use crate::render::{render, MessageArgs};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub notification_type: NotificationKind,
    pub title: String,
    pub message: String,
    /// Front-end route opened when the notification is clicked
    pub action_url: String,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Renders `kind` in the recipient's language
    pub fn compose(
        user_id: UserId,
        kind: NotificationKind,
        language: &str,
        args: &MessageArgs,
        action_url: impl Into<String>,
    ) -> Result<Self, NotificationError> {
        let rendered = render(kind, language, args)?;
        Ok(Self::new(user_id, kind, rendered.title, rendered.message, action_url))
    }

    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        action_url: impl Into<String>,
    ) -> Self {
        Self {
            id: NotificationId::new_v7(),
            user_id,
            notification_type: kind,
            title: truncate(title.into(), 200),
            message: message.into(),
            action_url: truncate(action_url.into(), 500),
            read: false,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    /// Staff broadcast to a single user
    pub fn system_message(
        user_id: UserId,
        title: &str,
        message: &str,
        action_url: Option<String>,
    ) -> Result<Self, NotificationError> {
        if title.trim().is_empty() || message.trim().is_empty() {
            return Err(NotificationError::Validation("Title and message are required".into()));
        }
        Ok(Self::new(
            user_id,
            NotificationKind::SystemMessage,
            title.trim(),
            message.trim(),
            action_url.unwrap_or_default(),
        ))
    }

    /// Returns false if it was already read
    pub fn mark_as_read(&mut self) -> bool {
        if self.read {
            return false;
        }
        self.read = true;
        self.read_at = Some(Utc::now());
        true
    }
}

fn truncate(mut value: String, max_chars: usize) -> String {
    if let Some((idx, _)) = value.char_indices().nth(max_chars) {
        value.truncate(idx);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_renders_in_language() {
        let args = MessageArgs::new().with("claim_number", "CLM-2024-000001");
        let n = Notification::compose(UserId::new(), NotificationKind::ClaimSubmitted, "sw", &args, "/claims/1")
            .unwrap();
        assert_eq!(n.title, "Dai Limewasilishwa");
        assert!(!n.read);
    }

    #[test]
    fn test_mark_as_read_once() {
        let mut n = Notification::system_message(UserId::new(), "Maintenance", "Downtime at 2am", None).unwrap();
        assert!(n.mark_as_read());
        let first = n.read_at;
        assert!(!n.mark_as_read());
        assert_eq!(n.read_at, first);
    }

    #[test]
    fn test_long_title_truncated() {
        let n = Notification::new(UserId::new(), NotificationKind::SystemMessage, "x".repeat(300), "m", "");
        assert_eq!(n.title.chars().count(), 200);
    }
}
