//! Tests for notification records and localized rendering

use core_kernel::UserId;
use domain_notifications::{
    negotiate, render, MessageArgs, Notification, NotificationError, NotificationKind,
};

mod kind_tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in NotificationKind::ALL {
            assert_eq!(kind.as_str().parse::<NotificationKind>().unwrap(), kind);
        }
        assert_eq!(
            "carrier_pigeon".parse::<NotificationKind>().unwrap_err(),
            NotificationError::UnknownKind("carrier_pigeon".into())
        );
    }

    #[test]
    fn test_fourteen_kinds() {
        assert_eq!(NotificationKind::ALL.len(), 14);
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_value(NotificationKind::PolicyExpiringSoon).unwrap();
        assert_eq!(json, "policy_expiring_soon");
    }
}

mod render_tests {
    use super::*;

    #[test]
    fn test_unsupported_language_uses_english() {
        assert_eq!(negotiate("de-DE"), "en");
        let args = MessageArgs::new().with("title", "Policy Draft");
        let rendered = render(NotificationKind::DocumentVerified, "de", &args).unwrap();
        assert_eq!(rendered.title, "Document Verified");
        assert!(rendered.message.contains("\"Policy Draft\""));
    }

    #[test]
    fn test_payment_received_swahili() {
        let args = MessageArgs::new()
            .with("amount", "1,500.00")
            .with("transaction_number", "TXN-2024-00000001");
        let rendered = render(NotificationKind::PaymentReceived, "sw", &args).unwrap();
        assert_eq!(rendered.title, "Malipo Yamepokelewa");
        assert!(rendered.message.contains("TXN-2024-00000001"));
    }

    #[test]
    fn test_system_message_passes_text_through() {
        let args = MessageArgs::new()
            .with("title", "Scheduled maintenance")
            .with("message", "The portal will be offline on Sunday.");
        let rendered = render(NotificationKind::SystemMessage, "en", &args).unwrap();
        assert_eq!(rendered.title, "Scheduled maintenance");
        assert_eq!(rendered.message, "The portal will be offline on Sunday.");
    }
}

mod record_tests {
    use super::*;

    #[test]
    fn test_system_message_requires_text() {
        assert!(Notification::system_message(UserId::new(), " ", "body", None).is_err());
        assert!(Notification::system_message(UserId::new(), "title", "", None).is_err());
    }

    #[test]
    fn test_new_notification_is_unread() {
        let n = Notification::system_message(UserId::new(), "Hello", "Welcome aboard", Some("/dashboard".into()))
            .unwrap();
        assert!(!n.read);
        assert!(n.read_at.is_none());
        assert_eq!(n.action_url, "/dashboard");
        assert_eq!(n.notification_type, NotificationKind::SystemMessage);
    }
}
