//! Notification kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NotificationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    PolicyIssued,
    PaymentReceived,
    PaymentDue,
    PaymentOverdue,
    ClaimSubmitted,
    ClaimStatusUpdate,
    ClaimApproved,
    ClaimRejected,
    ClaimSettled,
    PolicyExpiringSoon,
    PolicyRenewed,
    DocumentUploaded,
    DocumentVerified,
    SystemMessage,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 14] = [
        NotificationKind::PolicyIssued,
        NotificationKind::PaymentReceived,
        NotificationKind::PaymentDue,
        NotificationKind::PaymentOverdue,
        NotificationKind::ClaimSubmitted,
        NotificationKind::ClaimStatusUpdate,
        NotificationKind::ClaimApproved,
        NotificationKind::ClaimRejected,
        NotificationKind::ClaimSettled,
        NotificationKind::PolicyExpiringSoon,
        NotificationKind::PolicyRenewed,
        NotificationKind::DocumentUploaded,
        NotificationKind::DocumentVerified,
        NotificationKind::SystemMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PolicyIssued => "policy_issued",
            NotificationKind::PaymentReceived => "payment_received",
            NotificationKind::PaymentDue => "payment_due",
            NotificationKind::PaymentOverdue => "payment_overdue",
            NotificationKind::ClaimSubmitted => "claim_submitted",
            NotificationKind::ClaimStatusUpdate => "claim_status_update",
            NotificationKind::ClaimApproved => "claim_approved",
            NotificationKind::ClaimRejected => "claim_rejected",
            NotificationKind::ClaimSettled => "claim_settled",
            NotificationKind::PolicyExpiringSoon => "policy_expiring_soon",
            NotificationKind::PolicyRenewed => "policy_renewed",
            NotificationKind::DocumentUploaded => "document_uploaded",
            NotificationKind::DocumentVerified => "document_verified",
            NotificationKind::SystemMessage => "system_message",
        }
    }

    /// Fluent message id prefix, e.g. `claim-approved`
    pub fn message_id(&self) -> String {
        self.as_str().replace('_', "-")
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| NotificationError::UnknownKind(s.to_string()))
    }
}
