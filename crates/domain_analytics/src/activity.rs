//! User activity trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use core_kernel::{ActivityId, UserId};

use crate::error::AnalyticsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Login,
    Logout,
    ViewPolicy,
    PurchasePolicy,
    FileClaim,
    MakePayment,
    DownloadDocument,
}

impl ActivityAction {
    pub const ALL: [ActivityAction; 7] = [
        ActivityAction::Login,
        ActivityAction::Logout,
        ActivityAction::ViewPolicy,
        ActivityAction::PurchasePolicy,
        ActivityAction::FileClaim,
        ActivityAction::MakePayment,
        ActivityAction::DownloadDocument,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Login => "login",
            ActivityAction::Logout => "logout",
            ActivityAction::ViewPolicy => "view_policy",
            ActivityAction::PurchasePolicy => "purchase_policy",
            ActivityAction::FileClaim => "file_claim",
            ActivityAction::MakePayment => "make_payment",
            ActivityAction::DownloadDocument => "download_document",
        }
    }

    /// Human title shown in the customer's activity feed
    pub fn title(&self) -> &'static str {
        match self {
            ActivityAction::Login => "Signed In",
            ActivityAction::Logout => "Signed Out",
            ActivityAction::ViewPolicy => "Viewed Policy",
            ActivityAction::PurchasePolicy => "New Policy Created",
            ActivityAction::FileClaim => "Claim Submitted",
            ActivityAction::MakePayment => "Payment Processed",
            ActivityAction::DownloadDocument => "Document Downloaded",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| AnalyticsError::UnknownAction(s.to_string()))
    }
}

/// One recorded action. `user_id` is empty for anonymous events such as a
/// failed login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserActivity {
    pub id: ActivityId,
    pub user_id: Option<UserId>,
    pub action: ActivityAction,
    pub resource_type: String,
    pub resource_id: String,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub metadata: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl UserActivity {
    pub fn record(user_id: Option<UserId>, action: ActivityAction) -> Self {
        Self {
            id: ActivityId::new_v7(),
            user_id,
            action,
            resource_type: String::new(),
            resource_id: String::new(),
            ip_address: None,
            user_agent: String::new(),
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn on(mut self, resource_type: &str, resource_id: impl ToString) -> Self {
        self.resource_type = resource_type.to_string();
        self.resource_id = resource_id.to_string();
        self
    }

    pub fn from_client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address.filter(|ip| !ip.is_empty());
        self.user_agent = user_agent.unwrap_or_default();
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parse() {
        assert_eq!("file_claim".parse::<ActivityAction>().unwrap(), ActivityAction::FileClaim);
        assert!("teleport".parse::<ActivityAction>().is_err());
    }

    #[test]
    fn test_builder_sets_resource_and_client() {
        let activity = UserActivity::record(Some(UserId::new()), ActivityAction::ViewPolicy)
            .on("policy", "POL-2024-000001")
            .from_client(Some(String::new()), Some("curl/8.0".into()))
            .with_metadata("source", "web");
        assert_eq!(activity.resource_type, "policy");
        assert_eq!(activity.resource_id, "POL-2024-000001");
        assert!(activity.ip_address.is_none());
        assert_eq!(activity.user_agent, "curl/8.0");
        assert_eq!(activity.metadata["source"], "web");
    }
}
