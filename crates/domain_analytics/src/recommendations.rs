//! Customer dashboard recommendations

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Days ahead within which an active policy counts as expiring
pub const EXPIRY_HORIZON_DAYS: i64 = 30;

const HEALTH_CATEGORY: &str = "health";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub id: &'static str,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub action: &'static str,
    pub link: &'static str,
}

/// What the recommender needs to know about one of the customer's
/// active policies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldPolicy {
    pub end_date: NaiveDate,
    pub category_slug: String,
}

impl HeldPolicy {
    fn expires_soon(&self, today: NaiveDate) -> bool {
        let days = (self.end_date - today).num_days();
        (0..=EXPIRY_HORIZON_DAYS).contains(&days)
    }
}

/// Builds the recommendation list, highest priority first
///
/// `active` holds the customer's active policies and `overdue_installments`
/// counts unpaid installments already past due.
pub fn recommend(active: &[HeldPolicy], overdue_installments: usize, today: NaiveDate) -> Vec<Recommendation> {
    let mut out = Vec::new();

    let expiring = active.iter().filter(|p| p.expires_soon(today)).count();
    if expiring > 0 {
        out.push(Recommendation {
            id: "renew-policy",
            priority: Priority::High,
            title: "Renew Expiring Policies".into(),
            description: format!(
                "You have {} {} expiring soon. Renew now to avoid coverage gaps.",
                expiring,
                if expiring == 1 { "policy" } else { "policies" }
            ),
            action: "Renew Now",
            link: "/dashboard/my-policies",
        });
    }

    if overdue_installments > 0 {
        out.push(Recommendation {
            id: "overdue-payments",
            priority: Priority::High,
            title: "Overdue Payments".into(),
            description: format!(
                "You have {} overdue {}. Pay now to keep your coverage active.",
                overdue_installments,
                if overdue_installments == 1 { "payment" } else { "payments" }
            ),
            action: "Pay Now",
            link: "/dashboard/payments",
        });
    }

    if !active.iter().any(|p| p.category_slug == HEALTH_CATEGORY) {
        out.push(Recommendation {
            id: "get-health",
            priority: Priority::Medium,
            title: "Protect Your Health".into(),
            description: "Consider adding health insurance to your portfolio for comprehensive coverage."
                .into(),
            action: "Browse Health Plans",
            link: "/policies?category=health",
        });
    }

    if let Some(first) = active.first() {
        if active.iter().all(|p| p.category_slug == first.category_slug) {
            out.push(Recommendation {
                id: "diversify",
                priority: Priority::Low,
                title: "Diversify Your Coverage".into(),
                description: "Protect different aspects of your life with our range of insurance products."
                    .into(),
                action: "Explore Products",
                link: "/policies",
            });
        }
    }

    out.sort_by_key(|r| r.priority);
    out
}
