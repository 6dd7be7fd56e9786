//! Analytics and customer dashboard bodies

use rust_decimal::Decimal;
use serde::Serialize;

use domain_analytics::{MonthlyPoint, Recommendation, UserActivity};
use domain_billing::PaymentSchedule;
use domain_policy::Policy;
use infra_db::{Breakdown, CustomerStats, PlatformTotals};

#[derive(Debug, Serialize)]
pub struct AnalyticsDashboard {
    #[serde(flatten)]
    pub totals: PlatformTotals,
    pub users_growth: Decimal,
    pub policies_growth: Decimal,
    pub revenue_growth: Decimal,
}

#[derive(Debug, Serialize)]
pub struct RevenueAnalytics {
    pub total: Decimal,
    pub monthly: Vec<MonthlyPoint>,
}

#[derive(Debug, Serialize)]
pub struct ClaimsAnalytics {
    pub by_status: Vec<Breakdown>,
    pub by_type: Vec<Breakdown>,
    pub total_claims: i64,
    pub approved_claims: i64,
    pub approval_rate: Decimal,
}

#[derive(Debug, Serialize)]
pub struct UserAnalytics {
    pub by_role: Vec<Breakdown>,
    pub monthly_new_users: Vec<MonthlyPoint>,
}

#[derive(Debug, Serialize)]
pub struct PolicyAnalytics {
    pub by_category: Vec<Breakdown>,
    pub by_status: Vec<Breakdown>,
    pub by_company: Vec<Breakdown>,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    #[serde(flatten)]
    pub figures: CustomerStats,
    pub next_payment: Option<PaymentSchedule>,
}

/// Every dashboard section in one response
#[derive(Debug, Serialize)]
pub struct DashboardOverview {
    pub stats: DashboardStats,
    pub recent_activity: Vec<UserActivity>,
    pub recommendations: Vec<Recommendation>,
    pub upcoming_payments: Vec<PaymentSchedule>,
    pub expiring_policies: Vec<Policy>,
}
