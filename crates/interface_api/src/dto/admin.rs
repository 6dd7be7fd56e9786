//! Back-office DTOs

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use core_kernel::{CategoryId, CompanyId, Money};
use domain_analytics::MonthlyPoint;
use domain_billing::Transaction;
use domain_claims::Claim;
use domain_policy::{InsuranceCompany, PolicyCategory, PolicyType};
use domain_users::Role;
use infra_db::{Breakdown, CustomerSummary, ReportRange, UserFilter};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    pub role: Option<Role>,
    pub status: Option<AccountStatus>,
}

impl From<UserQuery> for UserFilter {
    fn from(q: UserQuery) -> Self {
        UserFilter {
            search: q.search.filter(|s| !s.trim().is_empty()),
            role: q.role,
            is_active: q.status.map(|s| s == AccountStatus::Active),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompanyInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub logo: Option<String>,
    #[serde(default)]
    pub rating: Decimal,
    #[serde(default)]
    pub description: String,
    #[validate(email)]
    pub contact_email: String,
    #[serde(default)]
    pub contact_phone: String,
    #[validate(url)]
    pub website: Option<String>,
    #[serde(default = "yes")]
    pub is_active: bool,
}

impl CompanyInput {
    /// Copies the input onto `company`, keeping its id and timestamps
    pub fn apply(self, company: &mut InsuranceCompany) {
        company.name = self.name.trim().to_string();
        company.logo = self.logo;
        company.rating = self.rating;
        company.description = self.description;
        company.contact_email = self.contact_email;
        company.contact_phone = self.contact_phone;
        company.website = self.website;
        company.is_active = self.is_active;
        company.updated_at = chrono::Utc::now();
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Derived from the name when absent
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub icon: Option<String>,
    #[serde(default)]
    pub display_order: i32,
    #[serde(default = "yes")]
    pub is_active: bool,
}

impl CategoryInput {
    pub fn apply(self, category: &mut PolicyCategory) {
        category.slug = self
            .slug
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| domain_policy::slugify(&self.name));
        category.name = self.name.trim().to_string();
        category.description = self.description;
        category.icon = self.icon;
        category.display_order = self.display_order;
        category.is_active = self.is_active;
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct TypeInput {
    pub category_id: Uuid,
    pub insurance_company_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_premium: Decimal,
    pub coverage_details: Option<Value>,
    pub features: Option<Value>,
    pub exclusions: Option<Value>,
    pub requirements: Option<Value>,
    #[serde(default)]
    pub terms_and_conditions: String,
    pub min_coverage_amount: Option<Decimal>,
    pub max_coverage_amount: Option<Decimal>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    #[serde(default = "yes")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
}

impl TypeInput {
    pub fn category_id(&self) -> CategoryId {
        CategoryId::from_uuid(self.category_id)
    }

    pub fn company_id(&self) -> CompanyId {
        CompanyId::from_uuid(self.insurance_company_id)
    }

    /// Copies the input onto `policy_type`; the slug is left to the caller
    pub fn apply(self, policy_type: &mut PolicyType) {
        policy_type.category_id = CategoryId::from_uuid(self.category_id);
        policy_type.insurance_company_id = CompanyId::from_uuid(self.insurance_company_id);
        policy_type.name = self.name.trim().to_string();
        policy_type.description = self.description;
        policy_type.base_premium = Money::kes(self.base_premium);
        if let Some(v) = self.coverage_details {
            policy_type.coverage_details = v;
        }
        if let Some(v) = self.features {
            policy_type.features = v;
        }
        if let Some(v) = self.exclusions {
            policy_type.exclusions = v;
        }
        if let Some(v) = self.requirements {
            policy_type.requirements = v;
        }
        policy_type.terms_and_conditions = self.terms_and_conditions;
        policy_type.min_coverage_amount = self.min_coverage_amount.map(Money::kes);
        policy_type.max_coverage_amount = self.max_coverage_amount.map(Money::kes);
        policy_type.min_age = self.min_age;
        policy_type.max_age = self.max_age;
        policy_type.is_active = self.is_active;
        policy_type.is_featured = self.is_featured;
        policy_type.updated_at = chrono::Utc::now();
    }
}

fn yes() -> bool {
    true
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct ReportQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Years a report may reach back or forward to
const REPORT_YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;

impl ReportQuery {
    /// The report window, refusing dates out of order or beyond four-digit years
    pub fn range(self) -> Result<ReportRange, ApiError> {
        for (field, date) in [("date_from", self.date_from), ("date_to", self.date_to)] {
            if let Some(d) = date {
                if !REPORT_YEARS.contains(&d.year()) {
                    return Err(ApiError::validation(format!("{} is out of range", field)));
                }
            }
        }
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(ApiError::validation("date_from must not be after date_to"));
            }
        }
        Ok(ReportRange::new(self.date_from, self.date_to))
    }
}

/// Current value, growth against the previous window
#[derive(Debug, Serialize)]
pub struct MetricCard {
    pub value: Decimal,
    pub growth: Decimal,
}

#[derive(Debug, Serialize)]
pub struct DashboardMetrics {
    pub total_customers: MetricCard,
    pub active_policies: MetricCard,
    pub revenue_30_days: MetricCard,
    pub pending_claims: MetricCard,
}

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub metrics: DashboardMetrics,
    pub recent_transactions: Vec<Transaction>,
    pub recent_customers: Vec<CustomerSummary>,
    pub pending_tasks: Vec<Claim>,
}

#[derive(Debug, Serialize)]
pub struct SalesReport {
    pub total_policies: i64,
    pub total_premium: Decimal,
    pub by_category: Vec<Breakdown>,
}

#[derive(Debug, Serialize)]
pub struct RevenueReport {
    pub total_revenue: Decimal,
    pub transaction_count: i64,
    pub monthly: Vec<MonthlyPoint>,
}

#[derive(Debug, Serialize)]
pub struct ClaimsReport {
    pub by_status: Vec<Breakdown>,
    pub approved_count: i64,
    pub total_approved: Decimal,
    pub average_approved: Decimal,
    pub total_premium: Decimal,
    /// Approved claim amounts as a percentage of written premium
    pub claims_ratio: Decimal,
}

#[derive(Debug, Serialize)]
pub struct UserGrowthReport {
    pub monthly: Vec<MonthlyPoint>,
    pub by_role: Vec<Breakdown>,
}

#[derive(Debug, Serialize)]
pub struct RoleInfo {
    pub role: Role,
    pub description: &'static str,
}
