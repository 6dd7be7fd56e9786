//! Policy and review DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use core_kernel::{CompanyId, Money, PolicyTypeId};
use domain_billing::PaymentSchedule;
use domain_policy::{PaymentFrequency, Policy, PolicyStatus, PurchaseRequest, WorkflowStage};
use infra_db::PolicyFilter;

#[derive(Debug, Deserialize, Validate)]
pub struct PurchaseInput {
    pub policy_type_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub coverage_amount: Decimal,
    pub premium_amount: Option<Decimal>,
    #[serde(default)]
    pub payment_frequency: PaymentFrequency,
    pub policy_data: Option<Value>,
    pub beneficiaries: Option<Value>,
}

impl From<PurchaseInput> for PurchaseRequest {
    fn from(input: PurchaseInput) -> Self {
        PurchaseRequest {
            policy_type_id: PolicyTypeId::from_uuid(input.policy_type_id),
            start_date: input.start_date,
            end_date: input.end_date,
            coverage_amount: Money::kes(input.coverage_amount),
            premium_amount: input.premium_amount.map(Money::kes),
            payment_frequency: input.payment_frequency,
            policy_data: input.policy_data.unwrap_or_else(|| Value::Object(Default::default())),
            beneficiaries: input.beneficiaries.unwrap_or_else(|| Value::Array(Vec::new())),
        }
    }
}

/// A policy with its installments and workflow
#[derive(Debug, Serialize)]
pub struct PolicyDetail {
    #[serde(flatten)]
    pub policy: Policy,
    pub days_remaining: i64,
    pub payment_schedule: Vec<PaymentSchedule>,
    pub workflow: Vec<WorkflowStage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PolicyQuery {
    pub status: Option<PolicyStatus>,
    pub policy_type: Option<Uuid>,
    pub company: Option<Uuid>,
    pub search: Option<String>,
}

impl PolicyQuery {
    pub fn into_filter(self, user: Option<core_kernel::UserId>) -> PolicyFilter {
        PolicyFilter {
            user,
            status: self.status,
            policy_type: self.policy_type.map(PolicyTypeId::from_uuid),
            company: self.company.map(CompanyId::from_uuid),
            search: self.search.filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Longest look-ahead accepted for expiring policies
pub const MAX_EXPIRY_DAYS: i64 = 3650;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ExpiringQuery {
    #[validate(range(min = 0, max = 3650))]
    pub days: Option<i64>,
}

impl ExpiringQuery {
    /// Validated look-ahead in days, `default` when absent
    pub fn horizon(&self, default: i64) -> Result<i64, validator::ValidationErrors> {
        self.validate()?;
        Ok(self.days.unwrap_or(default).min(MAX_EXPIRY_DAYS))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewInput {
    pub policy_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewQuery {
    pub policy_type: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_horizon_defaults_when_absent() {
        assert_eq!(ExpiringQuery::default().horizon(30).unwrap(), 30);
        assert_eq!(ExpiringQuery { days: Some(90) }.horizon(30).unwrap(), 90);
    }

    #[test]
    fn test_expiry_horizon_is_bounded() {
        assert!(ExpiringQuery { days: Some(-1) }.horizon(30).is_err());
        assert!(ExpiringQuery { days: Some(MAX_EXPIRY_DAYS + 1) }.horizon(30).is_err());
        assert!(ExpiringQuery { days: Some(100_000_000) }.horizon(30).is_err());
        assert_eq!(ExpiringQuery { days: Some(MAX_EXPIRY_DAYS) }.horizon(30).unwrap(), MAX_EXPIRY_DAYS);
    }
}
