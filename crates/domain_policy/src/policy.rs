//! Policy aggregate
//!
//! # Lifecycle
//!
//! ```text
//! pending -> active -> expired
//!    |         |  \-> suspended -> active
//!    |         |            \-> cancelled
//!    \---------+-> cancelled
//! ```
//!
//! `expired` and `cancelled` are terminal. A purchase always starts in
//! `pending`; staff activate it once the first premium is in.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use core_kernel::{
    calendar, reference, CompanyId, DateRange, Money, PolicyId, PolicyTypeId, ReferenceKind,
    UserId,
};

use crate::catalog::PolicyType;
use crate::error::PolicyError;

/// Policy status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    #[default]
    Pending,
    Active,
    Expired,
    Cancelled,
    Suspended,
}

impl PolicyStatus {
    pub const ALL: [PolicyStatus; 5] = [
        PolicyStatus::Pending,
        PolicyStatus::Active,
        PolicyStatus::Expired,
        PolicyStatus::Cancelled,
        PolicyStatus::Suspended,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Pending => "pending",
            PolicyStatus::Active => "active",
            PolicyStatus::Expired => "expired",
            PolicyStatus::Cancelled => "cancelled",
            PolicyStatus::Suspended => "suspended",
        }
    }

    /// Checks whether moving to `to` is allowed
    pub fn can_transition_to(&self, to: PolicyStatus) -> bool {
        use PolicyStatus::*;
        matches!(
            (self, to),
            (Pending, Active)
                | (Pending, Cancelled)
                | (Active, Expired)
                | (Active, Cancelled)
                | (Active, Suspended)
                | (Suspended, Active)
                | (Suspended, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PolicyStatus::Expired | PolicyStatus::Cancelled)
    }
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyStatus {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| PolicyError::validation(format!("Unknown policy status: {}", s)))
    }
}

/// How often premiums are collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFrequency {
    #[default]
    Annual,
    SemiAnnual,
    Quarterly,
    Monthly,
}

impl PaymentFrequency {
    /// Number of installments the premium is split into
    pub fn installments(&self) -> u32 {
        match self {
            PaymentFrequency::Annual => 1,
            PaymentFrequency::SemiAnnual => 2,
            PaymentFrequency::Quarterly => 4,
            PaymentFrequency::Monthly => 12,
        }
    }

    /// Months between consecutive installments
    pub fn interval_months(&self) -> u32 {
        12 / self.installments()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentFrequency::Annual => "annual",
            PaymentFrequency::SemiAnnual => "semi_annual",
            PaymentFrequency::Quarterly => "quarterly",
            PaymentFrequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for PaymentFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentFrequency {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "annual" => Ok(PaymentFrequency::Annual),
            "semi_annual" => Ok(PaymentFrequency::SemiAnnual),
            "quarterly" => Ok(PaymentFrequency::Quarterly),
            "monthly" => Ok(PaymentFrequency::Monthly),
            other => Err(PolicyError::validation(format!("Unknown payment frequency: {}", other))),
        }
    }
}

/// A customer's request to buy a policy type
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub policy_type_id: PolicyTypeId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub coverage_amount: Money,
    /// Falls back to the type's base premium
    pub premium_amount: Option<Money>,
    pub payment_frequency: PaymentFrequency,
    pub policy_data: Value,
    pub beneficiaries: Value,
}

/// An insurance policy held by a customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: PolicyId,
    pub policy_number: String,
    pub user_id: UserId,
    pub policy_type_id: PolicyTypeId,
    pub insurance_company_id: CompanyId,
    pub status: PolicyStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub premium_amount: Money,
    pub coverage_amount: Money,
    pub payment_frequency: PaymentFrequency,
    pub policy_data: Value,
    pub beneficiaries: Value,
    pub certificate_url: Option<String>,
    pub policy_document_url: Option<String>,
    pub renewed_from: Option<PolicyId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl Policy {
    /// Builds a pending policy from a purchase request
    ///
    /// The type must be open for purchase, the period non-empty and the
    /// coverage inside the type's bounds.
    pub fn purchase(
        user_id: UserId,
        policy_type: &PolicyType,
        request: PurchaseRequest,
    ) -> Result<Self, PolicyError> {
        if policy_type.id != request.policy_type_id {
            return Err(PolicyError::validation("Policy type mismatch"));
        }
        if !policy_type.is_purchasable() {
            return Err(PolicyError::NotPurchasable(policy_type.name.clone()));
        }
        let period = DateRange::new(request.start_date, request.end_date)
            .map_err(|_| PolicyError::validation("End date must be after start date"))?;
        policy_type.check_coverage(&request.coverage_amount)?;

        let premium = request.premium_amount.unwrap_or(policy_type.base_premium);
        if premium.is_negative() {
            return Err(PolicyError::validation("Premium amount cannot be negative"));
        }

        let now = Utc::now();
        Ok(Self {
            id: PolicyId::new_v7(),
            policy_number: reference::generate(ReferenceKind::Policy, calendar::year_of(now)),
            user_id,
            policy_type_id: policy_type.id,
            insurance_company_id: policy_type.insurance_company_id,
            status: PolicyStatus::Pending,
            start_date: period.start(),
            end_date: period.end(),
            premium_amount: premium.round_to_currency(),
            coverage_amount: request.coverage_amount.round_to_currency(),
            payment_frequency: request.payment_frequency,
            policy_data: request.policy_data,
            beneficiaries: request.beneficiaries,
            certificate_url: None,
            policy_document_url: None,
            renewed_from: None,
            created_at: now,
            updated_at: now,
            activated_at: None,
            cancelled_at: None,
            cancellation_reason: None,
        })
    }

    pub fn period(&self) -> Result<DateRange, PolicyError> {
        DateRange::new(self.start_date, self.end_date).map_err(PolicyError::from)
    }

    /// Moves to `to`, or fails if the lifecycle forbids it
    pub fn transition_to(&mut self, to: PolicyStatus) -> Result<(), PolicyError> {
        if !self.status.can_transition_to(to) {
            return Err(PolicyError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Staff activation of a pending policy
    pub fn activate(&mut self) -> Result<(), PolicyError> {
        if self.status != PolicyStatus::Pending {
            return Err(PolicyError::InvalidStateTransition {
                from: self.status.to_string(),
                to: PolicyStatus::Active.to_string(),
            });
        }
        self.transition_to(PolicyStatus::Active)?;
        self.activated_at = Some(self.updated_at);
        Ok(())
    }

    /// Cancels the policy with a reason
    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<(), PolicyError> {
        match self.status {
            PolicyStatus::Cancelled => return Err(PolicyError::AlreadyCancelled),
            PolicyStatus::Expired => return Err(PolicyError::AlreadyExpired),
            _ => {}
        }
        self.transition_to(PolicyStatus::Cancelled)?;
        self.cancelled_at = Some(self.updated_at);
        let reason = reason.into();
        self.cancellation_reason = Some(if reason.trim().is_empty() {
            "Cancelled by user".to_string()
        } else {
            reason
        });
        Ok(())
    }

    /// A new pending policy covering the period right after this one
    ///
    /// Only active or expired policies renew. Type, coverage, premium and
    /// frequency carry over.
    pub fn renew(&self) -> Result<Policy, PolicyError> {
        if !matches!(self.status, PolicyStatus::Active | PolicyStatus::Expired) {
            return Err(PolicyError::NotRenewable(self.status.to_string()));
        }
        let next = self.period()?.following()?;
        let now = Utc::now();
        Ok(Policy {
            id: PolicyId::new_v7(),
            policy_number: reference::generate(ReferenceKind::Policy, calendar::year_of(now)),
            status: PolicyStatus::Pending,
            start_date: next.start(),
            end_date: next.end(),
            certificate_url: None,
            policy_document_url: None,
            renewed_from: Some(self.id),
            created_at: now,
            updated_at: now,
            activated_at: None,
            cancelled_at: None,
            cancellation_reason: None,
            ..self.clone()
        })
    }

    /// Active and ending within `days` of `today`
    pub fn is_expiring_within(&self, today: NaiveDate, days: i64) -> bool {
        self.status == PolicyStatus::Active
            && self.end_date >= today
            && self.end_date <= today + Duration::days(days)
    }

    pub fn days_remaining(&self, today: NaiveDate) -> i64 {
        (self.end_date - today).num_days()
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

/// Counts and totals over a set of policies
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PolicyStatistics {
    pub total: i64,
    pub pending: i64,
    pub active: i64,
    pub expired: i64,
    pub cancelled: i64,
    pub suspended: i64,
    pub total_premium: rust_decimal::Decimal,
    pub total_coverage: rust_decimal::Decimal,
}

impl PolicyStatistics {
    pub fn record(&mut self, status: PolicyStatus, count: i64) {
        self.total += count;
        match status {
            PolicyStatus::Pending => self.pending += count,
            PolicyStatus::Active => self.active += count,
            PolicyStatus::Expired => self.expired += count,
            PolicyStatus::Cancelled => self.cancelled += count,
            PolicyStatus::Suspended => self.suspended += count,
        }
    }

    pub fn tally<'a>(policies: impl IntoIterator<Item = &'a Policy>) -> Self {
        let mut stats = Self::default();
        for policy in policies {
            stats.record(policy.status, 1);
            stats.total_premium += policy.premium_amount.amount();
            stats.total_coverage += policy.coverage_amount.amount();
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{CategoryId, CompanyId};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn published_type() -> PolicyType {
        let mut t = PolicyType::new(CategoryId::new(), CompanyId::new(), "Motor", "motor", Money::kes(dec!(12000)));
        t.publish();
        t
    }

    fn request(t: &PolicyType) -> PurchaseRequest {
        PurchaseRequest {
            policy_type_id: t.id,
            start_date: date(2024, 1, 1),
            end_date: date(2024, 12, 31),
            coverage_amount: Money::kes(dec!(800000)),
            premium_amount: None,
            payment_frequency: PaymentFrequency::Quarterly,
            policy_data: Value::Null,
            beneficiaries: Value::Array(vec![]),
        }
    }

    #[test]
    fn test_purchase_defaults_premium_and_is_pending() {
        let t = published_type();
        let p = Policy::purchase(UserId::new(), &t, request(&t)).unwrap();
        assert_eq!(p.status, PolicyStatus::Pending);
        assert_eq!(p.premium_amount, Money::kes(dec!(12000)));
        assert_eq!(p.insurance_company_id, t.insurance_company_id);
        assert!(reference::is_valid(ReferenceKind::Policy, &p.policy_number));
    }

    #[test]
    fn test_purchase_rejects_inverted_period() {
        let t = published_type();
        let mut r = request(&t);
        r.end_date = r.start_date;
        assert!(Policy::purchase(UserId::new(), &t, r).is_err());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for to in PolicyStatus::ALL {
            assert!(!PolicyStatus::Expired.can_transition_to(to));
            assert!(!PolicyStatus::Cancelled.can_transition_to(to));
        }
    }

    #[test]
    fn test_renewal_follows_original_period() {
        let t = published_type();
        let mut p = Policy::purchase(UserId::new(), &t, request(&t)).unwrap();
        p.activate().unwrap();
        let renewed = p.renew().unwrap();
        assert_eq!(renewed.start_date, date(2025, 1, 1));
        assert_eq!(renewed.end_date - renewed.start_date, p.end_date - p.start_date);
        assert_eq!(renewed.renewed_from, Some(p.id));
        assert_ne!(renewed.policy_number, p.policy_number);
    }
}
