//! Test Data Builders
//!
//! Builders with sensible defaults so tests only spell out the fields they
//! care about. Users get generated names and addresses from `fake`.

use chrono::NaiveDate;
use core_kernel::{Money, UserId};
use domain_billing::{PaymentIntent, PaymentMethod, Transaction};
use domain_claims::{Claim, ClaimType, CoveredPolicy, NewClaim, StatusChange};
use domain_policy::{PaymentFrequency, Policy, PolicyStatus, PolicyType, PurchaseRequest};
use domain_users::{Role, User};
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use serde_json::{json, Value};

use crate::fixtures::{DateFixtures, MoneyFixtures, UserFixtures};

/// Builder for user accounts with generated identities
pub struct UserBuilder {
    role: Role,
    email: Option<String>,
    phone_number: Option<String>,
    active: bool,
}

impl Default for UserBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UserBuilder {
    pub fn new() -> Self {
        Self {
            role: Role::Customer,
            email: None,
            phone_number: Some("0712345678".to_string()),
            active: true,
        }
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn suspended(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn build(self) -> User {
        let email = self.email.unwrap_or_else(|| SafeEmail().fake());
        let mut user = UserFixtures::with_role(&email, self.role);
        user.first_name = FirstName().fake();
        user.last_name = LastName().fake();
        user.phone_number = self.phone_number;
        if !self.active {
            user.suspend();
        }
        user
    }
}

/// Builder for policies bought from a given type
pub struct PolicyBuilder {
    holder: UserId,
    start_date: NaiveDate,
    end_date: NaiveDate,
    coverage: Money,
    frequency: PaymentFrequency,
    status: PolicyStatus,
}

impl PolicyBuilder {
    pub fn new(holder: UserId) -> Self {
        Self {
            holder,
            start_date: DateFixtures::policy_start(),
            end_date: DateFixtures::policy_end(),
            coverage: MoneyFixtures::coverage(),
            frequency: PaymentFrequency::Annual,
            status: PolicyStatus::Pending,
        }
    }

    pub fn period(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn frequency(mut self, frequency: PaymentFrequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn coverage(mut self, coverage: Money) -> Self {
        self.coverage = coverage;
        self
    }

    /// Activates the policy after purchase
    pub fn active(mut self) -> Self {
        self.status = PolicyStatus::Active;
        self
    }

    pub fn request(&self, policy_type: &PolicyType) -> PurchaseRequest {
        PurchaseRequest {
            policy_type_id: policy_type.id,
            start_date: self.start_date,
            end_date: self.end_date,
            coverage_amount: self.coverage,
            premium_amount: None,
            payment_frequency: self.frequency,
            policy_data: json!({ "registration": "KDA 123A" }),
            beneficiaries: Value::Array(Vec::new()),
        }
    }

    pub fn build(self, policy_type: &PolicyType) -> Policy {
        let mut policy = Policy::purchase(self.holder, policy_type, self.request(policy_type))
            .expect("builder produces a valid purchase");
        if self.status == PolicyStatus::Active {
            policy.activate().expect("pending policy activates");
        }
        policy
    }
}

/// Builder for claims filed against a policy
pub struct ClaimBuilder {
    claim_type: ClaimType,
    incident_date: NaiveDate,
    amount: Money,
    description: String,
    today: NaiveDate,
}

impl Default for ClaimBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimBuilder {
    pub fn new() -> Self {
        Self {
            claim_type: ClaimType::Accident,
            incident_date: DateFixtures::incident_date(),
            amount: MoneyFixtures::claim_amount(),
            description: "Rear-ended at the Uhuru Highway roundabout".to_string(),
            today: DateFixtures::today(),
        }
    }

    pub fn claim_type(mut self, claim_type: ClaimType) -> Self {
        self.claim_type = claim_type;
        self
    }

    pub fn incident_date(mut self, date: NaiveDate) -> Self {
        self.incident_date = date;
        self
    }

    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    /// The day the claim is filed on
    pub fn filed_on(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn input(&self) -> NewClaim {
        NewClaim {
            claim_type: self.claim_type,
            description: self.description.clone(),
            incident_date: self.incident_date,
            incident_location: "Nairobi".to_string(),
            amount_claimed: self.amount,
        }
    }

    /// Files the claim as the policy holder
    pub fn build(self, policy: &Policy) -> (Claim, StatusChange) {
        Claim::submit(&covered(policy), policy.user_id, self.input(), self.today)
            .expect("builder produces a valid claim")
    }
}

/// What a claim is checked against, taken from a policy
pub fn covered(policy: &Policy) -> CoveredPolicy {
    CoveredPolicy {
        id: policy.id,
        holder: policy.user_id,
        is_active: policy.status == PolicyStatus::Active,
        start_date: policy.start_date,
        end_date: policy.end_date,
        coverage_amount: policy.coverage_amount,
    }
}

/// Builder for payments against a policy
pub struct TransactionBuilder {
    method: PaymentMethod,
    amount: Money,
    phone_number: Option<String>,
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self {
            method: PaymentMethod::Mpesa,
            amount: MoneyFixtures::annual_premium(),
            phone_number: Some("0712345678".to_string()),
        }
    }

    pub fn card(mut self) -> Self {
        self.method = PaymentMethod::Card;
        self.phone_number = None;
        self
    }

    pub fn amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn build(self, policy: &Policy) -> Transaction {
        Transaction::initiate(
            policy.user_id,
            PaymentIntent {
                policy_id: Some(policy.id),
                amount: self.amount,
                method: self.method,
                phone_number: self.phone_number,
                description: format!("Premium for {}", policy.policy_number),
            },
        )
        .expect("builder produces a valid payment")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::CatalogFixtures;
    use domain_claims::ClaimStatus;

    #[test]
    fn test_generated_users_are_distinct() {
        let a = UserBuilder::new().build();
        let b = UserBuilder::new().build();
        assert_ne!(a.id, b.id);
        assert!(a.email.contains('@'));
    }

    #[test]
    fn test_claim_builder_files_submitted_claim() {
        let category = CatalogFixtures::motor_category();
        let company = CatalogFixtures::company();
        let policy_type = CatalogFixtures::published_type(&category, &company);
        let policy = PolicyBuilder::new(UserId::new()).active().build(&policy_type);

        let (claim, opening) = ClaimBuilder::new().build(&policy);
        assert_eq!(claim.status, ClaimStatus::Submitted);
        assert_eq!(opening.to_status, ClaimStatus::Submitted);
        assert!(opening.from_status.is_none());
    }
}
