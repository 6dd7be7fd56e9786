//! Pre-built Test Fixtures
//!
//! Consistent, predictable data for unit and repository tests.

use chrono::NaiveDate;
use core_kernel::Money;
use domain_policy::{InsuranceCompany, PolicyCategory, PolicyType};
use domain_users::{hash_password, Role, User};
use once_cell::sync::Lazy;
use rust_decimal_macros::dec;

/// Password every fixture user is created with
pub const FIXTURE_PASSWORD: &str = "safari2024";

static FIXTURE_HASH: Lazy<String> =
    Lazy::new(|| hash_password(FIXTURE_PASSWORD).expect("fixture password hashes"));

/// Shilling amounts used across tests
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Annual premium of the standard motor product
    pub fn annual_premium() -> Money {
        Money::kes(dec!(12000))
    }

    pub fn coverage() -> Money {
        Money::kes(dec!(800000))
    }

    pub fn claim_amount() -> Money {
        Money::kes(dec!(45000))
    }

    /// A premium that does not split evenly into installments
    pub fn awkward_premium() -> Money {
        Money::kes(dec!(1000.01))
    }
}

/// Calendar fixtures
pub struct DateFixtures;

impl DateFixtures {
    pub fn policy_start() -> NaiveDate {
        date(2024, 1, 1)
    }

    pub fn policy_end() -> NaiveDate {
        date(2024, 12, 31)
    }

    /// A day inside the standard policy period
    pub fn incident_date() -> NaiveDate {
        date(2024, 3, 14)
    }

    /// "Today" for tests that pin the clock
    pub fn today() -> NaiveDate {
        date(2024, 6, 1)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid fixture date")
}

/// Catalog entries
pub struct CatalogFixtures;

impl CatalogFixtures {
    pub fn company() -> InsuranceCompany {
        let mut company = InsuranceCompany::new("Jubilee Insurance", "info@jubilee.co.ke", "+254709901000");
        company.rating = dec!(4.5);
        company
    }

    pub fn category(name: &str, slug: &str) -> PolicyCategory {
        PolicyCategory::new(name, slug)
    }

    pub fn motor_category() -> PolicyCategory {
        Self::category("Motor", "motor")
    }

    pub fn health_category() -> PolicyCategory {
        Self::category("Health", "health")
    }

    /// A published motor product of `company` in `category`
    pub fn published_type(category: &PolicyCategory, company: &InsuranceCompany) -> PolicyType {
        let mut policy_type = PolicyType::new(
            category.id,
            company.id,
            "Comprehensive Motor",
            "comprehensive-motor",
            MoneyFixtures::annual_premium(),
        );
        policy_type.min_coverage_amount = Some(Money::kes(dec!(100000)));
        policy_type.max_coverage_amount = Some(Money::kes(dec!(5000000)));
        policy_type.publish();
        policy_type
    }
}

/// Users of each role, all sharing `FIXTURE_PASSWORD`
pub struct UserFixtures;

impl UserFixtures {
    pub fn with_role(email: &str, role: Role) -> User {
        User::new(email, FIXTURE_HASH.clone(), "Wanjiru", "Kamau", role)
    }

    pub fn customer() -> User {
        Self::with_role("wanjiru@example.co.ke", Role::Customer)
    }

    pub fn staff() -> User {
        Self::with_role("ops@broker.co.ke", Role::Staff)
    }

    pub fn admin() -> User {
        Self::with_role("admin@broker.co.ke", Role::Admin)
    }

    pub fn assessor() -> User {
        Self::with_role("assessor@broker.co.ke", Role::Assessor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_users::verify_password;

    #[test]
    fn test_fixture_users_share_password() {
        let user = UserFixtures::customer();
        assert!(verify_password(FIXTURE_PASSWORD, &user.password_hash));
        assert_eq!(UserFixtures::assessor().role, Role::Assessor);
    }

    #[test]
    fn test_published_type_is_purchasable() {
        let category = CatalogFixtures::motor_category();
        let company = CatalogFixtures::company();
        let policy_type = CatalogFixtures::published_type(&category, &company);
        assert!(policy_type.is_purchasable());
        assert!(policy_type.check_coverage(&MoneyFixtures::coverage()).is_ok());
    }
}
