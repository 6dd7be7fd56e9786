//! Product catalog
//!
//! Insurance companies are the tenants of the brokerage. Each sells policy
//! types grouped into categories. Only `published` and active types can be
//! listed publicly or bought.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use core_kernel::{CategoryId, CompanyId, Money, PolicyTypeId};

use crate::error::PolicyError;

/// An underwriter whose products the brokerage sells
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceCompany {
    pub id: CompanyId,
    pub name: String,
    pub logo: Option<String>,
    /// 0.00 to 5.00
    pub rating: Decimal,
    pub description: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub website: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InsuranceCompany {
    pub fn new(name: impl Into<String>, contact_email: impl Into<String>, contact_phone: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: CompanyId::new_v7(),
            name: name.into(),
            logo: None,
            rating: Decimal::ZERO,
            description: String::new(),
            contact_email: contact_email.into(),
            contact_phone: contact_phone.into(),
            website: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::validation("Company name is required"));
        }
        if self.rating < Decimal::ZERO || self.rating > dec!(5) {
            return Err(PolicyError::validation("Rating must be between 0 and 5"));
        }
        if self.rating.scale() > 2 && self.rating != self.rating.round_dp(2) {
            return Err(PolicyError::validation("Rating allows at most 2 decimal places"));
        }
        Ok(())
    }
}

/// A grouping of policy types, e.g. Motor or Health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyCategory {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub icon: Option<String>,
    pub display_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl PolicyCategory {
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: CategoryId::new_v7(),
            name: name.into(),
            slug: slug.into(),
            description: String::new(),
            icon: None,
            display_order: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

/// Publication state of a policy type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TypeStatus {
    #[default]
    Draft,
    Published,
    Delisted,
}

impl TypeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeStatus::Draft => "draft",
            TypeStatus::Published => "published",
            TypeStatus::Delisted => "delisted",
        }
    }
}

impl fmt::Display for TypeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeStatus {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(TypeStatus::Draft),
            "published" => Ok(TypeStatus::Published),
            "delisted" => Ok(TypeStatus::Delisted),
            other => Err(PolicyError::validation(format!("Unknown policy type status: {}", other))),
        }
    }
}

/// A purchasable insurance product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyType {
    pub id: PolicyTypeId,
    pub category_id: CategoryId,
    pub insurance_company_id: CompanyId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub base_premium: Money,
    /// Free-form object describing what is covered
    pub coverage_details: Value,
    /// JSON array of feature strings
    pub features: Value,
    /// JSON array of exclusion strings
    pub exclusions: Value,
    pub requirements: Value,
    pub terms_and_conditions: String,
    pub min_coverage_amount: Option<Money>,
    pub max_coverage_amount: Option<Money>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub status: TypeStatus,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyType {
    /// Creates a draft type with empty JSON descriptors
    pub fn new(
        category_id: CategoryId,
        insurance_company_id: CompanyId,
        name: impl Into<String>,
        slug: impl Into<String>,
        base_premium: Money,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PolicyTypeId::new_v7(),
            category_id,
            insurance_company_id,
            name: name.into(),
            slug: slug.into(),
            description: String::new(),
            base_premium,
            coverage_details: Value::Object(Default::default()),
            features: Value::Array(Vec::new()),
            exclusions: Value::Array(Vec::new()),
            requirements: Value::Object(Default::default()),
            terms_and_conditions: String::new(),
            min_coverage_amount: None,
            max_coverage_amount: None,
            min_age: None,
            max_age: None,
            status: TypeStatus::Draft,
            is_active: true,
            is_featured: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Listed publicly and open for purchase
    pub fn is_purchasable(&self) -> bool {
        self.status == TypeStatus::Published && self.is_active
    }

    pub fn publish(&mut self) {
        self.status = TypeStatus::Published;
        self.updated_at = Utc::now();
    }

    pub fn delist(&mut self) {
        self.status = TypeStatus::Delisted;
        self.updated_at = Utc::now();
    }

    /// Checks a requested coverage amount against the type's bounds
    pub fn check_coverage(&self, coverage: &Money) -> Result<(), PolicyError> {
        if coverage.is_negative() {
            return Err(PolicyError::validation("Coverage amount cannot be negative"));
        }
        if let Some(min) = &self.min_coverage_amount {
            if coverage.amount() < min.amount() {
                return Err(PolicyError::validation(format!(
                    "Coverage amount must be at least {}",
                    min
                )));
            }
        }
        if let Some(max) = &self.max_coverage_amount {
            if coverage.amount() > max.amount() {
                return Err(PolicyError::validation(format!(
                    "Coverage amount cannot exceed {}",
                    max
                )));
            }
        }
        Ok(())
    }

    /// Structural checks run before a type is saved
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::validation("Policy type name is required"));
        }
        if self.base_premium.is_negative() {
            return Err(PolicyError::validation("Base premium cannot be negative"));
        }
        if let (Some(min), Some(max)) = (&self.min_coverage_amount, &self.max_coverage_amount) {
            if min.amount() > max.amount() {
                return Err(PolicyError::validation(
                    "Minimum coverage cannot exceed maximum coverage",
                ));
            }
        }
        if let (Some(min), Some(max)) = (self.min_age, self.max_age) {
            if min > max {
                return Err(PolicyError::validation("Minimum age cannot exceed maximum age"));
            }
        }
        if !self.features.is_array() || !self.exclusions.is_array() {
            return Err(PolicyError::validation("Features and exclusions must be JSON arrays"));
        }
        if !self.coverage_details.is_object() || !self.requirements.is_object() {
            return Err(PolicyError::validation(
                "Coverage details and requirements must be JSON objects",
            ));
        }
        Ok(())
    }
}

/// Lower-case, hyphen-separated slug of a display name
///
/// `"Comprehensive Motor (Private)"` becomes `"comprehensive-motor-private"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Slug for `name` that does not collide with any slug `taken` reports
///
/// Collisions get `-1`, `-2`, ... appended.
pub fn unique_slug(name: &str, taken: impl Fn(&str) -> bool) -> String {
    let base = match slugify(name) {
        s if s.is_empty() => "policy".to_string(),
        s => s,
    };
    if !taken(&base) {
        return base;
    }
    let mut counter = 1u32;
    loop {
        let candidate = format!("{}-{}", base, counter);
        if !taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Comprehensive Motor (Private)"), "comprehensive-motor-private");
        assert_eq!(slugify("  Health -- Plus  "), "health-plus");
        assert_eq!(slugify("Bima ya Afya 2024"), "bima-ya-afya-2024");
    }

    #[test]
    fn test_unique_slug_appends_counter() {
        let existing = ["motor", "motor-1"];
        let slug = unique_slug("Motor", |s| existing.contains(&s));
        assert_eq!(slug, "motor-2");
        assert_eq!(unique_slug("Travel", |s| existing.contains(&s)), "travel");
    }

    #[test]
    fn test_coverage_bounds() {
        let mut t = PolicyType::new(
            CategoryId::new(),
            CompanyId::new(),
            "Motor",
            "motor",
            Money::kes(dec!(15000)),
        );
        t.min_coverage_amount = Some(Money::kes(dec!(100000)));
        t.max_coverage_amount = Some(Money::kes(dec!(5000000)));
        assert!(t.check_coverage(&Money::kes(dec!(100000))).is_ok());
        assert!(t.check_coverage(&Money::kes(dec!(99999))).is_err());
        assert!(t.check_coverage(&Money::kes(dec!(5000001))).is_err());
    }

    #[test]
    fn test_only_published_active_types_are_purchasable() {
        let mut t = PolicyType::new(CategoryId::new(), CompanyId::new(), "Motor", "motor", Money::kes(dec!(1)));
        assert!(!t.is_purchasable());
        t.publish();
        assert!(t.is_purchasable());
        t.is_active = false;
        assert!(!t.is_purchasable());
    }

    #[test]
    fn test_company_rating_bounds() {
        let mut c = InsuranceCompany::new("Jubilee", "info@jubilee.test", "0700000000");
        c.rating = dec!(4.5);
        assert!(c.validate().is_ok());
        c.rating = dec!(5.5);
        assert!(c.validate().is_err());
    }
}
