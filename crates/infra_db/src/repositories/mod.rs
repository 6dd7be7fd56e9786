//! Repository implementations
//!
//! One repository per resource, each wrapping the shared pool. Rows are read
//! into `*Row` structs and mapped onto domain types; enumerations are stored
//! as their string codes.

pub mod users;
pub mod catalog;
pub mod policies;
pub mod workflows;
pub mod claims;
pub mod payments;
pub mod documents;
pub mod notifications;
pub mod analytics;

pub use users::UserRepository;
pub use catalog::CatalogRepository;
pub use policies::PolicyRepository;
pub use workflows::WorkflowRepository;
pub use claims::ClaimsRepository;
pub use payments::PaymentRepository;
pub use documents::DocumentRepository;
pub use notifications::NotificationRepository;
pub use analytics::AnalyticsRepository;

use std::fmt::Display;
use std::str::FromStr;

use core_kernel::Money;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::DatabaseError;

/// Limit/offset window for list queries
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const MAX_LIMIT: i64 = 200;

    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.clamp(1, Self::MAX_LIMIT),
            offset: offset.max(0),
        }
    }

    pub fn first(limit: i64) -> Self {
        Self::new(limit, 0)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: 50, offset: 0 }
    }
}

/// Parses a stored code back into its domain enum
pub(crate) fn parse<T>(column: &str, value: &str) -> Result<T, DatabaseError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|e| DatabaseError::corrupt(column, e))
}

pub(crate) fn kes(amount: Decimal) -> Money {
    Money::kes(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_claims::ClaimStatus;

    #[test]
    fn test_page_is_clamped() {
        let page = Page::new(10_000, -5);
        assert_eq!(page.limit, Page::MAX_LIMIT);
        assert_eq!(page.offset, 0);
        assert_eq!(Page::new(0, 3).limit, 1);
    }

    #[test]
    fn test_parse_reports_column() {
        let ok: ClaimStatus = parse("claims.status", "under_review").unwrap();
        assert_eq!(ok, ClaimStatus::UnderReview);

        let err = parse::<ClaimStatus>("claims.status", "lost").unwrap_err();
        assert!(err.to_string().contains("claims.status"));
    }
}
