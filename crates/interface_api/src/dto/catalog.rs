//! Public catalog query strings

use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use core_kernel::CompanyId;
use infra_db::TypeFilter;

/// `?category=motor&company=...&featured=true&min_price=&max_price=&search=`
#[derive(Debug, Default, Deserialize)]
pub struct TypeQuery {
    /// Category slug
    pub category: Option<String>,
    pub company: Option<Uuid>,
    pub featured: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub search: Option<String>,
}

impl TypeQuery {
    pub fn into_filter(self, public_only: bool) -> TypeFilter {
        TypeFilter {
            category: self.category.filter(|c| !c.is_empty()),
            company: self.company.map(CompanyId::from_uuid),
            featured: self.featured,
            min_price: self.min_price,
            max_price: self.max_price,
            search: self.search.filter(|s| !s.trim().is_empty()),
            public_only,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ActiveQuery {
    /// Include inactive records (staff listings only)
    #[serde(default)]
    pub include_inactive: bool,
}
