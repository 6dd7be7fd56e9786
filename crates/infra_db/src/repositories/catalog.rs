//! Insurance companies, policy categories and policy types

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use core_kernel::{CategoryId, CompanyId, PolicyTypeId};
use domain_policy::{slugify, InsuranceCompany, PolicyCategory, PolicyType, TypeStatus};

use super::{kes, parse};
use crate::error::DatabaseError;

const COMPANY_COLUMNS: &str = "id, name, logo, rating, description, contact_email, contact_phone, \
    website, is_active, created_at, updated_at";

const CATEGORY_COLUMNS: &str = "c.id, c.name, c.slug, c.description, c.icon, c.display_order, \
    c.is_active, c.created_at";

const TYPE_COLUMNS: &str = "t.id, t.category_id, t.insurance_company_id, t.name, t.slug, \
    t.description, t.base_premium, t.coverage_details, t.features, t.exclusions, t.requirements, \
    t.terms_and_conditions, t.min_coverage_amount, t.max_coverage_amount, t.min_age, t.max_age, \
    t.status, t.is_active, t.is_featured, t.created_at, t.updated_at";

#[derive(Debug, FromRow)]
struct CompanyRow {
    id: Uuid,
    name: String,
    logo: Option<String>,
    rating: Decimal,
    description: String,
    contact_email: String,
    contact_phone: String,
    website: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CompanyRow> for InsuranceCompany {
    fn from(row: CompanyRow) -> Self {
        InsuranceCompany {
            id: CompanyId::from_uuid(row.id),
            name: row.name,
            logo: row.logo,
            rating: row.rating,
            description: row.description,
            contact_email: row.contact_email,
            contact_phone: row.contact_phone,
            website: row.website,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    description: String,
    icon: Option<String>,
    display_order: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    policy_count: i64,
}

impl From<CategoryRow> for CategoryListing {
    fn from(row: CategoryRow) -> Self {
        CategoryListing {
            category: PolicyCategory {
                id: CategoryId::from_uuid(row.id),
                name: row.name,
                slug: row.slug,
                description: row.description,
                icon: row.icon,
                display_order: row.display_order,
                is_active: row.is_active,
                created_at: row.created_at,
            },
            policy_count: row.policy_count,
        }
    }
}

#[derive(Debug, FromRow)]
struct TypeRow {
    id: Uuid,
    category_id: Uuid,
    insurance_company_id: Uuid,
    name: String,
    slug: String,
    description: String,
    base_premium: Decimal,
    coverage_details: Value,
    features: Value,
    exclusions: Value,
    requirements: Value,
    terms_and_conditions: String,
    min_coverage_amount: Option<Decimal>,
    max_coverage_amount: Option<Decimal>,
    min_age: Option<i32>,
    max_age: Option<i32>,
    status: String,
    is_active: bool,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TypeRow> for PolicyType {
    type Error = DatabaseError;

    fn try_from(row: TypeRow) -> Result<Self, Self::Error> {
        Ok(PolicyType {
            id: PolicyTypeId::from_uuid(row.id),
            category_id: CategoryId::from_uuid(row.category_id),
            insurance_company_id: CompanyId::from_uuid(row.insurance_company_id),
            name: row.name,
            slug: row.slug,
            description: row.description,
            base_premium: kes(row.base_premium),
            coverage_details: row.coverage_details,
            features: row.features,
            exclusions: row.exclusions,
            requirements: row.requirements,
            terms_and_conditions: row.terms_and_conditions,
            min_coverage_amount: row.min_coverage_amount.map(kes),
            max_coverage_amount: row.max_coverage_amount.map(kes),
            min_age: row.min_age,
            max_age: row.max_age,
            status: parse::<TypeStatus>("policy_types.status", &row.status)?,
            is_active: row.is_active,
            is_featured: row.is_featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A category with the number of purchasable types filed under it
#[derive(Debug, Clone, Serialize)]
pub struct CategoryListing {
    #[serde(flatten)]
    pub category: PolicyCategory,
    pub policy_count: i64,
}

/// Catalog search over policy types
#[derive(Debug, Clone, Default)]
pub struct TypeFilter {
    /// Category slug
    pub category: Option<String>,
    pub company: Option<CompanyId>,
    pub featured: Option<bool>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Matched against name and description
    pub search: Option<String>,
    /// Restrict to published, active types
    pub public_only: bool,
}

impl TypeFilter {
    pub fn public() -> Self {
        Self { public_only: true, ..Self::default() }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Companies

    pub async fn list_companies(&self, active_only: bool) -> Result<Vec<InsuranceCompany>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM insurance_companies WHERE ($1 = FALSE OR is_active) ORDER BY name",
            COMPANY_COLUMNS
        );
        let rows = sqlx::query_as::<_, CompanyRow>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(InsuranceCompany::from).collect())
    }

    pub async fn find_company(&self, id: CompanyId) -> Result<InsuranceCompany, DatabaseError> {
        let sql = format!("SELECT {} FROM insurance_companies WHERE id = $1", COMPANY_COLUMNS);
        let row = sqlx::query_as::<_, CompanyRow>(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("InsuranceCompany", id))?;
        Ok(row.into())
    }

    /// Inserts or updates a company
    pub async fn save_company(&self, company: &InsuranceCompany) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO insurance_companies (
                id, name, logo, rating, description, contact_email, contact_phone,
                website, is_active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                logo = EXCLUDED.logo,
                rating = EXCLUDED.rating,
                description = EXCLUDED.description,
                contact_email = EXCLUDED.contact_email,
                contact_phone = EXCLUDED.contact_phone,
                website = EXCLUDED.website,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(company.id.into_uuid())
        .bind(&company.name)
        .bind(&company.logo)
        .bind(company.rating)
        .bind(&company.description)
        .bind(&company.contact_email)
        .bind(&company.contact_phone)
        .bind(&company.website)
        .bind(company.is_active)
        .bind(company.created_at)
        .bind(company.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => {
                DatabaseError::duplicate("InsuranceCompany", "name", &company.name)
            }
            other => other,
        })?;
        Ok(())
    }

    /// Fails with `ForeignKeyViolation` while types or policies still reference it
    pub async fn delete_company(&self, id: CompanyId) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM insurance_companies WHERE id = $1")
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("InsuranceCompany", id));
        }
        Ok(())
    }

    // Categories

    /// Categories ordered by display order then name
    pub async fn list_categories(&self, active_only: bool) -> Result<Vec<CategoryListing>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {},
                (SELECT COUNT(*) FROM policy_types t
                 WHERE t.category_id = c.id AND t.status = 'published' AND t.is_active) AS policy_count
            FROM policy_categories c
            WHERE ($1 = FALSE OR c.is_active)
            ORDER BY c.display_order, c.name
            "#,
            CATEGORY_COLUMNS
        );
        let rows = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(CategoryListing::from).collect())
    }

    /// Looks a category up by id or by slug
    pub async fn find_category(&self, key: &str) -> Result<CategoryListing, DatabaseError> {
        let id = key.parse::<Uuid>().ok();
        let sql = format!(
            r#"
            SELECT {},
                (SELECT COUNT(*) FROM policy_types t
                 WHERE t.category_id = c.id AND t.status = 'published' AND t.is_active) AS policy_count
            FROM policy_categories c
            WHERE c.id = $1 OR c.slug = $2
            "#,
            CATEGORY_COLUMNS
        );
        let row = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(id)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("PolicyCategory", key))?;
        Ok(row.into())
    }

    pub async fn save_category(&self, category: &PolicyCategory) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO policy_categories (
                id, name, slug, description, icon, display_order, is_active, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                slug = EXCLUDED.slug,
                description = EXCLUDED.description,
                icon = EXCLUDED.icon,
                display_order = EXCLUDED.display_order,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(category.id.into_uuid())
        .bind(&category.name)
        .bind(&category.slug)
        .bind(&category.description)
        .bind(&category.icon)
        .bind(category.display_order)
        .bind(category.is_active)
        .bind(category.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => {
                DatabaseError::duplicate("PolicyCategory", "name or slug", &category.slug)
            }
            other => other,
        })?;
        Ok(())
    }

    pub async fn delete_category(&self, id: CategoryId) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM policy_categories WHERE id = $1")
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("PolicyCategory", id));
        }
        Ok(())
    }

    // Policy types

    pub async fn list_types(&self, filter: &TypeFilter) -> Result<Vec<PolicyType>, DatabaseError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM policy_types t JOIN policy_categories c ON c.id = t.category_id WHERE TRUE",
            TYPE_COLUMNS
        ));

        if filter.public_only {
            qb.push(" AND t.status = 'published' AND t.is_active");
        }
        if let Some(slug) = &filter.category {
            qb.push(" AND c.slug = ").push_bind(slug.clone());
        }
        if let Some(company) = filter.company {
            qb.push(" AND t.insurance_company_id = ").push_bind(company.into_uuid());
        }
        if let Some(featured) = filter.featured {
            qb.push(" AND t.is_featured = ").push_bind(featured);
        }
        if let Some(min) = filter.min_price {
            qb.push(" AND t.base_premium >= ").push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND t.base_premium <= ").push_bind(max);
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            qb.push(" AND (t.name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR t.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY t.is_featured DESC, t.name");

        qb.build_query_as::<TypeRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(PolicyType::try_from)
            .collect()
    }

    pub async fn find_type(&self, id: PolicyTypeId) -> Result<PolicyType, DatabaseError> {
        let sql = format!("SELECT {} FROM policy_types t WHERE t.id = $1", TYPE_COLUMNS);
        sqlx::query_as::<_, TypeRow>(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("PolicyType", id))?
            .try_into()
    }

    pub async fn find_type_by_slug(&self, slug: &str) -> Result<PolicyType, DatabaseError> {
        let sql = format!("SELECT {} FROM policy_types t WHERE t.slug = $1", TYPE_COLUMNS);
        sqlx::query_as::<_, TypeRow>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("PolicyType", slug))?
            .try_into()
    }

    /// Newest featured types open for purchase
    pub async fn featured_types(&self, limit: i64) -> Result<Vec<PolicyType>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {} FROM policy_types t
            WHERE t.is_featured AND t.status = 'published' AND t.is_active
            ORDER BY t.created_at DESC
            LIMIT $1
            "#,
            TYPE_COLUMNS
        );
        sqlx::query_as::<_, TypeRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(PolicyType::try_from)
            .collect()
    }

    /// Slugs already derived from the same base as `name`
    pub async fn taken_slugs(&self, name: &str) -> Result<HashSet<String>, DatabaseError> {
        let base = slugify(name);
        let slugs: Vec<String> =
            sqlx::query_scalar("SELECT slug FROM policy_types WHERE slug = $1 OR slug LIKE $1 || '-%'")
                .bind(&base)
                .fetch_all(&self.pool)
                .await?;
        Ok(slugs.into_iter().collect())
    }

    pub async fn save_type(&self, policy_type: &PolicyType) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO policy_types (
                id, category_id, insurance_company_id, name, slug, description, base_premium,
                coverage_details, features, exclusions, requirements, terms_and_conditions,
                min_coverage_amount, max_coverage_amount, min_age, max_age, status,
                is_active, is_featured, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                      $16, $17, $18, $19, $20, $21)
            ON CONFLICT (id) DO UPDATE SET
                category_id = EXCLUDED.category_id,
                insurance_company_id = EXCLUDED.insurance_company_id,
                name = EXCLUDED.name,
                slug = EXCLUDED.slug,
                description = EXCLUDED.description,
                base_premium = EXCLUDED.base_premium,
                coverage_details = EXCLUDED.coverage_details,
                features = EXCLUDED.features,
                exclusions = EXCLUDED.exclusions,
                requirements = EXCLUDED.requirements,
                terms_and_conditions = EXCLUDED.terms_and_conditions,
                min_coverage_amount = EXCLUDED.min_coverage_amount,
                max_coverage_amount = EXCLUDED.max_coverage_amount,
                min_age = EXCLUDED.min_age,
                max_age = EXCLUDED.max_age,
                status = EXCLUDED.status,
                is_active = EXCLUDED.is_active,
                is_featured = EXCLUDED.is_featured,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(policy_type.id.into_uuid())
        .bind(policy_type.category_id.into_uuid())
        .bind(policy_type.insurance_company_id.into_uuid())
        .bind(&policy_type.name)
        .bind(&policy_type.slug)
        .bind(&policy_type.description)
        .bind(policy_type.base_premium.amount())
        .bind(&policy_type.coverage_details)
        .bind(&policy_type.features)
        .bind(&policy_type.exclusions)
        .bind(&policy_type.requirements)
        .bind(&policy_type.terms_and_conditions)
        .bind(policy_type.min_coverage_amount.map(|m| m.amount()))
        .bind(policy_type.max_coverage_amount.map(|m| m.amount()))
        .bind(policy_type.min_age)
        .bind(policy_type.max_age)
        .bind(policy_type.status.as_str())
        .bind(policy_type.is_active)
        .bind(policy_type.is_featured)
        .bind(policy_type.created_at)
        .bind(policy_type.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => {
                DatabaseError::duplicate("PolicyType", "slug", &policy_type.slug)
            }
            other => other,
        })?;
        debug!(policy_type = %policy_type.slug, status = %policy_type.status, "Policy type saved");
        Ok(())
    }

    pub async fn delete_type(&self, id: PolicyTypeId) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM policy_types WHERE id = $1")
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("PolicyType", id));
        }
        Ok(())
    }
}
