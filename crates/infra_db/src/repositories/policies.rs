//! Policies, installment schedules created at purchase, and reviews
//!
//! Purchase writes the policy, its schedule and its workflow stages in one
//! transaction; activation and cancellation update the dependent rows the
//! same way.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};
use uuid::Uuid;

use core_kernel::{CompanyId, PolicyId, PolicyTypeId, ReviewId, UserId};
use domain_analytics::HeldPolicy;
use domain_billing::PaymentSchedule;
use domain_notifications::Notification;
use domain_policy::{
    workflow, PaymentFrequency, Policy, PolicyReview, PolicyStatistics, PolicyStatus, WorkflowStage,
};

use super::{kes, notifications, parse, payments, workflows, Page};
use crate::error::DatabaseError;

const COLUMNS: &str = "p.id, p.policy_number, p.user_id, p.policy_type_id, p.insurance_company_id, \
    p.status, p.start_date, p.end_date, p.premium_amount, p.coverage_amount, p.payment_frequency, \
    p.policy_data, p.beneficiaries, p.certificate_url, p.policy_document_url, p.renewed_from, \
    p.created_at, p.updated_at, p.activated_at, p.cancelled_at, p.cancellation_reason";

const REVIEW_COLUMNS: &str = "r.id, r.policy_id, r.user_id, r.rating, r.title, r.comment, \
    r.is_verified_purchase, r.is_published, r.created_at, r.updated_at";

#[derive(Debug, FromRow)]
struct PolicyRow {
    id: Uuid,
    policy_number: String,
    user_id: Uuid,
    policy_type_id: Uuid,
    insurance_company_id: Uuid,
    status: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    premium_amount: Decimal,
    coverage_amount: Decimal,
    payment_frequency: String,
    policy_data: Value,
    beneficiaries: Value,
    certificate_url: Option<String>,
    policy_document_url: Option<String>,
    renewed_from: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
}

impl TryFrom<PolicyRow> for Policy {
    type Error = DatabaseError;

    fn try_from(row: PolicyRow) -> Result<Self, Self::Error> {
        Ok(Policy {
            id: PolicyId::from_uuid(row.id),
            policy_number: row.policy_number,
            user_id: UserId::from_uuid(row.user_id),
            policy_type_id: PolicyTypeId::from_uuid(row.policy_type_id),
            insurance_company_id: CompanyId::from_uuid(row.insurance_company_id),
            status: parse::<PolicyStatus>("policies.status", &row.status)?,
            start_date: row.start_date,
            end_date: row.end_date,
            premium_amount: kes(row.premium_amount),
            coverage_amount: kes(row.coverage_amount),
            payment_frequency: parse::<PaymentFrequency>(
                "policies.payment_frequency",
                &row.payment_frequency,
            )?,
            policy_data: row.policy_data,
            beneficiaries: row.beneficiaries,
            certificate_url: row.certificate_url,
            policy_document_url: row.policy_document_url,
            renewed_from: row.renewed_from.map(PolicyId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
            activated_at: row.activated_at,
            cancelled_at: row.cancelled_at,
            cancellation_reason: row.cancellation_reason,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReviewRow {
    id: Uuid,
    policy_id: Uuid,
    user_id: Uuid,
    rating: i16,
    title: String,
    comment: String,
    is_verified_purchase: bool,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReviewRow> for PolicyReview {
    fn from(row: ReviewRow) -> Self {
        PolicyReview {
            id: ReviewId::from_uuid(row.id),
            policy_id: PolicyId::from_uuid(row.policy_id),
            user_id: UserId::from_uuid(row.user_id),
            rating: row.rating,
            title: row.title,
            comment: row.comment,
            is_verified_purchase: row.is_verified_purchase,
            is_published: row.is_published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct StatusTotalsRow {
    status: String,
    count: i64,
    premium: Decimal,
    coverage: Decimal,
}

/// Policy listing filters; `user` scopes to one holder
#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    pub user: Option<UserId>,
    pub status: Option<PolicyStatus>,
    pub policy_type: Option<PolicyTypeId>,
    pub company: Option<CompanyId>,
    /// Matched against the policy number
    pub search: Option<String>,
}

impl PolicyFilter {
    pub fn for_user(user: Option<UserId>) -> Self {
        Self { user, ..Self::default() }
    }
}

#[derive(Debug, Clone)]
pub struct PolicyRepository {
    pool: PgPool,
}

impl PolicyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persists a purchased (or renewed) policy with its schedule and workflow
    pub async fn create_purchase(
        &self,
        policy: &Policy,
        schedule: &[PaymentSchedule],
        stages: &[WorkflowStage],
        notification: Option<&Notification>,
    ) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        insert_policy(&mut tx, policy).await?;
        payments::insert_schedules(&mut tx, schedule).await?;
        workflows::insert_all(&mut tx, stages).await?;
        if let Some(notification) = notification {
            notifications::insert(&mut tx, notification).await?;
        }

        tx.commit().await?;
        info!(
            policy_number = %policy.policy_number,
            installments = schedule.len(),
            "Policy created"
        );
        Ok(())
    }

    pub async fn find(&self, id: PolicyId) -> Result<Policy, DatabaseError> {
        let sql = format!("SELECT {} FROM policies p WHERE p.id = $1", COLUMNS);
        sqlx::query_as::<_, PolicyRow>(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("Policy", id))?
            .try_into()
    }

    pub async fn list(&self, filter: &PolicyFilter, page: Page) -> Result<Vec<Policy>, DatabaseError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM policies p WHERE TRUE", COLUMNS));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY p.created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        qb.build_query_as::<PolicyRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Policy::try_from)
            .collect()
    }

    /// Active policies ending between `today` and `until` inclusive
    pub async fn expiring(
        &self,
        user: Option<UserId>,
        today: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Policy>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {} FROM policies p
            WHERE p.status = 'active'
              AND p.end_date BETWEEN $1 AND $2
              AND ($3::uuid IS NULL OR p.user_id = $3)
            ORDER BY p.end_date
            "#,
            COLUMNS
        );
        sqlx::query_as::<_, PolicyRow>(&sql)
            .bind(today)
            .bind(until)
            .bind(user.map(|u| u.into_uuid()))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Policy::try_from)
            .collect()
    }

    /// Active policies of a holder with their category, for recommendations
    pub async fn held_policies(&self, user: UserId) -> Result<Vec<HeldPolicy>, DatabaseError> {
        let rows: Vec<(NaiveDate, String)> = sqlx::query_as(
            r#"
            SELECT p.end_date, c.slug
            FROM policies p
            JOIN policy_types t ON t.id = p.policy_type_id
            JOIN policy_categories c ON c.id = t.category_id
            WHERE p.user_id = $1 AND p.status = 'active'
            "#,
        )
        .bind(user.into_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(end_date, category_slug)| HeldPolicy { end_date, category_slug })
            .collect())
    }

    /// Writes back the lifecycle columns of a policy
    pub async fn save(&self, policy: &Policy) -> Result<(), DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        update_lifecycle(&mut conn, policy).await
    }

    /// Saves a cancelled policy and cancels its outstanding installments
    pub async fn cancel(&self, policy: &Policy) -> Result<u64, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        update_lifecycle(&mut tx, policy).await?;
        let cancelled = sqlx::query(
            r#"
            UPDATE payment_schedules SET status = 'cancelled'
            WHERE policy_id = $1 AND status IN ('pending', 'overdue')
            "#,
        )
        .bind(policy.id.into_uuid())
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tx.commit().await?;
        debug!(policy_number = %policy.policy_number, cancelled, "Policy cancelled");
        Ok(cancelled)
    }

    /// Saves an activated policy, closes its workflow and records the notification
    pub async fn activate(&self, policy: &Policy, notification: &Notification) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        update_lifecycle(&mut tx, policy).await?;
        workflows::complete_open(&mut tx, policy.id, workflow::stages_closed_by_activation()).await?;
        notifications::insert(&mut tx, notification).await?;
        tx.commit().await?;
        info!(policy_number = %policy.policy_number, "Policy activated");
        Ok(())
    }

    /// Counts per status plus premium and coverage totals
    pub async fn statistics(&self, user: Option<UserId>) -> Result<PolicyStatistics, DatabaseError> {
        let rows = sqlx::query_as::<_, StatusTotalsRow>(
            r#"
            SELECT status, COUNT(*) AS count,
                   COALESCE(SUM(premium_amount), 0) AS premium,
                   COALESCE(SUM(coverage_amount), 0) AS coverage
            FROM policies
            WHERE ($1::uuid IS NULL OR user_id = $1)
            GROUP BY status
            "#,
        )
        .bind(user.map(|u| u.into_uuid()))
        .fetch_all(&self.pool)
        .await?;

        let mut stats = PolicyStatistics::default();
        for row in rows {
            stats.record(parse("policies.status", &row.status)?, row.count);
            stats.total_premium += row.premium;
            stats.total_coverage += row.coverage;
        }
        Ok(stats)
    }

    /// The policy has at least one completed payment
    pub async fn has_completed_payment(&self, policy_id: PolicyId) -> Result<bool, DatabaseError> {
        let paid: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM transactions WHERE policy_id = $1 AND status = 'completed')",
        )
        .bind(policy_id.into_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(paid)
    }

    // Reviews

    pub async fn create_review(&self, review: &PolicyReview) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO policy_reviews (
                id, policy_id, user_id, rating, title, comment,
                is_verified_purchase, is_published, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(review.id.into_uuid())
        .bind(review.policy_id.into_uuid())
        .bind(review.user_id.into_uuid())
        .bind(review.rating)
        .bind(&review.title)
        .bind(&review.comment)
        .bind(review.is_verified_purchase)
        .bind(review.is_published)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::DuplicateEntry(_) => {
                DatabaseError::duplicate("PolicyReview", "policy", review.policy_id)
            }
            other => other,
        })?;
        Ok(())
    }

    pub async fn find_review(&self, id: ReviewId) -> Result<PolicyReview, DatabaseError> {
        let sql = format!("SELECT {} FROM policy_reviews r WHERE r.id = $1", REVIEW_COLUMNS);
        let row = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::not_found("PolicyReview", id))?;
        Ok(row.into())
    }

    /// Reviews of policies of one type; `published_only` hides unmoderated ones
    pub async fn reviews_for_type(
        &self,
        policy_type: PolicyTypeId,
        published_only: bool,
    ) -> Result<Vec<PolicyReview>, DatabaseError> {
        let sql = format!(
            r#"
            SELECT {} FROM policy_reviews r
            JOIN policies p ON p.id = r.policy_id
            WHERE p.policy_type_id = $1 AND ($2 = FALSE OR r.is_published)
            ORDER BY r.created_at DESC
            "#,
            REVIEW_COLUMNS
        );
        let rows = sqlx::query_as::<_, ReviewRow>(&sql)
            .bind(policy_type.into_uuid())
            .bind(published_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PolicyReview::from).collect())
    }

    pub async fn save_review(&self, review: &PolicyReview) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE policy_reviews SET is_published = $2, updated_at = $3 WHERE id = $1")
            .bind(review.id.into_uuid())
            .bind(review.is_published)
            .bind(review.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &PolicyFilter) {
    if let Some(user) = filter.user {
        qb.push(" AND p.user_id = ").push_bind(user.into_uuid());
    }
    if let Some(status) = filter.status {
        qb.push(" AND p.status = ").push_bind(status.as_str());
    }
    if let Some(policy_type) = filter.policy_type {
        qb.push(" AND p.policy_type_id = ").push_bind(policy_type.into_uuid());
    }
    if let Some(company) = filter.company {
        qb.push(" AND p.insurance_company_id = ").push_bind(company.into_uuid());
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(" AND p.policy_number ILIKE ").push_bind(format!("%{}%", search));
    }
}

async fn insert_policy(conn: &mut PgConnection, p: &Policy) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO policies (
            id, policy_number, user_id, policy_type_id, insurance_company_id, status,
            start_date, end_date, premium_amount, coverage_amount, payment_frequency,
            policy_data, beneficiaries, certificate_url, policy_document_url, renewed_from,
            created_at, updated_at, activated_at, cancelled_at, cancellation_reason
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                  $17, $18, $19, $20, $21)
        "#,
    )
    .bind(p.id.into_uuid())
    .bind(&p.policy_number)
    .bind(p.user_id.into_uuid())
    .bind(p.policy_type_id.into_uuid())
    .bind(p.insurance_company_id.into_uuid())
    .bind(p.status.as_str())
    .bind(p.start_date)
    .bind(p.end_date)
    .bind(p.premium_amount.amount())
    .bind(p.coverage_amount.amount())
    .bind(p.payment_frequency.as_str())
    .bind(&p.policy_data)
    .bind(&p.beneficiaries)
    .bind(&p.certificate_url)
    .bind(&p.policy_document_url)
    .bind(p.renewed_from.map(|r| r.into_uuid()))
    .bind(p.created_at)
    .bind(p.updated_at)
    .bind(p.activated_at)
    .bind(p.cancelled_at)
    .bind(&p.cancellation_reason)
    .execute(conn)
    .await
    .map_err(|e| match DatabaseError::from(e) {
        DatabaseError::DuplicateEntry(_) => DatabaseError::duplicate("Policy", "number", &p.policy_number),
        other => other,
    })?;
    Ok(())
}

async fn update_lifecycle(conn: &mut PgConnection, p: &Policy) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE policies
        SET status = $2, certificate_url = $3, policy_document_url = $4, updated_at = $5,
            activated_at = $6, cancelled_at = $7, cancellation_reason = $8
        WHERE id = $1
        "#,
    )
    .bind(p.id.into_uuid())
    .bind(p.status.as_str())
    .bind(&p.certificate_url)
    .bind(&p.policy_document_url)
    .bind(p.updated_at)
    .bind(p.activated_at)
    .bind(p.cancelled_at)
    .bind(&p.cancellation_reason)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Policy", p.id));
    }
    Ok(())
}
