//! Activity log and the aggregate queries behind dashboards and reports
//!
//! Month buckets are taken in Africa/Nairobi so a payment made just after
//! local midnight on the 1st lands in the new month.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use core_kernel::{calendar, ActivityId, UserId};
use domain_analytics::{ActivityAction, ComparisonWindows, UserActivity};

use super::parse;
use crate::error::DatabaseError;

#[derive(Debug, FromRow)]
struct ActivityRow {
    id: Uuid,
    user_id: Option<Uuid>,
    action: String,
    resource_type: String,
    resource_id: String,
    ip_address: Option<String>,
    user_agent: String,
    metadata: Value,
    timestamp: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for UserActivity {
    type Error = DatabaseError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        let metadata = match row.metadata {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(UserActivity {
            id: ActivityId::from_uuid(row.id),
            user_id: row.user_id.map(UserId::from_uuid),
            action: parse::<ActivityAction>("user_activities.action", &row.action)?,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            metadata,
            timestamp: row.timestamp,
        })
    }
}

pub(crate) async fn insert_activity(conn: &mut PgConnection, a: &UserActivity) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO user_activities (
            id, user_id, action, resource_type, resource_id, ip_address, user_agent, metadata, timestamp
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(a.id.into_uuid())
    .bind(a.user_id.map(|u| u.into_uuid()))
    .bind(a.action.as_str())
    .bind(&a.resource_type)
    .bind(&a.resource_id)
    .bind(&a.ip_address)
    .bind(&a.user_agent)
    .bind(Value::Object(a.metadata.clone()))
    .bind(a.timestamp)
    .execute(conn)
    .await?;
    Ok(())
}

/// Optional inclusive date bounds of a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReportRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    /// Half-open instant bounds: start of `from`, start of the day after `to`
    ///
    /// A `to` with no following day leaves the upper end open.
    pub fn bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (
            self.from.map(calendar::start_of_day),
            self.to.and_then(|d| d.succ_opt()).map(calendar::start_of_day),
        )
    }
}

/// A count and an amount under one key
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Breakdown {
    pub key: String,
    pub count: i64,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow)]
pub struct PlatformTotals {
    pub total_users: i64,
    pub total_customers: i64,
    pub total_policies: i64,
    pub active_policies: i64,
    pub total_claims: i64,
    pub pending_claims: i64,
    pub total_revenue: Decimal,
    pub revenue_30d: Decimal,
    pub new_users_30d: i64,
    pub new_policies_30d: i64,
}

/// What a period-over-period comparison measures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    NewCustomers,
    NewPolicies,
    ActivatedPolicies,
    Revenue,
    NewClaims,
}

impl Metric {
    fn sql(&self) -> &'static str {
        match self {
            Metric::NewCustomers => {
                "SELECT COUNT(*)::numeric FROM users WHERE role = 'customer' AND created_at >= $1 AND created_at < $2"
            }
            Metric::NewPolicies => {
                "SELECT COUNT(*)::numeric FROM policies WHERE created_at >= $1 AND created_at < $2"
            }
            Metric::ActivatedPolicies => {
                "SELECT COUNT(*)::numeric FROM policies WHERE activated_at >= $1 AND activated_at < $2"
            }
            Metric::Revenue => {
                "SELECT COALESCE(SUM(amount), 0) FROM transactions \
                 WHERE status = 'completed' AND completed_at >= $1 AND completed_at < $2"
            }
            Metric::NewClaims => {
                "SELECT COUNT(*)::numeric FROM claims WHERE filed_date >= $1 AND filed_date < $2"
            }
        }
    }
}

/// A metric over the current window and the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub current: Decimal,
    pub previous: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct CustomerSummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub policy_count: i64,
    pub total_spent: Decimal,
}

/// Headline figures of one customer's dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow)]
pub struct CustomerStats {
    pub active_policies: i64,
    pub total_coverage: Decimal,
    pub pending_claims: i64,
    pub total_paid: Decimal,
}

/// Grouping used by the claim breakdowns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimDimension {
    Status,
    Type,
}

/// Grouping used by the policy breakdowns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDimension {
    Category,
    Status,
    Company,
}

#[derive(Debug, Clone)]
pub struct AnalyticsRepository {
    pool: PgPool,
}

impl AnalyticsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record_activity(&self, activity: &UserActivity) -> Result<(), DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        insert_activity(&mut conn, activity).await
    }

    /// Most recent activity, of one user or platform-wide
    pub async fn recent_activity(&self, user: Option<UserId>, limit: i64) -> Result<Vec<UserActivity>, DatabaseError> {
        sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT id, user_id, action, resource_type, resource_id, ip_address, user_agent,
                   metadata, timestamp
            FROM user_activities
            WHERE ($1::uuid IS NULL OR user_id = $1)
            ORDER BY timestamp DESC
            LIMIT $2
            "#,
        )
        .bind(user.map(|u| u.into_uuid()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(UserActivity::try_from)
        .collect()
    }

    pub async fn platform_totals(&self, now: DateTime<Utc>) -> Result<PlatformTotals, DatabaseError> {
        let since = now - Duration::days(30);
        let totals = sqlx::query_as::<_, PlatformTotals>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM users WHERE role = 'customer') AS total_customers,
                (SELECT COUNT(*) FROM policies) AS total_policies,
                (SELECT COUNT(*) FROM policies WHERE status = 'active') AS active_policies,
                (SELECT COUNT(*) FROM claims) AS total_claims,
                (SELECT COUNT(*) FROM claims
                 WHERE status IN ('submitted', 'under_review', 'documents_requested')) AS pending_claims,
                (SELECT COALESCE(SUM(amount), 0) FROM transactions
                 WHERE status = 'completed') AS total_revenue,
                (SELECT COALESCE(SUM(amount), 0) FROM transactions
                 WHERE status = 'completed' AND completed_at >= $1) AS revenue_30d,
                (SELECT COUNT(*) FROM users WHERE created_at >= $1) AS new_users_30d,
                (SELECT COUNT(*) FROM policies WHERE created_at >= $1) AS new_policies_30d
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(totals)
    }

    pub async fn compare(&self, metric: Metric, windows: &ComparisonWindows) -> Result<Comparison, DatabaseError> {
        let current: Decimal = sqlx::query_scalar(metric.sql())
            .bind(windows.current_start)
            .bind(windows.end)
            .fetch_one(&self.pool)
            .await?;
        let previous: Decimal = sqlx::query_scalar(metric.sql())
            .bind(windows.previous_start)
            .bind(windows.current_start)
            .fetch_one(&self.pool)
            .await?;
        Ok(Comparison { current, previous })
    }

    /// Completed revenue per local calendar month
    pub async fn monthly_revenue(&self, range: ReportRange) -> Result<Vec<(NaiveDate, Decimal)>, DatabaseError> {
        let (from, to) = range.bounds();
        let rows: Vec<(NaiveDate, Decimal)> = sqlx::query_as(
            r#"
            SELECT date_trunc('month', completed_at AT TIME ZONE 'Africa/Nairobi')::date AS month,
                   SUM(amount)
            FROM transactions
            WHERE status = 'completed'
              AND ($1::timestamptz IS NULL OR completed_at >= $1)
              AND ($2::timestamptz IS NULL OR completed_at < $2)
            GROUP BY month
            ORDER BY month
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Completed revenue and payment count in the range
    pub async fn revenue_total(&self, range: ReportRange) -> Result<Breakdown, DatabaseError> {
        let (from, to) = range.bounds();
        let row = sqlx::query_as::<_, Breakdown>(
            r#"
            SELECT 'completed' AS key, COUNT(*) AS count, COALESCE(SUM(amount), 0) AS amount
            FROM transactions
            WHERE status = 'completed'
              AND ($1::timestamptz IS NULL OR completed_at >= $1)
              AND ($2::timestamptz IS NULL OR completed_at < $2)
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Registrations per local calendar month
    pub async fn monthly_new_users(&self, range: ReportRange) -> Result<Vec<(NaiveDate, Decimal)>, DatabaseError> {
        let (from, to) = range.bounds();
        let rows: Vec<(NaiveDate, i64)> = sqlx::query_as(
            r#"
            SELECT date_trunc('month', created_at AT TIME ZONE 'Africa/Nairobi')::date AS month,
                   COUNT(*)
            FROM users
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at < $2)
            GROUP BY month
            ORDER BY month
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(month, n)| (month, Decimal::from(n))).collect())
    }

    /// Claim counts and claimed amounts, grouped by status or type
    pub async fn claims_by(&self, dimension: ClaimDimension, range: ReportRange) -> Result<Vec<Breakdown>, DatabaseError> {
        let column = match dimension {
            ClaimDimension::Status => "status",
            ClaimDimension::Type => "claim_type",
        };
        let (from, to) = range.bounds();
        let sql = format!(
            r#"
            SELECT {column} AS key, COUNT(*) AS count, COALESCE(SUM(amount_claimed), 0) AS amount
            FROM claims
            WHERE ($1::timestamptz IS NULL OR filed_date >= $1)
              AND ($2::timestamptz IS NULL OR filed_date < $2)
            GROUP BY {column}
            ORDER BY count DESC, key
            "#
        );
        let rows = sqlx::query_as::<_, Breakdown>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Approved claims in the range: how many and how much in total
    pub async fn approved_claims(&self, range: ReportRange) -> Result<Breakdown, DatabaseError> {
        let (from, to) = range.bounds();
        let row = sqlx::query_as::<_, Breakdown>(
            r#"
            SELECT 'approved' AS key, COUNT(*) AS count, COALESCE(SUM(amount_approved), 0) AS amount
            FROM claims
            WHERE amount_approved IS NOT NULL
              AND status IN ('approved', 'settled')
              AND ($1::timestamptz IS NULL OR filed_date >= $1)
              AND ($2::timestamptz IS NULL OR filed_date < $2)
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Policy counts and premiums, grouped by category, status or company
    pub async fn policies_by(&self, dimension: PolicyDimension, range: ReportRange) -> Result<Vec<Breakdown>, DatabaseError> {
        let (key, joins) = match dimension {
            PolicyDimension::Category => (
                "c.name",
                "JOIN policy_types t ON t.id = p.policy_type_id \
                 JOIN policy_categories c ON c.id = t.category_id",
            ),
            PolicyDimension::Status => ("p.status", ""),
            PolicyDimension::Company => (
                "ic.name",
                "JOIN insurance_companies ic ON ic.id = p.insurance_company_id",
            ),
        };
        let (from, to) = range.bounds();
        let sql = format!(
            r#"
            SELECT {key} AS key, COUNT(*) AS count, COALESCE(SUM(p.premium_amount), 0) AS amount
            FROM policies p {joins}
            WHERE ($1::timestamptz IS NULL OR p.created_at >= $1)
              AND ($2::timestamptz IS NULL OR p.created_at < $2)
            GROUP BY {key}
            ORDER BY count DESC, key
            "#
        );
        let rows = sqlx::query_as::<_, Breakdown>(&sql)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn users_by_role(&self) -> Result<Vec<Breakdown>, DatabaseError> {
        let rows = sqlx::query_as::<_, Breakdown>(
            r#"
            SELECT role AS key, COUNT(*) AS count, 0::numeric AS amount
            FROM users
            GROUP BY role
            ORDER BY count DESC, key
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Newest customers with how many policies they hold and what they paid
    pub async fn recent_customers(&self, limit: i64) -> Result<Vec<CustomerSummary>, DatabaseError> {
        let rows = sqlx::query_as::<_, CustomerSummary>(
            r#"
            SELECT u.id, u.email, u.first_name, u.last_name, u.phone_number, u.created_at,
                (SELECT COUNT(*) FROM policies p WHERE p.user_id = u.id) AS policy_count,
                (SELECT COALESCE(SUM(t.amount), 0) FROM transactions t
                 WHERE t.user_id = u.id AND t.status = 'completed') AS total_spent
            FROM users u
            WHERE u.role = 'customer'
            ORDER BY u.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn customer_stats(&self, user: UserId) -> Result<CustomerStats, DatabaseError> {
        let stats = sqlx::query_as::<_, CustomerStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM policies WHERE user_id = $1 AND status = 'active') AS active_policies,
                (SELECT COALESCE(SUM(coverage_amount), 0) FROM policies
                 WHERE user_id = $1 AND status = 'active') AS total_coverage,
                (SELECT COUNT(*) FROM claims WHERE user_id = $1
                 AND status IN ('submitted', 'under_review', 'documents_requested')) AS pending_claims,
                (SELECT COALESCE(SUM(amount), 0) FROM transactions
                 WHERE user_id = $1 AND status = 'completed') AS total_paid
            "#,
        )
        .bind(user.into_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }
}
