//! Platform analytics for staff

use axum::{extract::State, Json};
use chrono::Utc;

use core_kernel::calendar;
use domain_analytics::{calculate_growth, fill_months, percentage, ComparisonWindows};
use infra_db::{ClaimDimension, Metric, PolicyDimension, ReportRange};

use crate::dto::insights::*;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::AppState;

/// Months covered by the monthly series
const SERIES_MONTHS: u32 = 12;

/// Range covering the last twelve calendar months up to today
pub(crate) fn trailing_year() -> ReportRange {
    let today = calendar::today();
    let from = calendar::trailing_months(today, SERIES_MONTHS).first().copied();
    ReportRange::new(from, Some(today))
}

pub async fn dashboard(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<AnalyticsDashboard>, ApiError> {
    caller.require_staff()?;
    let analytics = state.analytics();
    let now = Utc::now();
    let windows = ComparisonWindows::trailing_days(now, 30);

    let totals = analytics.platform_totals(now).await?;
    let users = analytics.compare(Metric::NewCustomers, &windows).await?;
    let policies = analytics.compare(Metric::NewPolicies, &windows).await?;
    let revenue = analytics.compare(Metric::Revenue, &windows).await?;

    Ok(Json(AnalyticsDashboard {
        totals,
        users_growth: calculate_growth(users.current, users.previous),
        policies_growth: calculate_growth(policies.current, policies.previous),
        revenue_growth: calculate_growth(revenue.current, revenue.previous),
    }))
}

/// Completed revenue per month, zero-filled
pub async fn revenue(State(state): State<AppState>, caller: AuthUser) -> Result<Json<RevenueAnalytics>, ApiError> {
    caller.require_staff()?;
    let rows = state.analytics().monthly_revenue(trailing_year()).await?;
    let monthly = fill_months(calendar::today(), SERIES_MONTHS, rows);
    let total = monthly.iter().map(|p| p.value).sum();
    Ok(Json(RevenueAnalytics { total, monthly }))
}

pub async fn claims(State(state): State<AppState>, caller: AuthUser) -> Result<Json<ClaimsAnalytics>, ApiError> {
    caller.require_staff()?;
    let analytics = state.analytics();
    let all = ReportRange::default();
    let by_status = analytics.claims_by(ClaimDimension::Status, all).await?;
    let by_type = analytics.claims_by(ClaimDimension::Type, all).await?;
    let approved = analytics.approved_claims(all).await?;

    let total_claims: i64 = by_status.iter().map(|b| b.count).sum();
    Ok(Json(ClaimsAnalytics {
        approval_rate: percentage(approved.count.into(), total_claims.into()),
        total_claims,
        approved_claims: approved.count,
        by_status,
        by_type,
    }))
}

pub async fn users(State(state): State<AppState>, caller: AuthUser) -> Result<Json<UserAnalytics>, ApiError> {
    caller.require_staff()?;
    let analytics = state.analytics();
    let by_role = analytics.users_by_role().await?;
    let rows = analytics.monthly_new_users(trailing_year()).await?;
    Ok(Json(UserAnalytics {
        by_role,
        monthly_new_users: fill_months(calendar::today(), SERIES_MONTHS, rows),
    }))
}

pub async fn policies(State(state): State<AppState>, caller: AuthUser) -> Result<Json<PolicyAnalytics>, ApiError> {
    caller.require_staff()?;
    let analytics = state.analytics();
    let all = ReportRange::default();
    Ok(Json(PolicyAnalytics {
        by_category: analytics.policies_by(PolicyDimension::Category, all).await?,
        by_status: analytics.policies_by(PolicyDimension::Status, all).await?,
        by_company: analytics.policies_by(PolicyDimension::Company, all).await?,
    }))
}
