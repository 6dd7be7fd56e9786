//! The signed-in customer's dashboard

use axum::{extract::State, Json};
use chrono::Duration;

use core_kernel::calendar;
use domain_analytics::{recommend, Recommendation, UserActivity, EXPIRY_HORIZON_DAYS};
use domain_billing::{next_due, PaymentSchedule};
use domain_policy::Policy;
use infra_db::ScheduleView;

use crate::dto::insights::*;
use crate::dto::policies::ExpiringQuery;
use crate::dto::Listing;
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::middleware::AuthUser;
use crate::AppState;

const ACTIVITY_LIMIT: i64 = 10;
const UPCOMING_DAYS: i64 = 30;

async fn load_stats(state: &AppState, caller: &AuthUser) -> Result<DashboardStats, ApiError> {
    let payments = state.payments();
    let figures = state.analytics().customer_stats(caller.id).await?;
    let open = payments.schedules(Some(caller.id), ScheduleView::Pending).await?;
    Ok(DashboardStats { figures, next_payment: next_due(&open).cloned() })
}

async fn load_activity(state: &AppState, caller: &AuthUser) -> Result<Vec<UserActivity>, ApiError> {
    Ok(state.analytics().recent_activity(Some(caller.id), ACTIVITY_LIMIT).await?)
}

async fn load_recommendations(state: &AppState, caller: &AuthUser) -> Result<Vec<Recommendation>, ApiError> {
    let today = calendar::today();
    let held = state.policies().held_policies(caller.id).await?;
    let overdue = state
        .payments()
        .schedules(Some(caller.id), ScheduleView::OverdueOn(today))
        .await?;
    Ok(recommend(&held, overdue.len(), today))
}

async fn load_upcoming(state: &AppState, caller: &AuthUser) -> Result<Vec<PaymentSchedule>, ApiError> {
    let today = calendar::today();
    let view = ScheduleView::DueBetween(today, today + Duration::days(UPCOMING_DAYS));
    Ok(state.payments().schedules(Some(caller.id), view).await?)
}

async fn load_expiring(state: &AppState, caller: &AuthUser, days: i64) -> Result<Vec<Policy>, ApiError> {
    let today = calendar::today();
    Ok(state
        .policies()
        .expiring(Some(caller.id), today, today + Duration::days(days))
        .await?)
}

pub async fn overview(State(state): State<AppState>, caller: AuthUser) -> Result<Json<DashboardOverview>, ApiError> {
    let (stats, recent_activity, recommendations, upcoming_payments, expiring_policies) = tokio::try_join!(
        load_stats(&state, &caller),
        load_activity(&state, &caller),
        load_recommendations(&state, &caller),
        load_upcoming(&state, &caller),
        load_expiring(&state, &caller, EXPIRY_HORIZON_DAYS),
    )?;
    Ok(Json(DashboardOverview {
        stats,
        recent_activity,
        recommendations,
        upcoming_payments,
        expiring_policies,
    }))
}

pub async fn stats(State(state): State<AppState>, caller: AuthUser) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(load_stats(&state, &caller).await?))
}

pub async fn activity(State(state): State<AppState>, caller: AuthUser) -> Result<Json<Listing<UserActivity>>, ApiError> {
    Ok(Json(load_activity(&state, &caller).await?.into()))
}

pub async fn recommendations(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Listing<Recommendation>>, ApiError> {
    Ok(Json(load_recommendations(&state, &caller).await?.into()))
}

/// Unpaid installments due in the next 30 days
pub async fn upcoming_payments(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Listing<PaymentSchedule>>, ApiError> {
    Ok(Json(load_upcoming(&state, &caller).await?.into()))
}

pub async fn expiring_policies(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(query): ApiQuery<ExpiringQuery>,
) -> Result<Json<Listing<Policy>>, ApiError> {
    let days = query.horizon(EXPIRY_HORIZON_DAYS)?;
    Ok(Json(load_expiring(&state, &caller, days).await?.into()))
}
