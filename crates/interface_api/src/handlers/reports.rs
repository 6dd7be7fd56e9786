//! Back-office reports and their CSV export

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;

use core_kernel::calendar;
use domain_analytics::{fill_months, percentage, MonthlyPoint};
use infra_db::{Breakdown, ClaimDimension, PolicyDimension, ReportRange};

use crate::dto::admin::*;
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::middleware::AuthUser;
use crate::AppState;

/// Monthly series of a report; an open range shows the last twelve months zero-filled
fn series(range: ReportRange, rows: Vec<(NaiveDate, Decimal)>) -> Vec<MonthlyPoint> {
    if range.from.is_none() && range.to.is_none() {
        return fill_months(calendar::today(), 12, rows);
    }
    rows.into_iter().map(|(month, value)| MonthlyPoint::for_month(month, value)).collect()
}

async fn sales_report(state: &AppState, range: ReportRange) -> Result<SalesReport, ApiError> {
    let by_category = state.analytics().policies_by(PolicyDimension::Category, range).await?;
    Ok(SalesReport {
        total_policies: by_category.iter().map(|b| b.count).sum(),
        total_premium: by_category.iter().map(|b| b.amount).sum(),
        by_category,
    })
}

async fn revenue_report(state: &AppState, range: ReportRange) -> Result<RevenueReport, ApiError> {
    let analytics = state.analytics();
    let total = analytics.revenue_total(range).await?;
    let rows = analytics.monthly_revenue(range).await?;
    Ok(RevenueReport {
        total_revenue: total.amount,
        transaction_count: total.count,
        monthly: series(range, rows),
    })
}

async fn claims_report(state: &AppState, range: ReportRange) -> Result<ClaimsReport, ApiError> {
    let analytics = state.analytics();
    let by_status = analytics.claims_by(ClaimDimension::Status, range).await?;
    let approved = analytics.approved_claims(range).await?;
    let total_premium: Decimal = analytics
        .policies_by(PolicyDimension::Status, range)
        .await?
        .iter()
        .map(|b| b.amount)
        .sum();

    let average_approved = if approved.count > 0 {
        (approved.amount / Decimal::from(approved.count)).round_dp(2)
    } else {
        Decimal::ZERO
    };
    Ok(ClaimsReport {
        by_status,
        approved_count: approved.count,
        total_approved: approved.amount,
        average_approved,
        claims_ratio: percentage(approved.amount, total_premium),
        total_premium,
    })
}

async fn user_growth_report(state: &AppState, range: ReportRange) -> Result<UserGrowthReport, ApiError> {
    let analytics = state.analytics();
    let rows = analytics.monthly_new_users(range).await?;
    Ok(UserGrowthReport {
        monthly: series(range, rows),
        by_role: analytics.users_by_role().await?,
    })
}

pub async fn sales(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> Result<Json<SalesReport>, ApiError> {
    caller.require_staff()?;
    Ok(Json(sales_report(&state, query.range()?).await?))
}

pub async fn revenue(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> Result<Json<RevenueReport>, ApiError> {
    caller.require_staff()?;
    Ok(Json(revenue_report(&state, query.range()?).await?))
}

pub async fn claims(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> Result<Json<ClaimsReport>, ApiError> {
    caller.require_staff()?;
    Ok(Json(claims_report(&state, query.range()?).await?))
}

pub async fn user_growth(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> Result<Json<UserGrowthReport>, ApiError> {
    caller.require_staff()?;
    Ok(Json(user_growth_report(&state, query.range()?).await?))
}

/// Accumulates CSV rows in memory; sections may differ in width
struct Sheet {
    writer: csv::Writer<Vec<u8>>,
}

impl Sheet {
    fn new() -> Self {
        Self { writer: csv::WriterBuilder::new().flexible(true).from_writer(Vec::new()) }
    }

    fn row<I, T>(&mut self, fields: I) -> Result<&mut Self, ApiError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(fields)?;
        Ok(self)
    }

    fn breakdowns(&mut self, rows: &[Breakdown]) -> Result<&mut Self, ApiError> {
        self.row(["key", "count", "amount"])?;
        for b in rows {
            self.row([b.key.clone(), b.count.to_string(), b.amount.to_string()])?;
        }
        Ok(self)
    }

    fn months(&mut self, points: &[MonthlyPoint]) -> Result<&mut Self, ApiError> {
        self.row(["month", "label", "value"])?;
        for p in points {
            self.row([p.month.clone(), p.label.clone(), p.value.to_string()])?;
        }
        Ok(self)
    }

    fn finish(self) -> Result<Vec<u8>, ApiError> {
        self.writer
            .into_inner()
            .map_err(|e| ApiError::Internal(format!("CSV export failed: {}", e)))
    }
}

/// One of the four reports as a CSV attachment
pub async fn export(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(report): Path<String>,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> Result<Response, ApiError> {
    caller.require_staff()?;
    let range = query.range()?;
    let mut sheet = Sheet::new();

    match report.as_str() {
        "sales" => {
            let r = sales_report(&state, range).await?;
            sheet
                .row(["total_policies", "total_premium"])?
                .row([r.total_policies.to_string(), r.total_premium.to_string()])?
                .breakdowns(&r.by_category)?;
        }
        "revenue" => {
            let r = revenue_report(&state, range).await?;
            sheet
                .row(["total_revenue", "transaction_count"])?
                .row([r.total_revenue.to_string(), r.transaction_count.to_string()])?
                .months(&r.monthly)?;
        }
        "claims" => {
            let r = claims_report(&state, range).await?;
            sheet
                .row(["approved_count", "total_approved", "average_approved", "total_premium", "claims_ratio"])?
                .row([
                    r.approved_count.to_string(),
                    r.total_approved.to_string(),
                    r.average_approved.to_string(),
                    r.total_premium.to_string(),
                    r.claims_ratio.to_string(),
                ])?
                .breakdowns(&r.by_status)?;
        }
        "user-growth" | "user_growth" => {
            let r = user_growth_report(&state, range).await?;
            sheet.months(&r.monthly)?.breakdowns(&r.by_role)?;
        }
        other => return Err(ApiError::NotFound(format!("Unknown report: {}", other))),
    }

    let body = sheet.finish()?;
    info!(report = %report, bytes = body.len(), exported_by = %caller.id, "Report exported");
    let disposition = format!("attachment; filename=\"{}-report.csv\"", report.replace('_', "-"));
    Ok((
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()), (header::CONTENT_DISPOSITION, disposition)],
        body,
    )
        .into_response())
}
