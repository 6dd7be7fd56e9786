//! Back-office: users, catalog upkeep, back-office listings and settings
//!
//! Every handler here requires staff privileges; role changes require an admin.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use core_kernel::{CategoryId, CompanyId, Money, PolicyId, PolicyTypeId, UserId};
use domain_analytics::{calculate_growth, ComparisonWindows};
use domain_billing::Transaction;
use domain_claims::{Claim, ClaimStatus};
use domain_policy::{unique_slug, InsuranceCompany, Policy, PolicyCategory, PolicyType};
use domain_users::{Role, User};
use infra_db::{CategoryListing, ClaimFilter, Comparison, Metric, Page, TransactionFilter};

use crate::config::PublicSettings;
use crate::dto::admin::*;
use crate::dto::catalog::TypeQuery;
use crate::dto::claims::ClaimQuery;
use crate::dto::payments::TransactionQuery;
use crate::dto::policies::{CancelRequest, PolicyQuery};
use crate::dto::Listing;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::handlers::page;
use crate::handlers::policies::activate_policy;
use crate::middleware::AuthUser;
use crate::AppState;

const RECENT_LIMIT: i64 = 10;
const PENDING_TASKS: i64 = 5;

fn card(value: impl Into<Decimal>, change: Comparison) -> MetricCard {
    MetricCard {
        value: value.into(),
        growth: calculate_growth(change.current, change.previous),
    }
}

pub async fn dashboard(State(state): State<AppState>, caller: AuthUser) -> Result<Json<AdminDashboard>, ApiError> {
    caller.require_staff()?;
    let analytics = state.analytics();
    let now = Utc::now();
    let windows = ComparisonWindows::trailing_days(now, 30);
    let totals = analytics.platform_totals(now).await?;

    let metrics = DashboardMetrics {
        total_customers: card(totals.total_customers, analytics.compare(Metric::NewCustomers, &windows).await?),
        active_policies: card(totals.active_policies, analytics.compare(Metric::ActivatedPolicies, &windows).await?),
        revenue_30_days: card(totals.revenue_30d, analytics.compare(Metric::Revenue, &windows).await?),
        pending_claims: card(totals.pending_claims, analytics.compare(Metric::NewClaims, &windows).await?),
    };

    let recent_transactions = state
        .payments()
        .list_transactions(&TransactionFilter::default(), Page::first(RECENT_LIMIT))
        .await?;
    let recent_customers = analytics.recent_customers(RECENT_LIMIT).await?;
    let pending_tasks = state
        .claims()
        .list(
            &ClaimFilter { status: Some(ClaimStatus::Submitted), ..ClaimFilter::default() },
            Page::first(PENDING_TASKS),
        )
        .await?;

    Ok(Json(AdminDashboard { metrics, recent_transactions, recent_customers, pending_tasks }))
}

// Users

pub async fn list_users(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(requested): ApiQuery<Page>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<Json<Listing<User>>, ApiError> {
    caller.require_staff()?;
    Ok(Json(state.users().list(&query.into(), page(requested)).await?.into()))
}

pub async fn get_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    caller.require_staff()?;
    Ok(Json(state.users().find_by_id(UserId::from_uuid(id)).await?))
}

pub async fn update_role(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(update): ApiJson<RoleUpdate>,
) -> Result<Json<User>, ApiError> {
    caller.require_admin()?;
    let users = state.users();
    let mut user = users.find_by_id(UserId::from_uuid(id)).await?;
    if user.id == caller.id && update.role != user.role {
        return Err(ApiError::bad_request("You cannot change your own role"));
    }
    let previous = user.role;
    user.change_role(update.role);
    users.save(&user).await?;

    info!(user_id = %user.id, from = %previous, to = %user.role, changed_by = %caller.id, "User role changed");
    Ok(Json(user))
}

pub async fn suspend_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    caller.require_staff()?;
    let users = state.users();
    let mut user = users.find_by_id(UserId::from_uuid(id)).await?;
    if user.id == caller.id {
        return Err(ApiError::bad_request("You cannot suspend your own account"));
    }
    user.suspend();
    users.save(&user).await?;

    info!(user_id = %user.id, suspended_by = %caller.id, "User suspended");
    Ok(Json(user))
}

pub async fn activate_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    caller.require_staff()?;
    let users = state.users();
    let mut user = users.find_by_id(UserId::from_uuid(id)).await?;
    user.activate();
    users.save(&user).await?;

    info!(user_id = %user.id, activated_by = %caller.id, "User activated");
    Ok(Json(user))
}

// Back-office listings

pub async fn list_claims(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(requested): ApiQuery<Page>,
    ApiQuery(query): ApiQuery<ClaimQuery>,
) -> Result<Json<Listing<Claim>>, ApiError> {
    caller.require_staff()?;
    Ok(Json(state.claims().list(&query.into_filter(None), page(requested)).await?.into()))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(requested): ApiQuery<Page>,
    ApiQuery(query): ApiQuery<TransactionQuery>,
) -> Result<Json<Listing<Transaction>>, ApiError> {
    caller.require_staff()?;
    let filter = query.into_filter(None);
    Ok(Json(state.payments().list_transactions(&filter, page(requested)).await?.into()))
}

pub async fn list_policies(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(requested): ApiQuery<Page>,
    ApiQuery(query): ApiQuery<PolicyQuery>,
) -> Result<Json<Listing<Policy>>, ApiError> {
    caller.require_staff()?;
    Ok(Json(state.policies().list(&query.into_filter(None), page(requested)).await?.into()))
}

pub async fn approve_policy(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Policy>, ApiError> {
    caller.require_staff()?;
    let policy = activate_policy(&state, PolicyId::from_uuid(id)).await?;
    info!(policy_id = %policy.id, approved_by = %caller.id, "Policy approved");
    Ok(Json(policy))
}

pub async fn cancel_policy(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<ApiJson<CancelRequest>>,
) -> Result<Json<Policy>, ApiError> {
    caller.require_staff()?;
    let policies = state.policies();
    let mut policy = policies.find(PolicyId::from_uuid(id)).await?;
    let reason = body
        .and_then(|ApiJson(request)| request.reason)
        .unwrap_or_else(|| "Cancelled by staff".to_string());
    policy.cancel(reason)?;
    let voided = policies.cancel(&policy).await?;

    info!(policy_id = %policy.id, cancelled_by = %caller.id, voided_installments = voided, "Policy cancelled");
    Ok(Json(policy))
}

// Policy types

/// All types, drafts and delisted included
pub async fn list_types(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(query): ApiQuery<TypeQuery>,
) -> Result<Json<Listing<PolicyType>>, ApiError> {
    caller.require_staff()?;
    Ok(Json(state.catalog().list_types(&query.into_filter(false)).await?.into()))
}

pub async fn create_type(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(input): ApiJson<TypeInput>,
) -> Result<(StatusCode, Json<PolicyType>), ApiError> {
    caller.require_staff()?;
    input.validate()?;
    let catalog = state.catalog();
    catalog.find_company(input.company_id()).await?;
    catalog.find_category(&input.category_id.to_string()).await?;

    let taken = catalog.taken_slugs(&input.name).await?;
    let slug = unique_slug(&input.name, |s| taken.contains(s));
    let mut policy_type = PolicyType::new(
        input.category_id(),
        input.company_id(),
        input.name.clone(),
        slug,
        Money::kes(input.base_premium),
    );
    input.apply(&mut policy_type);
    policy_type.validate()?;
    catalog.save_type(&policy_type).await?;

    info!(policy_type_id = %policy_type.id, slug = %policy_type.slug, "Policy type created");
    Ok((StatusCode::CREATED, Json(policy_type)))
}

pub async fn get_type(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PolicyType>, ApiError> {
    caller.require_staff()?;
    Ok(Json(state.catalog().find_type(PolicyTypeId::from_uuid(id)).await?))
}

pub async fn update_type(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<TypeInput>,
) -> Result<Json<PolicyType>, ApiError> {
    caller.require_staff()?;
    input.validate()?;
    let catalog = state.catalog();
    let mut policy_type = catalog.find_type(PolicyTypeId::from_uuid(id)).await?;

    if input.name.trim() != policy_type.name {
        let mut taken = catalog.taken_slugs(&input.name).await?;
        taken.remove(&policy_type.slug);
        policy_type.slug = unique_slug(&input.name, |s| taken.contains(s));
    }
    input.apply(&mut policy_type);
    policy_type.validate()?;
    catalog.save_type(&policy_type).await?;
    Ok(Json(policy_type))
}

pub async fn delete_type(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    caller.require_staff()?;
    state.catalog().delete_type(PolicyTypeId::from_uuid(id)).await?;
    info!(policy_type_id = %id, deleted_by = %caller.id, "Policy type deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn set_type_status(
    state: &AppState,
    caller: &AuthUser,
    id: Uuid,
    change: impl FnOnce(&mut PolicyType),
) -> Result<PolicyType, ApiError> {
    caller.require_staff()?;
    let catalog = state.catalog();
    let mut policy_type = catalog.find_type(PolicyTypeId::from_uuid(id)).await?;
    change(&mut policy_type);
    catalog.save_type(&policy_type).await?;
    info!(policy_type_id = %policy_type.id, status = %policy_type.status, "Policy type status changed");
    Ok(policy_type)
}

pub async fn publish_type(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PolicyType>, ApiError> {
    Ok(Json(set_type_status(&state, &caller, id, PolicyType::publish).await?))
}

pub async fn delist_type(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PolicyType>, ApiError> {
    Ok(Json(set_type_status(&state, &caller, id, PolicyType::delist).await?))
}

// Insurance companies

pub async fn list_companies(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Listing<InsuranceCompany>>, ApiError> {
    caller.require_staff()?;
    Ok(Json(state.catalog().list_companies(false).await?.into()))
}

pub async fn create_company(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(input): ApiJson<CompanyInput>,
) -> Result<(StatusCode, Json<InsuranceCompany>), ApiError> {
    caller.require_staff()?;
    input.validate()?;
    let mut company = InsuranceCompany::new(&input.name, &input.contact_email, &input.contact_phone);
    input.apply(&mut company);
    company.validate()?;
    state.catalog().save_company(&company).await?;

    info!(company_id = %company.id, name = %company.name, "Insurance company created");
    Ok((StatusCode::CREATED, Json(company)))
}

pub async fn get_company(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<InsuranceCompany>, ApiError> {
    caller.require_staff()?;
    Ok(Json(state.catalog().find_company(CompanyId::from_uuid(id)).await?))
}

pub async fn update_company(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<CompanyInput>,
) -> Result<Json<InsuranceCompany>, ApiError> {
    caller.require_staff()?;
    input.validate()?;
    let catalog = state.catalog();
    let mut company = catalog.find_company(CompanyId::from_uuid(id)).await?;
    input.apply(&mut company);
    company.validate()?;
    catalog.save_company(&company).await?;
    Ok(Json(company))
}

pub async fn delete_company(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    caller.require_staff()?;
    state.catalog().delete_company(CompanyId::from_uuid(id)).await?;
    info!(company_id = %id, deleted_by = %caller.id, "Insurance company deleted");
    Ok(StatusCode::NO_CONTENT)
}

// Categories

pub async fn list_categories(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Listing<CategoryListing>>, ApiError> {
    caller.require_staff()?;
    Ok(Json(state.catalog().list_categories(false).await?.into()))
}

pub async fn create_category(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<(StatusCode, Json<PolicyCategory>), ApiError> {
    caller.require_staff()?;
    input.validate()?;
    let mut category = PolicyCategory::new(&input.name, "");
    input.apply(&mut category);
    if category.slug.is_empty() {
        return Err(ApiError::validation("Category name must contain letters or digits"));
    }
    state.catalog().save_category(&category).await?;

    info!(category_id = %category.id, slug = %category.slug, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn get_category(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CategoryListing>, ApiError> {
    caller.require_staff()?;
    Ok(Json(state.catalog().find_category(&id.to_string()).await?))
}

pub async fn update_category(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<Json<PolicyCategory>, ApiError> {
    caller.require_staff()?;
    input.validate()?;
    let catalog = state.catalog();
    let mut category = catalog.find_category(&id.to_string()).await?.category;
    input.apply(&mut category);
    if category.slug.is_empty() {
        return Err(ApiError::validation("Category name must contain letters or digits"));
    }
    catalog.save_category(&category).await?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    caller.require_staff()?;
    state.catalog().delete_category(CategoryId::from_uuid(id)).await?;
    info!(category_id = %id, deleted_by = %caller.id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

// Settings

/// Effective configuration without secrets
pub async fn settings(State(state): State<AppState>, caller: AuthUser) -> Result<Json<PublicSettings>, ApiError> {
    caller.require_staff()?;
    Ok(Json(state.config.public_settings()))
}

pub async fn roles(caller: AuthUser) -> Result<Json<Vec<RoleInfo>>, ApiError> {
    caller.require_staff()?;
    let roles = Role::ALL
        .iter()
        .map(|role| RoleInfo { role: *role, description: role.description() })
        .collect();
    Ok(Json(roles))
}
