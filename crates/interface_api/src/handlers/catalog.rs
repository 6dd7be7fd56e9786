//! Public catalog: companies, categories and policy types

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use core_kernel::{CompanyId, PolicyTypeId};
use domain_policy::{InsuranceCompany, PolicyReview, PolicyType};
use infra_db::{CategoryListing, DatabaseError};

use crate::dto::catalog::TypeQuery;
use crate::dto::Listing;
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::AppState;

const FEATURED_LIMIT: i64 = 6;

pub async fn list_companies(State(state): State<AppState>) -> Result<Json<Listing<InsuranceCompany>>, ApiError> {
    Ok(Json(state.catalog().list_companies(true).await?.into()))
}

pub async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InsuranceCompany>, ApiError> {
    let company = state.catalog().find_company(CompanyId::from_uuid(id)).await?;
    if !company.is_active {
        return Err(DatabaseError::not_found("InsuranceCompany", id).into());
    }
    Ok(Json(company))
}

/// Active categories by display order, with their published type counts
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Listing<CategoryListing>>, ApiError> {
    Ok(Json(state.catalog().list_categories(true).await?.into()))
}

/// Category by id or slug
pub async fn get_category(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<CategoryListing>, ApiError> {
    let listing = state.catalog().find_category(&key).await?;
    if !listing.category.is_active {
        return Err(DatabaseError::not_found("PolicyCategory", &key).into());
    }
    Ok(Json(listing))
}

pub async fn list_types(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TypeQuery>,
) -> Result<Json<Listing<PolicyType>>, ApiError> {
    let filter = query.into_filter(true);
    Ok(Json(state.catalog().list_types(&filter).await?.into()))
}

pub async fn featured_types(State(state): State<AppState>) -> Result<Json<Vec<PolicyType>>, ApiError> {
    Ok(Json(state.catalog().featured_types(FEATURED_LIMIT).await?))
}

/// Published type by id or slug
pub async fn get_type(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<PolicyType>, ApiError> {
    Ok(Json(published_type(&state, &key).await?))
}

/// Published reviews of a type
pub async fn type_reviews(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Listing<PolicyReview>>, ApiError> {
    let policy_type = published_type(&state, &key).await?;
    Ok(Json(state.policies().reviews_for_type(policy_type.id, true).await?.into()))
}

async fn published_type(state: &AppState, key: &str) -> Result<PolicyType, ApiError> {
    let catalog = state.catalog();
    let policy_type = match Uuid::parse_str(key) {
        Ok(id) => catalog.find_type(PolicyTypeId::from_uuid(id)).await?,
        Err(_) => catalog.find_type_by_slug(key).await?,
    };
    if !policy_type.is_purchasable() {
        return Err(DatabaseError::not_found("PolicyType", key).into());
    }
    Ok(policy_type)
}
