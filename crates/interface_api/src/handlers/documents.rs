//! Customer document vault

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use core_kernel::{DocumentId, PolicyId};
use domain_analytics::{ActivityAction, UserActivity};
use domain_documents::{download_url, Document, NewDocument};
use domain_notifications::{MessageArgs, NotificationKind};
use infra_db::DocumentFilter;

use crate::dto::records::*;
use crate::dto::Listing;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::{AuthUser, ClientInfo};
use crate::notify;
use crate::AppState;

const VAULT_URL: &str = "/dashboard/documents";

async fn visible_document(state: &AppState, caller: &AuthUser, id: Uuid) -> Result<Document, ApiError> {
    let doc = state.documents().find(DocumentId::from_uuid(id)).await?;
    caller.ensure_owner_or_staff(doc.user_id)?;
    Ok(doc)
}

pub async fn list_documents(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(query): ApiQuery<DocumentQuery>,
) -> Result<Json<Listing<Document>>, ApiError> {
    let filter = DocumentFilter {
        user: caller.scope(),
        policy: query.policy_id.map(PolicyId::from_uuid),
        doc_type: query.doc_type,
    };
    Ok(Json(state.documents().list(&filter).await?.into()))
}

pub async fn upload(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiJson(input): ApiJson<DocumentInput>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    input.validate()?;
    let upload: NewDocument = input.into();
    if let Some(policy_id) = upload.policy_id {
        let policy = state.policies().find(policy_id).await?;
        if policy.user_id != caller.id {
            return Err(ApiError::validation("Policy does not belong to you"));
        }
    }
    let doc = Document::upload(caller.id, upload)?;

    let args = MessageArgs::new().with("title", &doc.title);
    let notification = notify::compose(&state, caller.id, NotificationKind::DocumentUploaded, args, VAULT_URL).await?;
    state.documents().create(&doc, &notification).await?;

    info!(document_id = %doc.id, doc_type = %doc.doc_type, "Document uploaded");
    Ok((StatusCode::CREATED, Json(doc)))
}

/// Documents attached to one policy; `policy_id` is required
pub async fn by_policy(
    State(state): State<AppState>,
    caller: AuthUser,
    ApiQuery(query): ApiQuery<DocumentQuery>,
) -> Result<Json<Listing<Document>>, ApiError> {
    let policy_id = query
        .policy_id
        .ok_or_else(|| ApiError::bad_request("policy_id parameter is required"))?;
    let filter = DocumentFilter {
        user: caller.scope(),
        policy: Some(PolicyId::from_uuid(policy_id)),
        doc_type: query.doc_type,
    };
    Ok(Json(state.documents().list(&filter).await?.into()))
}

pub async fn get_document(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, ApiError> {
    Ok(Json(visible_document(&state, &caller, id).await?))
}

pub async fn delete_document(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let doc = visible_document(&state, &caller, id).await?;
    state.documents().delete(doc.id).await?;
    info!(document_id = %doc.id, deleted_by = %caller.id, "Document deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn verify(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, ApiError> {
    caller.require_staff()?;
    let mut doc = state.documents().find(DocumentId::from_uuid(id)).await?;
    doc.verify(caller.id)?;

    let args = MessageArgs::new().with("title", &doc.title);
    let notification = notify::compose(&state, doc.user_id, NotificationKind::DocumentVerified, args, VAULT_URL).await?;
    state.documents().verify(&doc, &notification).await?;

    info!(document_id = %doc.id, verified_by = %caller.id, "Document verified");
    Ok(Json(doc))
}

pub async fn download(
    State(state): State<AppState>,
    caller: AuthUser,
    client: ClientInfo,
    Path(id): Path<Uuid>,
) -> Result<Json<DownloadResponse>, ApiError> {
    let doc = visible_document(&state, &caller, id).await?;
    notify::record(
        &state,
        UserActivity::record(Some(caller.id), ActivityAction::DownloadDocument).on("document", doc.id),
        &client,
    )
    .await;

    Ok(Json(DownloadResponse {
        url: download_url(&state.config.media_url_prefix, &doc.s3_key),
        filename: doc.filename,
        mime_type: doc.mime_type,
    }))
}
