//! Documents, notifications and workflow DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::PolicyId;
use domain_documents::{DocumentType, NewDocument};

#[derive(Debug, Deserialize, Validate)]
pub struct DocumentInput {
    pub policy_id: Option<Uuid>,
    pub doc_type: DocumentType,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    /// Storage key of the uploaded file
    pub s3_key: String,
    pub file_size: i64,
    #[serde(default = "default_mime")]
    pub mime_type: String,
}

fn default_mime() -> String {
    "application/octet-stream".to_string()
}

impl From<DocumentInput> for NewDocument {
    fn from(input: DocumentInput) -> Self {
        NewDocument {
            policy_id: input.policy_id.map(PolicyId::from_uuid),
            doc_type: input.doc_type,
            title: input.title,
            filename: input.filename,
            s3_key: input.s3_key,
            file_size: input.file_size,
            mime_type: input.mime_type,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DocumentQuery {
    #[serde(rename = "type")]
    pub doc_type: Option<DocumentType>,
    pub policy_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub url: String,
    pub filename: String,
    pub mime_type: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub read: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SystemMessageInput {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct StageNotes {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StageAssignment {
    /// Defaults to the caller
    pub user_id: Option<Uuid>,
}
