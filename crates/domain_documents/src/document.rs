//! Customer document records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{DocumentId, PolicyId, UserId};

use crate::error::DocumentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    IdCopy,
    KraPin,
    Passport,
    DrivingLicense,
    Logbook,
    Certificate,
    Receipt,
    PolicyDocument,
    ClaimDocument,
    MedicalCard,
    Other,
}

impl DocumentType {
    pub const ALL: [DocumentType; 11] = [
        DocumentType::IdCopy,
        DocumentType::KraPin,
        DocumentType::Passport,
        DocumentType::DrivingLicense,
        DocumentType::Logbook,
        DocumentType::Certificate,
        DocumentType::Receipt,
        DocumentType::PolicyDocument,
        DocumentType::ClaimDocument,
        DocumentType::MedicalCard,
        DocumentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::IdCopy => "id_copy",
            DocumentType::KraPin => "kra_pin",
            DocumentType::Passport => "passport",
            DocumentType::DrivingLicense => "driving_license",
            DocumentType::Logbook => "logbook",
            DocumentType::Certificate => "certificate",
            DocumentType::Receipt => "receipt",
            DocumentType::PolicyDocument => "policy_document",
            DocumentType::ClaimDocument => "claim_document",
            DocumentType::MedicalCard => "medical_card",
            DocumentType::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::IdCopy => "ID Copy",
            DocumentType::KraPin => "KRA PIN",
            DocumentType::Passport => "Passport",
            DocumentType::DrivingLicense => "Driving License",
            DocumentType::Logbook => "Logbook",
            DocumentType::Certificate => "Insurance Certificate",
            DocumentType::Receipt => "Receipt",
            DocumentType::PolicyDocument => "Policy Document",
            DocumentType::ClaimDocument => "Claim Document",
            DocumentType::MedicalCard => "Medical Card",
            DocumentType::Other => "Other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DocumentError::UnknownType(s.to_string()))
    }
}

/// Upload metadata supplied by the client
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub policy_id: Option<PolicyId>,
    pub doc_type: DocumentType,
    pub title: String,
    pub filename: String,
    pub s3_key: String,
    pub file_size: i64,
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub user_id: UserId,
    pub policy_id: Option<PolicyId>,
    pub doc_type: DocumentType,
    pub title: String,
    pub filename: String,
    pub s3_key: String,
    pub file_size: i64,
    pub mime_type: String,
    pub is_verified: bool,
    pub verified_by: Option<UserId>,
    pub verified_at: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Records an upload by `owner`
    ///
    /// Ownership of `policy_id` is checked by the caller against the
    /// database.
    pub fn upload(owner: UserId, input: NewDocument) -> Result<Self, DocumentError> {
        if input.file_size <= 0 {
            return Err(DocumentError::Validation("File size must be greater than zero".into()));
        }
        let title = input.title.trim();
        if title.is_empty() || title.chars().count() > 200 {
            return Err(DocumentError::Validation("Title must be 1-200 characters".into()));
        }
        if input.filename.trim().is_empty() {
            return Err(DocumentError::Validation("Filename is required".into()));
        }
        let s3_key = input.s3_key.trim().trim_start_matches('/');
        if s3_key.is_empty() || s3_key.contains("..") {
            return Err(DocumentError::Validation("Invalid storage key".into()));
        }
        if !input.mime_type.contains('/') {
            return Err(DocumentError::Validation("Invalid MIME type".into()));
        }
        let now = Utc::now();
        Ok(Self {
            id: DocumentId::new_v7(),
            user_id: owner,
            policy_id: input.policy_id,
            doc_type: input.doc_type,
            title: title.to_string(),
            filename: input.filename.trim().to_string(),
            s3_key: s3_key.to_string(),
            file_size: input.file_size,
            mime_type: input.mime_type,
            is_verified: false,
            verified_by: None,
            verified_at: None,
            uploaded_at: now,
            updated_at: now,
        })
    }

    pub fn verify(&mut self, by: UserId) -> Result<(), DocumentError> {
        if self.is_verified {
            return Err(DocumentError::AlreadyVerified);
        }
        let now = Utc::now();
        self.is_verified = true;
        self.verified_by = Some(by);
        self.verified_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}

/// Public location of a stored file under the configured media prefix
pub fn download_url(media_prefix: &str, s3_key: &str) -> String {
    format!(
        "{}/{}",
        media_prefix.trim_end_matches('/'),
        s3_key.trim_start_matches('/')
    )
}
