//! Evidence attached to a claim

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use core_kernel::{ClaimDocumentId, ClaimId, UserId};

use crate::error::ClaimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimDocumentType {
    PoliceReport,
    MedicalReport,
    Photos,
    Videos,
    Receipts,
    Invoices,
    WitnessStatement,
    Other,
}

impl ClaimDocumentType {
    pub const ALL: [ClaimDocumentType; 8] = [
        ClaimDocumentType::PoliceReport,
        ClaimDocumentType::MedicalReport,
        ClaimDocumentType::Photos,
        ClaimDocumentType::Videos,
        ClaimDocumentType::Receipts,
        ClaimDocumentType::Invoices,
        ClaimDocumentType::WitnessStatement,
        ClaimDocumentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimDocumentType::PoliceReport => "police_report",
            ClaimDocumentType::MedicalReport => "medical_report",
            ClaimDocumentType::Photos => "photos",
            ClaimDocumentType::Videos => "videos",
            ClaimDocumentType::Receipts => "receipts",
            ClaimDocumentType::Invoices => "invoices",
            ClaimDocumentType::WitnessStatement => "witness_statement",
            ClaimDocumentType::Other => "other",
        }
    }
}

impl FromStr for ClaimDocumentType {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ClaimDocumentType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ClaimError::Validation(format!("Unknown document type: {}", s)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimDocument {
    pub id: ClaimDocumentId,
    pub claim_id: ClaimId,
    pub document_type: ClaimDocumentType,
    pub title: String,
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
    pub uploaded_by: UserId,
    pub uploaded_at: DateTime<Utc>,
}

impl ClaimDocument {
    pub fn new(
        claim_id: ClaimId,
        document_type: ClaimDocumentType,
        title: impl Into<String>,
        file_url: impl Into<String>,
        file_size: i64,
        mime_type: impl Into<String>,
        uploaded_by: UserId,
    ) -> Result<Self, ClaimError> {
        if file_size <= 0 {
            return Err(ClaimError::Validation("File size must be greater than zero".into()));
        }
        let file_url = file_url.into();
        if file_url.trim().is_empty() {
            return Err(ClaimError::Validation("File location is required".into()));
        }
        Ok(Self {
            id: ClaimDocumentId::new_v7(),
            claim_id,
            document_type,
            title: title.into(),
            file_url,
            file_size,
            mime_type: mime_type.into(),
            uploaded_by,
            uploaded_at: Utc::now(),
        })
    }
}
