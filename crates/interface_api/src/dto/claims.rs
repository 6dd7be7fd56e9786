//! Claim DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use core_kernel::{Money, PolicyId, UserId};
use domain_claims::{
    Claim, ClaimDocument, ClaimDocumentType, ClaimEdit, ClaimSettlement, ClaimStatus, ClaimType, NewClaim,
    SettlementMethod, SettlementRequest, StatusChange,
};
use infra_db::ClaimFilter;

#[derive(Debug, Deserialize, Validate)]
pub struct ClaimInput {
    pub policy_id: Uuid,
    pub claim_type: ClaimType,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub incident_date: NaiveDate,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub incident_location: String,
    pub amount_claimed: Decimal,
}

impl ClaimInput {
    pub fn policy_id(&self) -> PolicyId {
        PolicyId::from_uuid(self.policy_id)
    }

    pub fn into_new_claim(self) -> NewClaim {
        NewClaim {
            claim_type: self.claim_type,
            description: self.description,
            incident_date: self.incident_date,
            incident_location: self.incident_location,
            amount_claimed: Money::kes(self.amount_claimed),
        }
    }
}

/// Claimant edits, or a staff status change with notes
#[derive(Debug, Default, Deserialize)]
pub struct ClaimUpdate {
    pub description: Option<String>,
    pub incident_location: Option<String>,
    pub amount_claimed: Option<Decimal>,
    pub status: Option<ClaimStatus>,
    pub notes: Option<String>,
}

impl ClaimUpdate {
    pub fn edit(&self) -> ClaimEdit {
        ClaimEdit {
            description: self.description.clone(),
            incident_location: self.incident_location.clone(),
            amount_claimed: self.amount_claimed.map(Money::kes),
        }
    }

    pub fn has_edits(&self) -> bool {
        self.description.is_some() || self.incident_location.is_some() || self.amount_claimed.is_some()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaimQuery {
    pub status: Option<ClaimStatus>,
    #[serde(rename = "type")]
    pub claim_type: Option<ClaimType>,
    pub policy: Option<Uuid>,
    pub assessor: Option<Uuid>,
    pub search: Option<String>,
}

impl ClaimQuery {
    pub fn into_filter(self, user: Option<UserId>) -> ClaimFilter {
        ClaimFilter {
            user,
            status: self.status,
            claim_type: self.claim_type,
            policy: self.policy.map(PolicyId::from_uuid),
            assessor: self.assessor.map(UserId::from_uuid),
            pending_review: false,
            search: self.search.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub assessor_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotesRequest {
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub amount_approved: Decimal,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub rejection_reason: String,
}

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub settlement_method: SettlementMethod,
    pub amount: Option<Decimal>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub mpesa_phone: Option<String>,
    pub cheque_number: Option<String>,
    pub transaction_reference: Option<String>,
    #[serde(default)]
    pub notes: String,
}

impl SettleRequest {
    pub fn into_parts(self) -> (SettlementMethod, SettlementRequest) {
        (
            self.settlement_method,
            SettlementRequest {
                amount: self.amount.map(Money::kes),
                bank_name: self.bank_name,
                account_number: self.account_number,
                mpesa_phone: self.mpesa_phone,
                cheque_number: self.cheque_number,
                transaction_reference: self.transaction_reference,
                notes: self.notes,
            },
        )
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ClaimDocumentInput {
    pub document_type: ClaimDocumentType,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub file_url: String,
    pub file_size: i64,
    #[serde(default = "default_mime")]
    pub mime_type: String,
}

fn default_mime() -> String {
    "application/octet-stream".to_string()
}

/// A claim with everything recorded against it
#[derive(Debug, Serialize)]
pub struct ClaimDetail {
    #[serde(flatten)]
    pub claim: Claim,
    pub status_history: Vec<StatusChange>,
    pub documents: Vec<ClaimDocument>,
    pub settlement: Option<ClaimSettlement>,
}
