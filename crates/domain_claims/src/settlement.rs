//! Claim settlement
//!
//! Each approved claim is paid out exactly once. The payout details that
//! are required depend on the method.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use core_kernel::{ClaimId, Money, SettlementId, UserId};

use crate::claim::{Claim, ClaimStatus};
use crate::error::ClaimError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMethod {
    BankTransfer,
    Mpesa,
    Cheque,
}

impl SettlementMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementMethod::BankTransfer => "bank_transfer",
            SettlementMethod::Mpesa => "mpesa",
            SettlementMethod::Cheque => "cheque",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SettlementMethod::BankTransfer => "Bank Transfer",
            SettlementMethod::Mpesa => "M-Pesa",
            SettlementMethod::Cheque => "Cheque",
        }
    }
}

impl FromStr for SettlementMethod {
    type Err = ClaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank_transfer" => Ok(SettlementMethod::BankTransfer),
            "mpesa" => Ok(SettlementMethod::Mpesa),
            "cheque" => Ok(SettlementMethod::Cheque),
            other => Err(ClaimError::Validation(format!("Unknown settlement method: {}", other))),
        }
    }
}

/// Payout instructions supplied by staff
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettlementRequest {
    /// Defaults to the approved amount
    pub amount: Option<Money>,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub mpesa_phone: Option<String>,
    pub cheque_number: Option<String>,
    pub transaction_reference: Option<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimSettlement {
    pub id: SettlementId,
    pub claim_id: ClaimId,
    pub amount: Money,
    pub method: SettlementMethod,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub mpesa_phone: Option<String>,
    pub cheque_number: Option<String>,
    pub transaction_reference: Option<String>,
    pub notes: String,
    pub processed_by: UserId,
    pub settled_at: DateTime<Utc>,
}

impl ClaimSettlement {
    /// Validates the payout against the claim
    pub fn prepare(
        claim: &Claim,
        method: SettlementMethod,
        request: SettlementRequest,
        processed_by: UserId,
    ) -> Result<Self, ClaimError> {
        if claim.status != ClaimStatus::Approved {
            return Err(ClaimError::NotApproved);
        }
        let approved = claim.amount_approved.ok_or(ClaimError::NotApproved)?;
        let amount = request.amount.unwrap_or(approved).round_to_currency();
        if !amount.is_positive() {
            return Err(ClaimError::Validation("Settlement amount must be greater than zero".into()));
        }
        if amount.amount() > approved.amount() {
            return Err(ClaimError::SettlementExceedsApproved);
        }

        let present = |v: &Option<String>| v.as_deref().map(str::trim).is_some_and(|s| !s.is_empty());
        match method {
            SettlementMethod::BankTransfer => {
                if !present(&request.bank_name) || !present(&request.account_number) {
                    return Err(ClaimError::Validation(
                        "Bank name and account number are required for bank transfer".into(),
                    ));
                }
            }
            SettlementMethod::Mpesa => {
                if !present(&request.mpesa_phone) {
                    return Err(ClaimError::Validation("M-Pesa phone number is required".into()));
                }
            }
            SettlementMethod::Cheque => {
                if !present(&request.cheque_number) {
                    return Err(ClaimError::Validation("Cheque number is required".into()));
                }
            }
        }

        Ok(Self {
            id: SettlementId::new_v7(),
            claim_id: claim.id,
            amount,
            method,
            bank_name: request.bank_name,
            account_number: request.account_number,
            mpesa_phone: request.mpesa_phone,
            cheque_number: request.cheque_number,
            transaction_reference: request.transaction_reference,
            notes: request.notes,
            processed_by,
            settled_at: Utc::now(),
        })
    }
}
