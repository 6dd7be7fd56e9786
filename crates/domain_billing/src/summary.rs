//! Payment summaries and receipts

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::BillingError;
use crate::refund::{Refund, RefundStatus};
use crate::transaction::{Transaction, TransactionStatus};

/// Totals over a customer's (or everyone's) transactions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentSummary {
    pub total_transactions: i64,
    pub successful_transactions: i64,
    pub failed_transactions: i64,
    pub pending_transactions: i64,
    /// Completed plus still-open payments
    pub total_amount: Decimal,
    pub successful_amount: Decimal,
    /// Completed refunds only
    pub refunded_amount: Decimal,
    pub currency: &'static str,
}

impl Default for PaymentSummary {
    fn default() -> Self {
        Self {
            total_transactions: 0,
            successful_transactions: 0,
            failed_transactions: 0,
            pending_transactions: 0,
            total_amount: Decimal::ZERO,
            successful_amount: Decimal::ZERO,
            refunded_amount: Decimal::ZERO,
            currency: "KES",
        }
    }
}

impl PaymentSummary {
    pub fn build<'a>(
        transactions: impl IntoIterator<Item = &'a Transaction>,
        refunds: impl IntoIterator<Item = &'a Refund>,
    ) -> Self {
        let mut summary = Self::default();
        for txn in transactions {
            summary.total_transactions += 1;
            let amount = txn.amount.amount();
            match txn.status {
                TransactionStatus::Completed => {
                    summary.successful_transactions += 1;
                    summary.successful_amount += amount;
                    summary.total_amount += amount;
                }
                TransactionStatus::Failed => summary.failed_transactions += 1,
                TransactionStatus::Pending | TransactionStatus::Processing => {
                    summary.pending_transactions += 1;
                    summary.total_amount += amount;
                }
                TransactionStatus::Refunded | TransactionStatus::Cancelled => {}
            }
        }
        summary.refunded_amount = refunds
            .into_iter()
            .filter(|r| r.status == RefundStatus::Completed)
            .map(|r| r.amount.amount())
            .sum();
        summary
    }
}

/// Printable proof of a completed payment
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub receipt_number: String,
    pub transaction_number: String,
    pub policy_number: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method: &'static str,
    pub reference: Option<String>,
    pub payment_date: DateTime<Utc>,
    pub description: String,
}

impl Receipt {
    pub fn for_transaction(
        txn: &Transaction,
        policy_number: Option<String>,
        customer_name: impl Into<String>,
        customer_email: impl Into<String>,
    ) -> Result<Self, BillingError> {
        if txn.status != TransactionStatus::Completed {
            return Err(BillingError::ReceiptUnavailable);
        }
        let payment_date = txn.completed_at.unwrap_or(txn.updated_at);
        Ok(Self {
            receipt_number: format!("RCT-{}", txn.transaction_number.trim_start_matches("TXN-")),
            transaction_number: txn.transaction_number.clone(),
            policy_number,
            customer_name: customer_name.into(),
            customer_email: customer_email.into(),
            amount: txn.amount.amount(),
            currency: txn.amount.currency().code().to_string(),
            payment_method: txn.payment_method.label(),
            reference: txn
                .mpesa_receipt
                .clone()
                .or_else(|| txn.paystack_reference.clone())
                .or_else(|| txn.gateway_reference.clone()),
            payment_date,
            description: txn.description.clone(),
        })
    }
}
