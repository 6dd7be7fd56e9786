//! Claims Management Domain
//!
//! This crate implements the claims lifecycle from intake through
//! adjudication and settlement.
//!
//! # Claim Lifecycle
//!
//! ```text
//! submitted -> under_review -> assessment_complete -> approved -> settled
//!     |             |  ^                 \-> rejected
//!     |             v  |
//!     \-> documents_requested -> rejected
//! ```
//!
//! Every status change yields a [`StatusChange`] that the caller persists
//! alongside the claim.

pub mod claim;
pub mod history;
pub mod document;
pub mod settlement;
pub mod statistics;
pub mod error;

pub use claim::{Claim, ClaimStatus, ClaimType, ClaimEdit, CoveredPolicy, NewClaim};
pub use history::StatusChange;
pub use document::{ClaimDocument, ClaimDocumentType};
pub use settlement::{ClaimSettlement, SettlementMethod, SettlementRequest};
pub use statistics::ClaimStatistics;
pub use error::ClaimError;
