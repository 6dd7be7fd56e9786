//! Core Kernel - Foundational types shared by every brokerage module
//!
//! - Money with precise decimal arithmetic (KES by default)
//! - Strongly-typed identifiers
//! - Business calendar pinned to Africa/Nairobi
//! - Reference numbers (`POL-2024-004817`, `CLM-…`, `TXN-…`, `RFD-…`)

pub mod money;
pub mod calendar;
pub mod identifiers;
pub mod reference;

pub use money::{Money, Currency, MoneyError};
pub use calendar::{DateRange, CalendarError, BUSINESS_TZ};
pub use identifiers::{
    UserId, CompanyId, CategoryId, PolicyTypeId, PolicyId, ReviewId, WorkflowStageId,
    ClaimId, ClaimDocumentId, SettlementId, TransactionId, ScheduleId, RefundId,
    DocumentId, NotificationId, ActivityId,
};
pub use reference::ReferenceKind;
