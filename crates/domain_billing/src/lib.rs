//! Billing Domain - Premium Collection
//!
//! Premiums are collected through gateway-backed transactions and tracked
//! against a per-policy installment schedule.
//!
//! # Payment Flow
//!
//! ```text
//! initiate (pending) -> gateway accepts (processing) -> callback (completed | failed)
//!                                                            |
//!                                 next installment paid <----+
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{Transaction, PaymentIntent, schedule};
//!
//! let mut txn = Transaction::initiate(user_id, intent)?;
//! txn.mark_processing(checkout_request_id)?;
//! if txn.complete(completion)? {
//!     installment.mark_paid(txn.id)?;
//! }
//! ```

pub mod transaction;
pub mod schedule;
pub mod refund;
pub mod summary;
pub mod phone;
pub mod error;

pub use transaction::{Transaction, TransactionStatus, PaymentMethod, PaymentIntent, Completion};
pub use schedule::{PaymentSchedule, ScheduleStatus, generate_schedule, next_due};
pub use refund::{Refund, RefundReason, RefundStatus};
pub use summary::{PaymentSummary, Receipt};
pub use phone::is_valid_payer_phone;
pub use error::BillingError;
