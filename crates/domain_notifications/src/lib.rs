//! Notifications Domain
//!
//! In-app notifications created as side effects of policy, payment, claim
//! and document events. Text is rendered from Fluent resources in the
//! recipient's preferred language (`en` or `sw`).
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_notifications::{Notification, NotificationKind, MessageArgs};
//!
//! let args = MessageArgs::new().with("claim_number", &claim.claim_number);
//! let note = Notification::compose(user_id, NotificationKind::ClaimSubmitted, "sw", &args, url)?;
//! ```

pub mod kind;
pub mod notification;
pub mod render;
pub mod error;

pub use kind::NotificationKind;
pub use notification::Notification;
pub use render::{negotiate, render, MessageArgs, RenderedMessage};
pub use error::NotificationError;
