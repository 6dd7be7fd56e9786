//! Policy Domain
//!
//! Catalog, policy lifecycle and the back-office processing workflow.
//!
//! # Catalog
//!
//! ```text
//! InsuranceCompany 1--* PolicyType *--1 PolicyCategory
//! ```
//!
//! Types move `draft -> published -> delisted`; only published, active
//! types are visible to customers.
//!
//! # Policy Lifecycle
//!
//! ```text
//! pending -> active -> expired
//!                  \-> suspended -> active
//!                  \-> cancelled
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_policy::{Policy, PurchaseRequest, workflow};
//!
//! let policy = Policy::purchase(user_id, &policy_type, request)?;
//! let stages = workflow::initial_stages(policy.id);
//! ```

pub mod catalog;
pub mod policy;
pub mod review;
pub mod workflow;
pub mod error;

pub use catalog::{InsuranceCompany, PolicyCategory, PolicyType, TypeStatus, slugify, unique_slug};
pub use policy::{Policy, PolicyStatus, PaymentFrequency, PurchaseRequest, PolicyStatistics};
pub use review::PolicyReview;
pub use workflow::{WorkflowStage, StageName, StageStatus};
pub use error::PolicyError;
