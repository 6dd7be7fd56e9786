//! User Accounts Domain
//!
//! Everyone who touches the brokerage is a `User` with exactly one role:
//!
//! ```text
//! customer  - buys policies, files claims, pays premiums
//! assessor  - adjudicates claims
//! staff     - back-office operations (activate policies, settle claims)
//! admin     - everything staff can do, plus role management
//! ```
//!
//! Credentials are stored as Argon2id PHC strings. Password-reset tokens are
//! stored only as SHA-256 digests.

pub mod user;
pub mod role;
pub mod preferences;
pub mod password;
pub mod registration;
pub mod error;

pub use user::{User, ProfileUpdate};
pub use role::Role;
pub use preferences::{NotificationPreference, PreferenceUpdate, NotificationChannel, NotificationTopic};
pub use password::{PasswordPolicy, hash_password, verify_password, ResetToken};
pub use registration::{Registration, PasswordChange, PasswordResetConfirm, authenticate};
pub use error::UserError;
