//! Test Utilities Crate
//!
//! Shared test infrastructure for the brokerage crates.
//!
//! # Modules
//!
//! - `fixtures`: Ready-made catalog entries, users and dates
//! - `builders`: Builders for users, policies, claims and payments
//! - `database`: Throwaway PostgreSQL containers with the schema applied
//! - `assertions`: Assertion helpers for money, schedules and claim history

pub mod fixtures;
pub mod builders;
pub mod database;
pub mod assertions;

pub use fixtures::*;
pub use builders::*;
pub use database::*;
pub use assertions::*;
