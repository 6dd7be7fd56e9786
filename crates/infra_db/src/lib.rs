//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the brokerage, built on SQLx. Each resource has
//! a repository wrapping the shared pool; multi-table writes such as policy
//! purchase or payment completion run inside a single database transaction
//! together with the notifications and activity entries they produce.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, PolicyRepository};
//!
//! let pool = create_pool("postgres://localhost/brokerage").await?;
//! run_migrations(&pool).await?;
//! let policies = PolicyRepository::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;

pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool, MIGRATOR};
pub use error::DatabaseError;
pub use repositories::{
    AnalyticsRepository, CatalogRepository, ClaimsRepository, DocumentRepository,
    NotificationRepository, Page, PaymentRepository, PolicyRepository, UserRepository,
    WorkflowRepository,
};
pub use repositories::analytics::{
    Breakdown, ClaimDimension, Comparison, CustomerStats, CustomerSummary, Metric, PlatformTotals,
    PolicyDimension, ReportRange,
};
pub use repositories::catalog::{CategoryListing, TypeFilter};
pub use repositories::claims::ClaimFilter;
pub use repositories::documents::DocumentFilter;
pub use repositories::payments::{CompletionOutcome, ScheduleView, TransactionFilter};
pub use repositories::policies::PolicyFilter;
pub use repositories::users::UserFilter;
