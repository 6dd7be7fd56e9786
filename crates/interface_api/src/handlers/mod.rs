//! Request handlers, one module per resource

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod catalog;
pub mod claims;
pub mod dashboard;
pub mod documents;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod policies;
pub mod reports;
pub mod webhooks;
pub mod workflows;

use infra_db::Page;

/// Re-applies the page bounds to a deserialized `?limit=&offset=`
pub(crate) fn page(requested: Page) -> Page {
    Page::new(requested.limit, requested.offset)
}
