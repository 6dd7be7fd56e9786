//! HTTP API Layer
//!
//! REST API of the brokerage, built on Axum.
//!
//! # Architecture
//!
//! - **Handlers**: request handlers per resource (auth, catalog, policies,
//!   claims, payments, documents, notifications, workflows, analytics,
//!   dashboard, admin)
//! - **Middleware**: JWT authentication, audit logging, request ids, tracing
//! - **DTOs**: request bodies and query strings
//! - **Error Handling**: consistent `{error, message, details}` responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let state = AppState::from_config(pool, config)?;
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod notify;

use std::sync::Arc;

use axum::{
    http::{HeaderName, Method},
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use infra_db::{
    AnalyticsRepository, CatalogRepository, ClaimsRepository, DocumentRepository, NotificationRepository,
    PaymentRepository, PolicyRepository, UserRepository, WorkflowRepository,
};
use infra_gateways::{CardGateway, GatewayError, MpesaClient, MpesaGateway, PaystackClient};

use crate::config::ApiConfig;
use crate::handlers::{
    admin, analytics, auth as auth_handlers, catalog, claims, dashboard, documents, health, notifications,
    payments, policies, reports, webhooks, workflows,
};
use crate::middleware::{audit_middleware, auth_middleware};

const REQUEST_ID: &str = "x-request-id";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<ApiConfig>,
    pub mpesa: Arc<dyn MpesaGateway>,
    pub paystack: Arc<dyn CardGateway>,
}

impl AppState {
    /// State backed by the real Daraja and Paystack clients
    pub fn from_config(pool: PgPool, config: ApiConfig) -> Result<Self, GatewayError> {
        let mpesa = MpesaClient::new(config.mpesa()?)?;
        let paystack = PaystackClient::new(config.paystack())?;
        Ok(Self::with_gateways(pool, config, Arc::new(mpesa), Arc::new(paystack)))
    }

    pub fn with_gateways(
        pool: PgPool,
        config: ApiConfig,
        mpesa: Arc<dyn MpesaGateway>,
        paystack: Arc<dyn CardGateway>,
    ) -> Self {
        Self { pool, config: Arc::new(config), mpesa, paystack }
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    pub fn policies(&self) -> PolicyRepository {
        PolicyRepository::new(self.pool.clone())
    }

    pub fn workflows(&self) -> WorkflowRepository {
        WorkflowRepository::new(self.pool.clone())
    }

    pub fn claims(&self) -> ClaimsRepository {
        ClaimsRepository::new(self.pool.clone())
    }

    pub fn payments(&self) -> PaymentRepository {
        PaymentRepository::new(self.pool.clone())
    }

    pub fn documents(&self) -> DocumentRepository {
        DocumentRepository::new(self.pool.clone())
    }

    pub fn notifications(&self) -> NotificationRepository {
        NotificationRepository::new(self.pool.clone())
    }

    pub fn analytics(&self) -> AnalyticsRepository {
        AnalyticsRepository::new(self.pool.clone())
    }
}

/// Routes reachable without a token
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/login", post(auth_handlers::login))
        .route("/auth/token/refresh", post(auth_handlers::refresh))
        .route("/auth/verify", post(auth_handlers::verify))
        .route("/auth/password-reset/request", post(auth_handlers::request_password_reset))
        .route("/auth/password-reset/confirm", post(auth_handlers::confirm_password_reset))
        .route("/policies/companies", get(catalog::list_companies))
        .route("/policies/companies/:id", get(catalog::get_company))
        .route("/policies/categories", get(catalog::list_categories))
        .route("/policies/categories/:key", get(catalog::get_category))
        .route("/policies/types", get(catalog::list_types))
        .route("/policies/types/featured", get(catalog::featured_types))
        .route("/policies/types/:key", get(catalog::get_type))
        .route("/policies/types/:key/reviews", get(catalog::type_reviews))
        .route("/payments/mpesa/callback", post(webhooks::mpesa_callback))
        .route("/payments/paystack/webhook", post(webhooks::paystack_webhook))
}

/// Routes that require a bearer access token
fn protected_routes() -> Router<AppState> {
    let account = Router::new()
        .route("/auth/logout", post(auth_handlers::logout))
        .route("/auth/profile", get(auth_handlers::profile).patch(auth_handlers::update_profile))
        .route("/auth/change-password", post(auth_handlers::change_password))
        .route(
            "/auth/notification-preferences",
            get(auth_handlers::preferences).patch(auth_handlers::update_preferences),
        );

    let policy_routes = Router::new()
        .route("/policies/my-policies", get(policies::list_policies).post(policies::purchase))
        .route("/policies/my-policies/active", get(policies::active_policies))
        .route("/policies/my-policies/expiring-soon", get(policies::expiring_soon))
        .route("/policies/my-policies/statistics", get(policies::statistics))
        .route("/policies/my-policies/:id", get(policies::get_policy))
        .route("/policies/my-policies/:id/renew", post(policies::renew))
        .route("/policies/my-policies/:id/cancel", post(policies::cancel))
        .route("/policies/my-policies/:id/activate", post(policies::activate))
        .route("/policies/reviews", get(policies::list_reviews).post(policies::create_review))
        .route("/policies/reviews/:id/publish", post(policies::publish_review));

    let claim_routes = Router::new()
        .route("/claims", get(claims::list_claims).post(claims::create_claim))
        .route("/claims/statistics", get(claims::statistics))
        .route("/claims/pending", get(claims::pending_claims))
        .route("/claims/:id", get(claims::get_claim).patch(claims::update_claim))
        .route("/claims/:id/assign", post(claims::assign))
        .route("/claims/:id/request-documents", post(claims::request_documents))
        .route("/claims/:id/complete-assessment", post(claims::complete_assessment))
        .route("/claims/:id/approve", post(claims::approve))
        .route("/claims/:id/reject", post(claims::reject))
        .route("/claims/:id/settle", post(claims::settle))
        .route("/claims/:id/settlement", get(claims::get_settlement))
        .route("/claims/:id/documents", get(claims::list_documents).post(claims::add_document))
        .route("/claims/:id/history", get(claims::history));

    let payment_routes = Router::new()
        .route("/payments/initiate", post(payments::initiate))
        .route("/payments/mpesa/initiate", post(payments::mpesa_initiate))
        .route("/payments/mpesa/status/:id", get(payments::mpesa_status))
        .route("/payments/paystack/initialize", post(payments::paystack_initialize))
        .route("/payments/paystack/verify/:reference", get(payments::paystack_verify))
        .route("/payments/transactions", get(payments::list_transactions))
        .route("/payments/transactions/summary", get(payments::summary))
        .route("/payments/transactions/:id", get(payments::get_transaction))
        .route("/payments/transactions/:id/receipt", get(payments::receipt))
        .route("/payments/schedules", get(payments::schedules))
        .route("/payments/schedules/pending", get(payments::pending_schedules))
        .route("/payments/schedules/overdue", get(payments::overdue_schedules))
        .route("/payments/refunds", get(payments::list_refunds).post(payments::create_refund))
        .route("/payments/refunds/:id", get(payments::get_refund))
        .route("/payments/refunds/:id/process", post(payments::process_refund));

    let document_routes = Router::new()
        .route("/documents", get(documents::list_documents).post(documents::upload))
        .route("/documents/by-policy", get(documents::by_policy))
        .route("/documents/:id", get(documents::get_document).delete(documents::delete_document))
        .route("/documents/:id/verify", post(documents::verify))
        .route("/documents/:id/download", get(documents::download));

    let notification_routes = Router::new()
        .route("/notifications", get(notifications::list).post(notifications::create_system_message))
        .route("/notifications/unread", get(notifications::unread))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/mark-all-read", post(notifications::mark_all_read))
        .route("/notifications/:id", get(notifications::get).delete(notifications::delete))
        .route("/notifications/:id/mark-as-read", post(notifications::mark_as_read));

    let workflow_routes = Router::new()
        .route("/workflows/policy/:id", get(workflows::policy_stages))
        .route("/workflows/stages/:id/assign", post(workflows::assign))
        .route("/workflows/stages/:id/complete", post(workflows::complete))
        .route("/workflows/stages/:id/skip", post(workflows::skip))
        .route("/workflows/stages/:id/fail", post(workflows::fail));

    let analytics_routes = Router::new()
        .route("/analytics/dashboard", get(analytics::dashboard))
        .route("/analytics/revenue", get(analytics::revenue))
        .route("/analytics/claims", get(analytics::claims))
        .route("/analytics/users", get(analytics::users))
        .route("/analytics/policies", get(analytics::policies));

    let dashboard_routes = Router::new()
        .route("/dashboard", get(dashboard::overview))
        .route("/dashboard/stats", get(dashboard::stats))
        .route("/dashboard/activity", get(dashboard::activity))
        .route("/dashboard/recommendations", get(dashboard::recommendations))
        .route("/dashboard/upcoming-payments", get(dashboard::upcoming_payments))
        .route("/dashboard/expiring-policies", get(dashboard::expiring_policies));

    let admin_routes = Router::new()
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id", get(admin::get_user))
        .route("/admin/users/:id/role", patch(admin::update_role))
        .route("/admin/users/:id/suspend", post(admin::suspend_user))
        .route("/admin/users/:id/activate", post(admin::activate_user))
        .route("/admin/claims", get(admin::list_claims))
        .route("/admin/transactions", get(admin::list_transactions))
        .route("/admin/policies", get(admin::list_policies))
        .route("/admin/policies/:id/approve", post(admin::approve_policy))
        .route("/admin/policies/:id/cancel", post(admin::cancel_policy))
        .route("/admin/policy-types", get(admin::list_types).post(admin::create_type))
        .route(
            "/admin/policy-types/:id",
            get(admin::get_type).put(admin::update_type).delete(admin::delete_type),
        )
        .route("/admin/policy-types/:id/publish", post(admin::publish_type))
        .route("/admin/policy-types/:id/delist", post(admin::delist_type))
        .route("/admin/insurance-companies", get(admin::list_companies).post(admin::create_company))
        .route(
            "/admin/insurance-companies/:id",
            get(admin::get_company).put(admin::update_company).delete(admin::delete_company),
        )
        .route("/admin/categories", get(admin::list_categories).post(admin::create_category))
        .route(
            "/admin/categories/:id",
            get(admin::get_category).put(admin::update_category).delete(admin::delete_category),
        )
        .route("/admin/reports/sales", get(reports::sales))
        .route("/admin/reports/revenue", get(reports::revenue))
        .route("/admin/reports/claims", get(reports::claims))
        .route("/admin/reports/user-growth", get(reports::user_growth))
        .route("/admin/reports/export/:report", get(reports::export))
        .route("/admin/settings", get(admin::settings))
        .route("/admin/roles", get(admin::roles));

    Router::new()
        .merge(account)
        .merge(policy_routes)
        .merge(claim_routes)
        .merge(payment_routes)
        .merge(document_routes)
        .merge(notification_routes)
        .merge(workflow_routes)
        .merge(analytics_routes)
        .merge(dashboard_routes)
        .merge(admin_routes)
}

/// Creates the main API router
///
/// # Arguments
///
/// * `state` - Database pool, configuration and payment gateways
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Layers run bottom-up: auth first, so the audit log sees the caller
    let protected = protected_routes()
        .route_layer(axum_middleware::from_fn(audit_middleware))
        .route_layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api_routes = Router::new().merge(public_routes()).merge(protected);

    let request_id = HeaderName::from_static(REQUEST_ID);
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(Any);

    // Outermost first: the id is assigned before tracing opens its span
    let global = ServiceBuilder::new()
        .layer(cors)
        .layer(tower_http::map_response_body::MapResponseBodyLayer::new(axum::body::Body::new))
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(PropagateRequestIdLayer::new(request_id))
        .layer(TraceLayer::new_for_http());

    Router::new()
        .merge(health_routes)
        .nest("/api/v1", api_routes)
        .layer(global)
        .with_state(state)
}
