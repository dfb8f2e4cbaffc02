//! HTTP API Layer
//!
//! REST API for the student billing core using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: invoice generation/approval, ledger operations,
//!   collections views
//! - **DTOs**: request/response types with validation
//! - **Error Handling**: the domain error taxonomy mapped onto HTTP
//!   statuses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, config::ApiConfig};
//!
//! let app = create_router(pool, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod notify;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use core_kernel::Currency;
use domain_billing::{NotificationDispatcher, StudentDirectory};
use infra_db::{LedgerRepository, RetrySettings};

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::handlers::{collections, health, invoices, payments};
use crate::notify::TracingDispatcher;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: ApiConfig,
    /// Optional student directory used to complete the resolution context
    pub directory: Option<Arc<dyn StudentDirectory>>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
}

impl AppState {
    /// The configured billing currency
    pub fn currency(&self) -> Result<Currency, ApiError> {
        Currency::from_code(&self.config.currency).ok_or_else(|| {
            ApiError::Internal(format!(
                "unknown configured currency '{}'",
                self.config.currency
            ))
        })
    }

    /// A ledger repository wired with the configured retry settings
    pub fn ledger(&self) -> LedgerRepository {
        LedgerRepository::new(self.pool.clone())
            .with_settings(RetrySettings {
                max_attempts: self.config.ledger_max_retries,
                base_backoff: Duration::from_millis(self.config.ledger_backoff_ms),
                deadline: Duration::from_millis(self.config.transaction_deadline_ms),
            })
            .with_dispatcher(self.dispatcher.clone())
    }

    /// Looks a student's level up in the directory, if one is wired
    ///
    /// A student the directory does not know yields no level rather than
    /// failing generation; directory outages propagate.
    pub async fn lookup_level(&self, student_id: Uuid) -> Result<Option<String>, ApiError> {
        let Some(directory) = &self.directory else {
            return Ok(None);
        };
        match directory.get(student_id.into()).await {
            Ok(record) => Ok(record.level),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(ApiError::Internal(format!("student directory: {e}"))),
        }
    }
}

/// Creates the API router with default collaborators
pub fn create_router(pool: PgPool, config: ApiConfig) -> Router {
    create_router_with(pool, config, None, Arc::new(TracingDispatcher))
}

/// Creates the API router with explicit collaborator adapters
pub fn create_router_with(
    pool: PgPool,
    config: ApiConfig,
    directory: Option<Arc<dyn StudentDirectory>>,
    dispatcher: Arc<dyn NotificationDispatcher>,
) -> Router {
    let state = AppState {
        pool,
        config,
        directory,
        dispatcher,
    };

    // Public routes (no versioning)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Invoice routes
    let invoice_routes = Router::new()
        .route("/", post(invoices::generate_invoice))
        .route("/", get(invoices::list_invoices))
        .route("/:id", get(invoices::get_invoice))
        .route("/:id/submit", post(invoices::submit_invoice))
        .route("/:id/approve", post(invoices::approve_invoice))
        .route("/:id/reject", post(invoices::reject_invoice))
        .route("/:id/payments", post(payments::post_payment));

    // Payment routes
    let payment_routes = Router::new()
        .route("/:id/void", post(payments::void_payment))
        .route("/:id/refund", post(payments::refund_payment));

    // Collections routes
    let collections_routes = Router::new()
        .route("/overdue", get(collections::overdue))
        .route("/aging", get(collections::aging))
        .route("/debtors", get(collections::top_debtors));

    let api_routes = Router::new()
        .nest("/invoices", invoice_routes)
        .nest("/payments", payment_routes)
        .nest("/collections", collections_routes);

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
