//! # qore_api
//!
//! HTTP API library for QORE employee authentication and access control.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod validation;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post, put};
use qore_core::store::Store;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ApiConfig;
use crate::handlers::{auth, employees, health, roles};
use crate::middleware::auth::{AuthVerifier, verifier_for};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Employee, refresh-token and role storage.
    pub store: Arc<dyn Store>,
    /// API configuration.
    pub config: ApiConfig,
    /// Request authentication, fixed at startup.
    pub verifier: Arc<dyn AuthVerifier>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: ApiConfig) -> Self {
        let verifier = verifier_for(&config);
        Self {
            store,
            config,
            verifier,
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `qore_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    qore_core::migrate::migrate(pool).await
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match config.frontend_url.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => cors.allow_origin(origin),
        Some(Err(_)) => {
            warn!("FRONTEND_URL is not a valid origin, allowing any origin");
            cors.allow_origin(Any)
        }
        None => cors.allow_origin(Any),
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::GET_AUTH_STATUS, get(auth::status_handler))
        .route(routes::POST_AUTH_LOGOUT_ALL, post(auth::logout_all_handler))
        .route(
            routes::POST_AUTH_CHANGE_PASSWORD,
            post(auth::change_password_handler),
        )
        .route(
            routes::EMPLOYEES,
            get(employees::list_employees_handler).post(employees::create_employee_handler),
        )
        .route(routes::EMPLOYEES_ID, get(employees::get_employee_handler))
        .route(
            routes::EMPLOYEES_ID_REPORTS,
            get(employees::direct_reports_handler),
        )
        .route(
            routes::EMPLOYEES_ID_CHAIN,
            get(employees::reporting_chain_handler),
        )
        .route(
            routes::EMPLOYEES_ID_ROLES,
            get(roles::list_employee_roles_handler).post(roles::assign_role_handler),
        )
        .route(
            routes::EMPLOYEES_ID_ROLES_ASSIGNMENT,
            delete(roles::remove_employee_role_handler),
        )
        .route(
            routes::EMPLOYEES_ID_ROLES_ASSIGNMENT_PRIMARY,
            put(roles::set_primary_role_handler),
        )
        .route(
            routes::ROLES,
            get(roles::list_roles_handler).post(roles::create_role_handler),
        )
        .route(
            routes::ROLES_ID,
            get(roles::get_role_handler)
                .put(roles::update_role_handler)
                .delete(roles::delete_role_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    let mut app = Router::new().merge(public).merge(protected);
    if !state.config.environment.is_production() {
        app = app.layer(axum::middleware::map_response(
            error::expose_internal_detail,
        ));
    }
    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
