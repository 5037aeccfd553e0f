//! # gerai_api
//!
//! HTTP API library for Gerai: router, guards, and the auth /
//! access-code handler surface.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::Router;
use axum::routing::{get, post};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{access, access_codes, auth, health};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub pool: PgPool,
    /// API configuration.
    pub config: ApiConfig,
}

/// Run embedded database migrations.
///
/// Delegates to `gerai_core::migrate::migrate()` which owns the
/// migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    gerai_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes. Handlers with optional identity (me, verify,
    // status) authenticate imperatively.
    let public = Router::new()
        .route("/api/health", get(health::health))
        .route("/api/auth/admin/login", post(auth::admin_login))
        .route("/api/auth/user/login", post(auth::user_login))
        .route("/api/auth/user/register", post(auth::user_register))
        .route("/api/auth/admin/register", post(auth::admin_register))
        .route("/api/auth/admin/logout", post(auth::admin_logout))
        .route("/api/auth/user/logout", post(auth::user_logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/admin/me", get(auth::me))
        .route("/api/auth/user/me", get(auth::user_me))
        .route("/api/access-codes/verify", post(access::verify))
        .route("/api/access/claim", post(access::claim))
        .route("/api/access/status", get(access::status))
        .route("/api/access/clear", post(access::clear));

    let admin_session = Router::new()
        .route("/api/auth/admin/token/refresh", post(auth::admin_refresh))
        .route("/api/admin/access-codes", get(access_codes::list))
        .route(
            "/api/admin/access-codes/{id}",
            get(access_codes::get_one)
                .patch(access_codes::update)
                .delete(access_codes::remove),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ));

    // Minting plaintext secrets takes the bearer token on top of the
    // session.
    let admin_feature = Router::new()
        .route("/api/admin/access-codes", post(access_codes::create))
        .route(
            "/api/admin/access-codes/{id}/rotate",
            post(access_codes::rotate),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin_feature,
        ));

    let user_session = Router::new()
        .route("/api/auth/user/token/refresh", post(auth::user_refresh))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_user,
        ));

    Router::new()
        .merge(public)
        .merge(admin_session)
        .merge(admin_feature)
        .merge(user_session)
        .layer(cors)
        .with_state(state)
}
