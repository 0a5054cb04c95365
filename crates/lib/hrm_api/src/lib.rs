//! # hrm_api
//!
//! HTTP API library for HRM mobile authentication.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use axum::Router;
use axum::routing::{get, post};
use hrm_core::mobile::MobileAuthService;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{mobile_auth, mobile_session};
use crate::middleware::mobile_auth as guards;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    /// Mobile auth flows over the configured stores.
    pub mobile: MobileAuthService,
}

/// Run embedded database migrations.
///
/// Delegates to `hrm_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    hrm_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Device headers and the refresh cookie are checked by the handlers.
    let public = Router::new()
        .route(routes::POST_MOBILE_AUTH_LOGIN, post(mobile_auth::login_handler))
        .route(
            routes::POST_MOBILE_AUTH_REFRESH,
            post(mobile_auth::refresh_handler),
        )
        .route(
            routes::POST_MOBILE_AUTH_LOGOUT,
            post(mobile_auth::logout_handler),
        );

    let device_bound = Router::new()
        .route(
            routes::POST_MOBILE_AUTH_LOGOUT_DEVICE,
            post(mobile_auth::logout_device_handler),
        )
        .route(
            routes::POST_MOBILE_AUTH_LOGOUT_ALL,
            post(mobile_auth::logout_all_handler),
        )
        .route(
            routes::POST_MOBILE_AUTH_CHALLENGE,
            post(mobile_auth::create_challenge_handler),
        )
        .route(
            routes::POST_MOBILE_AUTH_CHALLENGE_VERIFY,
            post(mobile_auth::verify_challenge_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            guards::require_mobile_auth_with_device,
        ));

    let employee = Router::new()
        .route(routes::GET_MOBILE_ME, get(mobile_session::me_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            guards::require_mobile_employee_auth_with_device,
        ));

    let authenticated = Router::new()
        .route(
            routes::GET_MOBILE_SESSION,
            get(mobile_session::session_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            guards::require_mobile_auth,
        ));

    Router::new()
        .merge(public)
        .merge(device_bound)
        .merge(employee)
        .merge(authenticated)
        .layer(cors)
        .with_state(state)
}
