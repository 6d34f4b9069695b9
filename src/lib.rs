pub mod auth;
pub mod checkouts;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod extract;
pub mod inventory;
pub mod models;
pub mod rate_limit;
pub mod reports;
pub mod response;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod upload;
pub mod validation;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::Router;
use sqlx::PgPool;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::email::{LogNotifier, Notifier, SmtpNotifier};
use crate::rate_limit::LoginRateLimiter;
use crate::state::{AppState, SharedState};
use crate::storage::{LocalStorage, ObjectStorage};

pub fn build_app(pool: PgPool, config: Config) -> (Router, SharedState) {
    let notifier: Arc<dyn Notifier> = match config.smtp.as_ref().map(SmtpNotifier::new) {
        Some(Ok(mailer)) => {
            tracing::info!("SMTP configured");
            Arc::new(mailer)
        }
        Some(Err(e)) => {
            tracing::warn!("SMTP not available: {e}");
            Arc::new(LogNotifier)
        }
        None => Arc::new(LogNotifier),
    };

    build_app_with(pool, config, notifier)
}

/// Same as [`build_app`] with an explicit notifier.
pub fn build_app_with(
    pool: PgPool,
    config: Config,
    notifier: Arc<dyn Notifier>,
) -> (Router, SharedState) {
    let storage: Arc<dyn ObjectStorage> = Arc::new(LocalStorage::new(&config.storage));

    let state: SharedState = Arc::new(AppState {
        pool,
        config,
        notifier,
        storage,
        login_limiter: LoginRateLimiter::default(),
    });

    let cors = match HeaderValue::from_str(&state.config.frontend_url) {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers(AllowHeaders::mirror_request()),
        Err(e) => {
            tracing::warn!("Invalid frontend URL for CORS, cross-origin requests disabled: {e}");
            CorsLayer::new()
        }
    };

    // Uploaded files may be SVG; keep any script in them from running on the API origin.
    let files = Router::<SharedState>::new()
        .nest_service("/storage", ServeDir::new(&state.config.storage.root))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("content-security-policy"),
            HeaderValue::from_static("sandbox"),
        ));

    let app = Router::new()
        .merge(routes::api_routes())
        .merge(files)
        .route("/health", axum::routing::get(health))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state.clone());

    (app, state)
}

async fn health() -> &'static str {
    "ok"
}
