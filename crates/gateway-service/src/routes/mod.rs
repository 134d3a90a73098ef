//! HTTP routes for the gateway.
//!
//! Defines the Axum router and application state.

use crate::auth::jwks::{CachedKeySetSource, HttpKeySetSource, KeySetSource};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{authentication_gate, http_metrics_middleware, GateState};
use crate::repositories::UserRepository;
use crate::services::TokenService;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// User store.
    pub users: Arc<dyn UserRepository>,

    /// Session and identity token operations.
    pub token_service: Arc<TokenService>,
}

/// Key set source for the configured JWKS endpoint.
///
/// Wrapped in a cache only when `JWKS_CACHE_TTL_SECONDS` is positive.
pub fn build_key_source(config: &Config) -> Arc<dyn KeySetSource> {
    let http: Arc<dyn KeySetSource> = Arc::new(HttpKeySetSource::new(
        config.google_jwks_url.clone(),
        Duration::from_secs(config.jwks_fetch_timeout_seconds),
    ));

    if config.jwks_cache_ttl_seconds == 0 {
        return http;
    }

    Arc::new(CachedKeySetSource::new(
        http,
        Duration::from_secs(config.jwks_cache_ttl_seconds),
    ))
}

/// Build the application routes.
///
/// - `/health`, `/ready` - probes, outside the gated scope
/// - `/metrics` - Prometheus scrape endpoint, outside the gated scope
/// - `POST /api/v1/authentication/login` - password login (bypassed)
/// - `POST /api/v1/authentication/signin` - registration (bypassed)
/// - `POST /api/v1/authentication/oauth/google` - Google sign-in (bypassed)
/// - `GET /api/v1/authentication/users/me` - current user (authenticated)
///
/// The gate wraps every route and the fallback, so preflights and unknown
/// paths inside the scope get CORS headers and authentication too.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let gate_state = Arc::new(GateState {
        token_service: state.token_service.clone(),
        users: state.users.clone(),
        policy: state.config.gate.clone(),
    });

    let app_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/api/v1/authentication/login", post(handlers::handle_login))
        .route(
            "/api/v1/authentication/signin",
            post(handlers::handle_register),
        )
        .route(
            "/api/v1/authentication/oauth/google",
            post(handlers::handle_identity_exchange),
        )
        .route("/api/v1/authentication/users/me", get(handlers::get_me))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. authentication_gate (innermost)
    // 2. TraceLayer
    // 3. TimeoutLayer
    // 4. http_metrics_middleware (outermost), sees every response
    app_routes
        .merge(metrics_routes)
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            gate_state,
            authentication_gate,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
