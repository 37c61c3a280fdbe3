//! HTTP routes for the authorizer.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::middleware::{require_auth, AuthState};
use crate::pipeline::Authorizer;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Request timeout; covers a cold key fetch plus an identity lookup.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Decision engine holding the process-wide key cache.
    pub authorizer: Arc<Authorizer>,
}

/// Build the application routes.
///
/// - `POST /v1/authorize` - decision document or 401
/// - `POST /v1/authorize/policy` - Allow or Deny document, always 200
/// - `GET /v1/me` - identity of the caller (behind the auth middleware)
/// - `GET /health` - liveness and key cache state
/// - `GET /metrics` - Prometheus scrape
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        authorizer: Arc::clone(&state.authorizer),
    });

    let protected_routes = Router::new()
        .route("/v1/me", get(handlers::get_me))
        .layer(middleware::from_fn_with_state(auth_state, require_auth));

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/v1/authorize", post(handlers::authorize))
        .route("/v1/authorize/policy", post(handlers::authorize_policy))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    public_routes
        .merge(protected_routes)
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
}
