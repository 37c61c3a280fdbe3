//! Health check handler.

use crate::routes::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,

    /// `"warm"` once a key set is cached, `"cold"` before.
    pub jwks: &'static str,
}

/// Handler for GET /health
///
/// Always healthy while the process serves; a cold key cache is reported
/// but does not fail the probe.
#[instrument(skip_all, name = "authorizer.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let warm = state.authorizer.keys().is_warm().await;

    Json(HealthResponse {
        status: "healthy",
        jwks: if warm { "warm" } else { "cold" },
    })
}
