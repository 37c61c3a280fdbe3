//! Authorization endpoints.
//!
//! Both take the raw request envelope as the JSON body. An unreadable body
//! is treated like an envelope with nothing in it.

use crate::auth::AuthorizerEvent;
use crate::errors::Unauthorized;
use crate::policy::Decision;
use crate::routes::AppState;
use axum::{body::Bytes, extract::State, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /v1/authorize
///
/// Returns 200 with the Allow document, or an opaque 401.
#[instrument(skip_all, name = "authorizer.handlers.authorize")]
pub async fn authorize(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Decision>, Unauthorized> {
    let event = parse_event(&body);
    state.authorizer.authorize(&event).await.map(Json)
}

/// Handler for POST /v1/authorize/policy
///
/// Always returns 200 with an Allow or Deny document.
#[instrument(skip_all, name = "authorizer.handlers.authorize_policy")]
pub async fn authorize_policy(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Json<Decision> {
    let event = parse_event(&body);
    Json(state.authorizer.decide(&event).await)
}

fn parse_event(body: &[u8]) -> AuthorizerEvent {
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::warn!(target: "authorizer.http", error = %e, body_len = body.len(), "Unreadable authorizer envelope");
        AuthorizerEvent::default()
    })
}
