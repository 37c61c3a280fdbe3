//! Current user handler.
//!
//! A downstream handler: it trusts only the identity context injected by the
//! auth middleware and refuses to proceed without a user identifier.

use crate::errors::Unauthorized;
use crate::policy::IdentityContext;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `/v1/me`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: String,
    pub email: String,
}

/// Handler for GET /v1/me
#[instrument(skip_all, name = "authorizer.handlers.me")]
pub async fn get_me(
    identity: Option<Extension<IdentityContext>>,
) -> Result<Json<MeResponse>, Unauthorized> {
    let Some(Extension(identity)) = identity else {
        tracing::debug!(target: "authorizer.http", "No identity context on request");
        return Err(Unauthorized);
    };

    if identity.user_id.is_empty() {
        tracing::debug!(target: "authorizer.http", "Identity context has no user id");
        return Err(Unauthorized);
    }

    Ok(Json(MeResponse {
        user_id: identity.user_id,
        email: identity.email,
    }))
}
