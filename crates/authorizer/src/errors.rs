//! Authorizer error types.
//!
//! `AuthzError` carries the full internal reason for a denial and is only ever
//! logged. `Unauthorized` is the single opaque error visible at the request
//! boundary; it maps to `401` via the `IntoResponse` impl.

use crate::pipeline::Stage;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Internal denial reasons.
///
/// Display output includes offending fields and timestamps for server-side
/// logs. Never return it to a caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("No authorization token present in request")]
    TokenMissing,

    #[error("Malformed token: {0}")]
    TokenMalformed(String),

    #[error("No public key for kid '{kid}'")]
    KeyNotFound { kid: String },

    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("Token expired (exp={exp:?}, now={now})")]
    TokenExpired { exp: Option<i64>, now: i64 },

    #[error("Issuer mismatch (expected '{expected}', got {actual:?})")]
    IssuerMismatch {
        expected: String,
        actual: Option<String>,
    },

    #[error("Audience mismatch for client '{expected}'")]
    AudienceMismatch { expected: String },

    #[error("Identity unresolvable: {0}")]
    IdentityUnresolvable(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Request carries no resource identifier")]
    ResourceMissing,
}

impl AuthzError {
    /// Bounded label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthzError::TokenMissing => "token_missing",
            AuthzError::TokenMalformed(_) => "token_malformed",
            AuthzError::KeyNotFound { .. } => "key_not_found",
            AuthzError::SignatureInvalid(_) => "signature_invalid",
            AuthzError::TokenExpired { .. } => "token_expired",
            AuthzError::IssuerMismatch { .. } => "issuer_mismatch",
            AuthzError::AudienceMismatch { .. } => "audience_mismatch",
            AuthzError::IdentityUnresolvable(_) => "identity_unresolvable",
            AuthzError::UpstreamUnavailable(_) => "upstream_unavailable",
            AuthzError::ResourceMissing => "resource_missing",
        }
    }

    /// Last pipeline state reached before this failure.
    pub fn stage(&self) -> Stage {
        match self {
            AuthzError::TokenMissing => Stage::Start,
            AuthzError::TokenMalformed(_) => Stage::Located,
            AuthzError::KeyNotFound { .. } => Stage::Parsed,
            AuthzError::SignatureInvalid(_)
            | AuthzError::TokenExpired { .. }
            | AuthzError::IssuerMismatch { .. }
            | AuthzError::AudienceMismatch { .. } => Stage::KeyResolved,
            AuthzError::IdentityUnresolvable(_) => Stage::Validated,
            // Only the key fetch surfaces this; identity lookup failures fall
            // back to token claims.
            AuthzError::UpstreamUnavailable(_) => Stage::Parsed,
            // The resource is only read when building the Allow document
            AuthzError::ResourceMissing => Stage::IdentityResolved,
        }
    }
}

/// The opaque boundary denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Unauthorized")]
pub struct Unauthorized;

#[derive(Serialize)]
struct UnauthorizedBody {
    message: &'static str,
}

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        let mut response = (
            StatusCode::UNAUTHORIZED,
            Json(UnauthorizedBody {
                message: "Unauthorized",
            }),
        )
            .into_response();

        if let Ok(header_value) = "Bearer error=\"invalid_token\"".parse() {
            response
                .headers_mut()
                .insert("WWW-Authenticate", header_value);
        }

        response
    }
}
