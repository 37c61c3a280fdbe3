//! Authorization middleware for protected routes.
//!
//! Builds an envelope from the request headers, runs the decision pipeline
//! and injects the resulting [`IdentityContext`] into request extensions.

use crate::auth::AuthorizerEvent;
use crate::errors::Unauthorized;
use crate::pipeline::Authorizer;
use crate::policy::IdentityContext;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// State for the authorization middleware.
#[derive(Clone)]
pub struct AuthState {
    pub authorizer: Arc<Authorizer>,
}

/// Reject the request with 401 unless the pipeline allows it.
///
/// The resource identifier is `"<METHOD> <path>"`.
#[instrument(skip_all, name = "authorizer.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Unauthorized> {
    let resource = format!("{} {}", req.method(), req.uri().path());
    let event = event_from_headers(req.headers(), resource);

    let decision = state.authorizer.decide(&event).await;
    let context = match decision.context {
        Some(context) if decision.is_allow() => context,
        _ => {
            tracing::debug!(target: "authorizer.http", "Request rejected by authorizer");
            return Err(Unauthorized);
        }
    };

    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

/// Envelope carrying every UTF-8 header of the request.
pub fn event_from_headers(headers: &HeaderMap, resource: String) -> AuthorizerEvent {
    let headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    AuthorizerEvent {
        headers: Some(headers),
        method_arn: Some(resource),
        ..AuthorizerEvent::default()
    }
}

/// Extension trait for reading the injected identity.
pub trait IdentityExt {
    /// `None` if the auth middleware did not run for this request.
    fn identity(&self) -> Option<&IdentityContext>;
}

impl<B> IdentityExt for axum::http::Request<B> {
    fn identity(&self) -> Option<&IdentityContext> {
        self.extensions().get::<IdentityContext>()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{locate_token, TokenSource};
    use axum::http::HeaderValue;

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_event_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        headers.insert("x-binary", HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap());

        let event = event_from_headers(&headers, "GET /v1/me".to_string());

        assert_eq!(
            locate_token(&event),
            Some((TokenSource::Header, "Bearer abc"))
        );
        assert_eq!(event.resource(), Some("GET /v1/me"));
        assert!(!event.headers.unwrap().contains_key("x-binary"));
    }

    #[test]
    fn test_identity_ext() {
        let mut req = axum::http::Request::new(());
        assert!(req.identity().is_none());

        req.extensions_mut().insert(IdentityContext {
            user_id: "user-123".to_string(),
            email: "unknown".to_string(),
        });
        assert_eq!(req.identity().unwrap().user_id, "user-123");
    }
}
