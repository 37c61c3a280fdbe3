//! The decision pipeline.
//!
//! ```text
//! Start -> Located -> Parsed -> KeyResolved -> Validated -> IdentityResolved -> Decided
//! ```
//!
//! Each stage only moves forward on success. Any failure goes straight to a
//! Deny decision; the failure kind and the stage it occurred after are logged
//! and then discarded. [`Authorizer::authorize`] is the only place the opaque
//! [`Unauthorized`] outcome is produced.

use crate::auth::{
    locate_token, AuthorizerEvent, IdentityResolver, JwksClient, ParsedToken, TokenValidator,
};
use crate::config::Config;
use crate::errors::{AuthzError, Unauthorized};
use crate::observability::metrics;
use crate::policy::{Decision, Effect};
use crate::services::{CognitoIdentityClient, IdentityLookup};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Resource used in Deny documents when the envelope names none.
const FALLBACK_DENY_RESOURCE: &str = "*";

/// Pipeline states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Start,
    Located,
    Parsed,
    KeyResolved,
    Validated,
    IdentityResolved,
    Decided,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Located => "located",
            Stage::Parsed => "parsed",
            Stage::KeyResolved => "key_resolved",
            Stage::Validated => "validated",
            Stage::IdentityResolved => "identity_resolved",
            Stage::Decided => "decided",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The access-control decision engine.
///
/// Holds the process-wide key cache; share one instance (behind `Arc`)
/// across all requests.
pub struct Authorizer {
    keys: Arc<JwksClient>,
    validator: TokenValidator,
    identity: IdentityResolver,
}

impl Authorizer {
    pub fn new(keys: Arc<JwksClient>, validator: TokenValidator, identity: IdentityResolver) -> Self {
        Self {
            keys,
            validator,
            identity,
        }
    }

    /// Wire the production collaborators from configuration.
    pub fn from_config(config: &Config) -> Self {
        let timeout = Duration::from_secs(config.http_timeout_seconds);

        let keys = JwksClient::new(config.jwks_url.clone(), timeout)
            .with_refresh_on_miss(config.jwks_refresh_on_miss);
        let lookup: Arc<dyn IdentityLookup> = Arc::new(CognitoIdentityClient::new(
            config.identity_endpoint.clone(),
            timeout,
        ));

        Self::new(
            Arc::new(keys),
            TokenValidator::new(config.issuer(), config.client_id.clone()),
            IdentityResolver::new(lookup),
        )
    }

    /// Key resolver, for warm-up and health reporting.
    pub fn keys(&self) -> &Arc<JwksClient> {
        &self.keys
    }

    /// Run the pipeline, keeping the internal failure reason.
    ///
    /// # Errors
    ///
    /// Any [`AuthzError`]. Callers at the request boundary should use
    /// [`Authorizer::decide`] or [`Authorizer::authorize`] instead.
    pub async fn evaluate(&self, event: &AuthorizerEvent) -> Result<Decision, AuthzError> {
        self.evaluate_at(event, Utc::now().timestamp()).await
    }

    /// [`Authorizer::evaluate`] with an explicit evaluation time (Unix seconds).
    ///
    /// # Errors
    ///
    /// Any [`AuthzError`].
    pub async fn evaluate_at(
        &self,
        event: &AuthorizerEvent,
        now: i64,
    ) -> Result<Decision, AuthzError> {
        let (_, located) = locate_token(event).ok_or(AuthzError::TokenMissing)?;
        trace_stage(Stage::Located);

        let token = ParsedToken::parse(located)?;
        trace_stage(Stage::Parsed);

        let key = self.keys.get_key(token.kid()).await?;
        trace_stage(Stage::KeyResolved);

        let claims = self.validator.validate(&token, &key, now)?;
        trace_stage(Stage::Validated);

        let identity = self.identity.resolve(claims, token.raw()).await?;
        trace_stage(Stage::IdentityResolved);

        let resource = event.resource().ok_or(AuthzError::ResourceMissing)?;
        Ok(Decision::allow(resource, &identity))
    }

    /// Always produce a decision document, Deny on any failure.
    #[instrument(skip_all, name = "authorizer.pipeline.decide")]
    pub async fn decide(&self, event: &AuthorizerEvent) -> Decision {
        let start = Instant::now();
        let result = self.evaluate(event).await;
        let elapsed = start.elapsed();

        match result {
            Ok(decision) => {
                tracing::info!(
                    target: "authorizer.pipeline",
                    effect = %Effect::Allow,
                    duration_ms = duration_ms(elapsed),
                    "Request allowed"
                );
                metrics::record_decision(Effect::Allow, "allowed", elapsed);
                decision
            }
            Err(e) => {
                // Detail stays in the log; the caller only ever sees a Deny
                tracing::warn!(
                    target: "authorizer.pipeline",
                    effect = %Effect::Deny,
                    kind = e.kind(),
                    stage = %e.stage(),
                    error = %e,
                    duration_ms = duration_ms(elapsed),
                    "Request denied"
                );
                metrics::record_decision(Effect::Deny, e.kind(), elapsed);
                Decision::deny(event.resource().unwrap_or(FALLBACK_DENY_RESOURCE))
            }
        }
    }

    /// Allow decision, or the opaque boundary denial.
    ///
    /// # Errors
    ///
    /// Returns [`Unauthorized`] for every failure kind.
    pub async fn authorize(&self, event: &AuthorizerEvent) -> Result<Decision, Unauthorized> {
        let decision = self.decide(event).await;
        if decision.is_allow() {
            Ok(decision)
        } else {
            Err(Unauthorized)
        }
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn trace_stage(stage: Stage) {
    tracing::trace!(target: "authorizer.pipeline", stage = %stage, "Stage reached");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::services::{MockIdentityLookup, UserAttribute, UserProfile};
    use authorizer_test_utils::{test_issuer, MockIdentityProvider, TestKeypair, TestTokenBuilder};
    use serde_json::json;

    const RESOURCE: &str = "arn:aws:execute-api:ap-northeast-1:123:api/prod/GET/posts";

    async fn authorizer_with(lookup: MockIdentityLookup) -> (Authorizer, MockIdentityProvider) {
        let idp = MockIdentityProvider::start().await;
        idp.serve_jwks(&[&TestKeypair::primary()]).await;

        let keys = Arc::new(JwksClient::new(idp.jwks_url(), Duration::from_secs(5)));
        let authorizer = Authorizer::new(
            keys,
            TokenValidator::new(test_issuer(), None),
            IdentityResolver::new(Arc::new(lookup)),
        );
        (authorizer, idp)
    }

    fn event(token: &str) -> AuthorizerEvent {
        serde_json::from_value(json!({
            "authorizationToken": token,
            "methodArn": RESOURCE
        }))
        .unwrap()
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Start < Stage::Located);
        assert!(Stage::Validated < Stage::IdentityResolved);
        assert!(Stage::IdentityResolved < Stage::Decided);
        assert_eq!(Stage::KeyResolved.to_string(), "key_resolved");
    }

    #[test]
    fn test_from_config_wires_key_endpoint() {
        let vars = std::collections::HashMap::from([
            ("USER_POOL_ID".to_string(), "ap-northeast-1_Pool".to_string()),
            ("JWKS_URL".to_string(), "http://keys.internal/jwks.json".to_string()),
        ]);
        let authorizer = Authorizer::from_config(&Config::from_vars(&vars).unwrap());

        assert_eq!(authorizer.keys().jwks_url(), "http://keys.internal/jwks.json");
    }

    #[tokio::test]
    async fn test_id_token_allowed() {
        let (authorizer, _idp) = authorizer_with(MockIdentityLookup::failing()).await;
        let token = TestTokenBuilder::id_token().build();

        let decision = authorizer.evaluate(&event(&format!("Bearer {}", token))).await.unwrap();

        assert!(decision.is_allow());
        assert_eq!(decision.principal_id, "user-123");
        assert_eq!(decision.resource(), Some(RESOURCE));
    }

    #[tokio::test]
    async fn test_access_token_uses_lookup() {
        let lookup = MockIdentityLookup::returning(UserProfile {
            username: "bob".to_string(),
            attributes: vec![UserAttribute {
                name: "sub".to_string(),
                value: "user-456".to_string(),
            }],
        });
        let (authorizer, _idp) = authorizer_with(lookup).await;
        let token = TestTokenBuilder::access_token().build();

        let decision = authorizer.evaluate(&event(&token)).await.unwrap();
        let context = decision.context.unwrap();

        assert_eq!(context.user_id, "user-456");
        assert_eq!(context.email, "unknown");
    }

    #[tokio::test]
    async fn test_failures_report_their_stage() {
        let (authorizer, _idp) = authorizer_with(MockIdentityLookup::failing()).await;

        let missing = authorizer
            .evaluate(&serde_json::from_value(json!({ "methodArn": RESOURCE })).unwrap())
            .await
            .unwrap_err();
        assert_eq!(missing, AuthzError::TokenMissing);
        assert_eq!(missing.stage(), Stage::Start);

        let malformed = authorizer.evaluate(&event("Bearer abc.def")).await.unwrap_err();
        assert_eq!(malformed.stage(), Stage::Located);

        let unknown_kid = TestTokenBuilder::id_token().header_kid("rotated-away").build();
        let err = authorizer.evaluate(&event(&unknown_kid)).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Parsed);

        let no_sub = TestTokenBuilder::id_token().without_claim("sub").build();
        let err = authorizer.evaluate(&event(&no_sub)).await.unwrap_err();
        assert_eq!(err.stage(), Stage::Validated);
    }

    #[tokio::test]
    async fn test_missing_resource_denies() {
        let (authorizer, _idp) = authorizer_with(MockIdentityLookup::failing()).await;
        let e: AuthorizerEvent = serde_json::from_value(json!({
            "authorizationToken": TestTokenBuilder::id_token().build()
        }))
        .unwrap();

        assert_eq!(
            authorizer.evaluate(&e).await.unwrap_err(),
            AuthzError::ResourceMissing
        );
        let decision = authorizer.decide(&e).await;
        assert_eq!(decision.resource(), Some("*"));
        assert!(!decision.is_allow());
    }

    #[tokio::test]
    async fn test_token_failures_reported_before_missing_resource() {
        let (authorizer, idp) = authorizer_with(MockIdentityLookup::failing()).await;

        let no_token: AuthorizerEvent =
            serde_json::from_value(json!({ "headers": { "Host": "x" } })).unwrap();
        assert_eq!(
            authorizer.evaluate(&no_token).await.unwrap_err(),
            AuthzError::TokenMissing
        );

        let malformed: AuthorizerEvent =
            serde_json::from_value(json!({ "authorizationToken": "Bearer abc.def" })).unwrap();
        assert!(matches!(
            authorizer.evaluate(&malformed).await,
            Err(AuthzError::TokenMalformed(_))
        ));

        let expired: AuthorizerEvent = serde_json::from_value(json!({
            "authorizationToken": TestTokenBuilder::id_token().expires_in(-10).build()
        }))
        .unwrap();
        assert!(matches!(
            authorizer.evaluate(&expired).await,
            Err(AuthzError::TokenExpired { .. })
        ));

        // Malformed and missing tokens never reach the key endpoint
        assert_eq!(idp.jwks_request_count().await, 1);
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_evaluate_at_uses_given_time() {
        let (authorizer, _idp) = authorizer_with(MockIdentityLookup::failing()).await;
        let exp = Utc::now().timestamp() + 600;
        let token = TestTokenBuilder::id_token().expires_at(exp).build();

        assert!(authorizer.evaluate_at(&event(&token), exp - 1).await.is_ok());
        assert!(matches!(
            authorizer.evaluate_at(&event(&token), exp).await,
            Err(AuthzError::TokenExpired { .. })
        ));
    }

    #[tokio::test]
    async fn test_authorize_hides_reason() {
        let (authorizer, _idp) = authorizer_with(MockIdentityLookup::failing()).await;
        let expired = TestTokenBuilder::id_token().expires_in(-10).build();

        assert_eq!(authorizer.authorize(&event(&expired)).await, Err(Unauthorized));
        let decision = authorizer.decide(&event(&expired)).await;
        assert!(decision.context.is_none());
        assert_eq!(decision.principal_id, "anonymous");
    }
}
