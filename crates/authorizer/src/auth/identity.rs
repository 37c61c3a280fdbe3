//! Identity resolution from validated claims.
//!
//! ID tokens carry the profile directly. Access tokens only carry `sub` and
//! `username`, so the provider is asked for the profile; on lookup failure
//! the resolver falls back to whatever the claims carry.

use crate::auth::claims::{Claims, TokenKind};
use crate::errors::AuthzError;
use crate::services::IdentityLookup;
use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Resolved requester identity. `user_id` is never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user_id", &"[REDACTED]")
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Resolves identities, calling the provider for access tokens.
#[derive(Clone)]
pub struct IdentityResolver {
    lookup: Arc<dyn IdentityLookup>,
}

impl IdentityResolver {
    pub fn new(lookup: Arc<dyn IdentityLookup>) -> Self {
        Self { lookup }
    }

    /// Resolve the identity behind validated `claims`.
    ///
    /// `raw_token` is forwarded to the provider for access tokens.
    ///
    /// # Errors
    ///
    /// Returns `AuthzError::IdentityUnresolvable` for an unknown token kind
    /// or when no user identifier can be found.
    #[instrument(skip_all, name = "authorizer.identity.resolve")]
    pub async fn resolve(
        &self,
        claims: &Claims,
        raw_token: &SecretString,
    ) -> Result<Identity, AuthzError> {
        match TokenKind::from_claims(claims)? {
            TokenKind::Id => from_claims(claims),
            TokenKind::Access => self.resolve_access(claims, raw_token).await,
        }
    }

    async fn resolve_access(
        &self,
        claims: &Claims,
        raw_token: &SecretString,
    ) -> Result<Identity, AuthzError> {
        match self.lookup.get_user(raw_token).await {
            Ok(profile) => {
                // Attribute values take precedence over the primary username
                let user_id = profile
                    .attribute("sub")
                    .unwrap_or(profile.username.as_str())
                    .to_string();
                let email = profile.attribute("email").map(str::to_string);

                if user_id.is_empty() {
                    tracing::warn!(target: "authorizer.identity", "Lookup returned no user identifier, using token claims");
                    return from_claims(claims);
                }

                tracing::debug!(target: "authorizer.identity", has_email = email.is_some(), "Identity resolved via lookup");
                Ok(Identity { user_id, email })
            }
            Err(e) => {
                tracing::warn!(target: "authorizer.identity", error = %e, "Identity lookup failed, using token claims");
                from_claims(claims)
            }
        }
    }
}

fn from_claims(claims: &Claims) -> Result<Identity, AuthzError> {
    let user_id = claims
        .subject()
        .ok_or_else(|| AuthzError::IdentityUnresolvable("token has no sub".to_string()))?;

    Ok(Identity {
        user_id: user_id.to_string(),
        email: claims.email().map(str::to_string),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::services::{MockIdentityLookup, UserAttribute, UserProfile};
    use serde_json::json;

    fn claims(value: serde_json::Value) -> Claims {
        serde_json::from_value(value).unwrap()
    }

    fn token() -> SecretString {
        SecretString::from("raw-access-token".to_string())
    }

    fn profile(username: &str, attributes: &[(&str, &str)]) -> UserProfile {
        UserProfile {
            username: username.to_string(),
            attributes: attributes
                .iter()
                .map(|(name, value)| UserAttribute {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .collect(),
        }
    }

    fn resolver(lookup: MockIdentityLookup) -> (IdentityResolver, Arc<MockIdentityLookup>) {
        let lookup = Arc::new(lookup);
        (IdentityResolver::new(lookup.clone()), lookup)
    }

    #[tokio::test]
    async fn test_id_token_reads_claims_without_lookup() {
        let (resolver, lookup) = resolver(MockIdentityLookup::failing());
        let c = claims(json!({ "token_use": "id", "sub": "user-123", "email": "a@b.com" }));

        let identity = resolver.resolve(&c, &token()).await.unwrap();

        assert_eq!(identity.user_id, "user-123");
        assert_eq!(identity.email.as_deref(), Some("a@b.com"));
        assert_eq!(lookup.call_count(), 0);
    }

    #[tokio::test]
    async fn test_id_token_without_sub_fails() {
        let (resolver, _) = resolver(MockIdentityLookup::failing());
        let c = claims(json!({ "token_use": "id", "email": "a@b.com" }));

        assert!(matches!(
            resolver.resolve(&c, &token()).await,
            Err(AuthzError::IdentityUnresolvable(_))
        ));
    }

    #[tokio::test]
    async fn test_access_token_attributes_override_username() {
        let (resolver, lookup) = resolver(MockIdentityLookup::returning(profile(
            "bob",
            &[("sub", "user-456"), ("email", "c@d.com")],
        )));
        let c = claims(json!({ "token_use": "access", "sub": "claims-sub" }));

        let identity = resolver.resolve(&c, &token()).await.unwrap();

        assert_eq!(identity.user_id, "user-456");
        assert_eq!(identity.email.as_deref(), Some("c@d.com"));
        assert_eq!(lookup.call_count(), 1);
    }

    #[tokio::test]
    async fn test_access_token_username_without_attributes() {
        let (resolver, _) = resolver(MockIdentityLookup::returning(profile("bob", &[])));
        let c = claims(json!({ "token_use": "access", "sub": "claims-sub", "email": "x@y.com" }));

        let identity = resolver.resolve(&c, &token()).await.unwrap();

        assert_eq!(identity.user_id, "bob");
        assert_eq!(identity.email, None);
    }

    #[tokio::test]
    async fn test_access_token_lookup_failure_falls_back_to_claims() {
        let (resolver, lookup) = resolver(MockIdentityLookup::failing());
        let c = claims(json!({ "token_use": "access", "sub": "user-456" }));

        let identity = resolver.resolve(&c, &token()).await.unwrap();

        assert_eq!(identity.user_id, "user-456");
        assert_eq!(identity.email, None);
        assert_eq!(lookup.call_count(), 1);
    }

    #[tokio::test]
    async fn test_access_token_lookup_failure_without_sub_fails() {
        let (resolver, _) = resolver(MockIdentityLookup::failing());
        let c = claims(json!({ "token_use": "access", "username": "bob" }));

        assert!(matches!(
            resolver.resolve(&c, &token()).await,
            Err(AuthzError::IdentityUnresolvable(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_token_use_fails_without_lookup() {
        let (resolver, lookup) = resolver(MockIdentityLookup::returning(profile("bob", &[])));

        for c in [
            claims(json!({ "token_use": "refresh", "sub": "user-1" })),
            claims(json!({ "sub": "user-1" })),
        ] {
            assert!(matches!(
                resolver.resolve(&c, &token()).await,
                Err(AuthzError::IdentityUnresolvable(_))
            ));
        }
        assert_eq!(lookup.call_count(), 0);
    }

    #[test]
    fn test_identity_debug_redacts() {
        let identity = Identity {
            user_id: "user-secret".to_string(),
            email: Some("secret@example.com".to_string()),
        };
        let debug_str = format!("{:?}", identity);

        assert!(!debug_str.contains("user-secret"));
        assert!(!debug_str.contains("secret@example.com"));
    }
}
