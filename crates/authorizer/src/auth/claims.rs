//! Token claims.
//!
//! Standard fields the authorizer reads are typed; everything else is kept in
//! `extra`. `sub`, `email` and the username are redacted in Debug output.

use crate::errors::AuthzError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Claims decoded from a token payload.
///
/// All fields are optional at decode time; which ones are required depends on
/// the validation step and the token kind.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Expiration timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Audience; present on ID tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// App client; present on access tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// `"id"` or `"access"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_use: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Provider username carried by ID tokens.
    #[serde(
        rename = "cognito:username",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username: Option<String>,

    /// Every other claim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Claims")
            .field("sub", &redact(&self.sub))
            .field("iss", &self.iss)
            .field("exp", &self.exp)
            .field("aud", &self.aud)
            .field("client_id", &self.client_id)
            .field("token_use", &self.token_use)
            .field("email", &redact(&self.email))
            .field("username", &redact(&self.username))
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Claims {
    /// Non-empty `sub`.
    pub fn subject(&self) -> Option<&str> {
        self.sub.as_deref().filter(|s| !s.is_empty())
    }

    /// Non-empty `email`.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|s| !s.is_empty())
    }
}

/// `aud` is either a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == client_id,
            Audience::Many(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

/// Kind of token, from the `token_use` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Id,
    Access,
}

impl TokenKind {
    /// # Errors
    ///
    /// Returns `AuthzError::IdentityUnresolvable` for a missing or unknown value.
    pub fn from_claims(claims: &Claims) -> Result<Self, AuthzError> {
        match claims.token_use.as_deref() {
            Some("id") => Ok(TokenKind::Id),
            Some("access") => Ok(TokenKind::Access),
            other => Err(AuthzError::IdentityUnresolvable(format!(
                "unsupported token_use {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(value: Value) -> Claims {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_id_token_claims() {
        let c = claims(json!({
            "sub": "user-123",
            "iss": "https://issuer",
            "exp": 1700000000,
            "aud": "client",
            "token_use": "id",
            "email": "a@b.com",
            "cognito:username": "alice",
            "email_verified": true
        }));

        assert_eq!(c.subject(), Some("user-123"));
        assert_eq!(c.email(), Some("a@b.com"));
        assert_eq!(c.username.as_deref(), Some("alice"));
        assert_eq!(c.aud, Some(Audience::Single("client".to_string())));
        assert_eq!(c.extra.get("email_verified"), Some(&json!(true)));
        assert_eq!(TokenKind::from_claims(&c), Ok(TokenKind::Id));
    }

    #[test]
    fn test_access_token_claims() {
        let c = claims(json!({
            "sub": "user-456",
            "token_use": "access",
            "client_id": "client",
            "scope": "aws.cognito.signin.user.admin",
            "username": "bob"
        }));

        assert_eq!(c.client_id.as_deref(), Some("client"));
        assert!(c.aud.is_none());
        assert_eq!(c.extra.get("username"), Some(&json!("bob")));
        assert_eq!(TokenKind::from_claims(&c), Ok(TokenKind::Access));
    }

    #[test]
    fn test_unknown_token_use() {
        for token_use in [json!("refresh"), json!("ID"), Value::Null] {
            let c = claims(json!({ "token_use": token_use }));
            assert!(matches!(
                TokenKind::from_claims(&c),
                Err(AuthzError::IdentityUnresolvable(_))
            ));
        }
    }

    #[test]
    fn test_audience_list() {
        let c = claims(json!({ "aud": ["a", "b"] }));
        let aud = c.aud.unwrap();
        assert!(aud.contains("b"));
        assert!(!aud.contains("c"));
    }

    #[test]
    fn test_empty_subject_is_none() {
        let c = claims(json!({ "sub": "", "email": "" }));
        assert_eq!(c.subject(), None);
        assert_eq!(c.email(), None);
    }

    #[test]
    fn test_non_integer_exp_rejected() {
        let result: Result<Claims, _> = serde_json::from_value(json!({ "exp": "tomorrow" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_claims_debug_redacts_identity() {
        let c = claims(json!({
            "sub": "secret-user-id",
            "email": "secret@example.com",
            "cognito:username": "secret-name"
        }));

        let debug_str = format!("{:?}", c);

        assert!(!debug_str.contains("secret-user-id"));
        assert!(!debug_str.contains("secret@example.com"));
        assert!(!debug_str.contains("secret-name"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
