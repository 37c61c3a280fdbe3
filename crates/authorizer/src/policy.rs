//! Decision documents.
//!
//! A [`Decision`] serializes in the gateway's policy shape:
//!
//! ```json
//! {
//!   "principalId": "user-123",
//!   "policyDocument": {
//!     "Version": "2012-10-17",
//!     "Statement": [{
//!       "Action": "execute-api:Invoke",
//!       "Effect": "Allow",
//!       "Resource": "arn:aws:execute-api:..."
//!     }]
//!   },
//!   "context": { "userId": "user-123", "email": "a@b.com" }
//! }
//! ```
//!
//! Deny documents carry principal `anonymous` and no context.

use crate::auth::Identity;
use serde::{Deserialize, Serialize};
use std::fmt;

const POLICY_VERSION: &str = "2012-10-17";
const INVOKE_ACTION: &str = "execute-api:Invoke";
const DENY_PRINCIPAL: &str = "anonymous";
const UNKNOWN_EMAIL: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity context handed to downstream handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub action: String,
    pub effect: Effect,
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

/// The pipeline's only output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub principal_id: String,
    pub policy_document: PolicyDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<IdentityContext>,
}

impl Decision {
    /// Allow `resource` for `identity`; a missing email becomes `"unknown"`.
    pub fn allow(resource: &str, identity: &Identity) -> Self {
        Self {
            principal_id: identity.user_id.clone(),
            policy_document: PolicyDocument::single(Effect::Allow, resource),
            context: Some(IdentityContext {
                user_id: identity.user_id.clone(),
                email: identity
                    .email
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_EMAIL.to_string()),
            }),
        }
    }

    pub fn deny(resource: &str) -> Self {
        Self {
            principal_id: DENY_PRINCIPAL.to_string(),
            policy_document: PolicyDocument::single(Effect::Deny, resource),
            context: None,
        }
    }

    /// Effect of the first statement; a document without statements denies.
    pub fn effect(&self) -> Effect {
        self.policy_document
            .statement
            .first()
            .map_or(Effect::Deny, |s| s.effect)
    }

    pub fn resource(&self) -> Option<&str> {
        self.policy_document
            .statement
            .first()
            .map(|s| s.resource.as_str())
    }

    pub fn is_allow(&self) -> bool {
        self.effect() == Effect::Allow
    }
}

impl PolicyDocument {
    fn single(effect: Effect, resource: &str) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: vec![Statement {
                action: INVOKE_ACTION.to_string(),
                effect,
                resource: resource.to_string(),
            }],
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const RESOURCE: &str = "arn:aws:execute-api:ap-northeast-1:123:api/prod/GET/posts";

    fn identity(email: Option<&str>) -> Identity {
        Identity {
            user_id: "user-123".to_string(),
            email: email.map(str::to_string),
        }
    }

    #[test]
    fn test_allow_document_shape() {
        let decision = Decision::allow(RESOURCE, &identity(Some("a@b.com")));

        assert_eq!(
            serde_json::to_value(&decision).unwrap(),
            json!({
                "principalId": "user-123",
                "policyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Action": "execute-api:Invoke",
                        "Effect": "Allow",
                        "Resource": RESOURCE
                    }]
                },
                "context": { "userId": "user-123", "email": "a@b.com" }
            })
        );
        assert!(decision.is_allow());
        assert_eq!(decision.resource(), Some(RESOURCE));
    }

    #[test]
    fn test_allow_without_email_uses_unknown() {
        let decision = Decision::allow(RESOURCE, &identity(None));
        assert_eq!(decision.context.unwrap().email, "unknown");
    }

    #[test]
    fn test_deny_document_has_no_context() {
        let decision = Decision::deny(RESOURCE);
        let value = serde_json::to_value(&decision).unwrap();

        assert_eq!(value["principalId"], "anonymous");
        assert_eq!(value["policyDocument"]["Statement"][0]["Effect"], "Deny");
        assert!(value.get("context").is_none());
        assert_eq!(decision.effect(), Effect::Deny);
    }

    #[test]
    fn test_empty_statement_list_is_deny() {
        let mut decision = Decision::allow(RESOURCE, &identity(None));
        decision.policy_document.statement.clear();

        assert_eq!(decision.effect(), Effect::Deny);
        assert_eq!(decision.resource(), None);
    }
}
