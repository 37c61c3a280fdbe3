//! Identity-provider user lookup.
//!
//! Access tokens do not carry the user's profile, so the provider is asked
//! for it with the token itself as the credential (GetUser). The lookup sits
//! behind [`IdentityLookup`] so the resolver can be tested without a network.
//!
//! # Security
//!
//! - The access token is held as a `SecretString` and never logged
//! - Timeouts prevent a slow provider from stalling decisions
//! - Provider error bodies are logged by status only

use crate::errors::AuthzError;
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::instrument;

const GET_USER_TARGET: &str = "AWSCognitoIdentityProviderService.GetUser";
const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Profile returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "Username")]
    pub username: String,

    #[serde(rename = "UserAttributes", default)]
    pub attributes: Vec<UserAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserAttribute {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Value", default)]
    pub value: String,
}

impl UserProfile {
    /// Non-empty value of the named attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
            .filter(|value| !value.is_empty())
    }
}

#[derive(Serialize)]
struct GetUserRequest<'a> {
    #[serde(rename = "AccessToken")]
    access_token: &'a str,
}

/// Looks up the user an access token belongs to.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// # Errors
    ///
    /// Returns `AuthzError::UpstreamUnavailable` when the provider cannot be
    /// reached or rejects the token.
    async fn get_user(&self, access_token: &SecretString) -> Result<UserProfile, AuthzError>;
}

/// HTTP client for the provider's user endpoint.
pub struct CognitoIdentityClient {
    endpoint: String,
    http_client: Client,
}

impl CognitoIdentityClient {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "authorizer.identity", error = %e, "Failed to build HTTP client with custom config, using defaults");
                Client::new()
            });

        Self {
            endpoint,
            http_client,
        }
    }

    async fn send(&self, access_token: &SecretString) -> Result<UserProfile, AuthzError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header("X-Amz-Target", GET_USER_TARGET)
            .header(reqwest::header::CONTENT_TYPE, AMZ_JSON_CONTENT_TYPE)
            .json(&GetUserRequest {
                access_token: access_token.expose_secret(),
            })
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(target: "authorizer.identity", error = %e, "Identity lookup request failed");
                AuthzError::UpstreamUnavailable(format!("identity lookup failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(target: "authorizer.identity", status = %status, "Identity provider rejected lookup");
            return Err(AuthzError::UpstreamUnavailable(format!(
                "identity lookup returned {}",
                status
            )));
        }

        response.json::<UserProfile>().await.map_err(|e| {
            tracing::warn!(target: "authorizer.identity", error = %e, "Failed to parse identity lookup response");
            AuthzError::UpstreamUnavailable(format!("invalid identity lookup response: {}", e))
        })
    }
}

#[async_trait]
impl IdentityLookup for CognitoIdentityClient {
    #[instrument(skip_all, name = "authorizer.identity.get_user")]
    async fn get_user(&self, access_token: &SecretString) -> Result<UserProfile, AuthzError> {
        let start = Instant::now();
        let result = self.send(access_token).await;
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_identity_lookup(status, start.elapsed());
        result
    }
}

/// Mock identity lookup for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns a fixed profile or always fails.
    pub struct MockIdentityLookup {
        profile: Option<UserProfile>,
        call_count: AtomicUsize,
    }

    impl MockIdentityLookup {
        /// Always return `profile`.
        pub fn returning(profile: UserProfile) -> Self {
            Self {
                profile: Some(profile),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Always fail as if the provider were down.
        pub fn failing() -> Self {
            Self {
                profile: None,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityLookup for MockIdentityLookup {
        async fn get_user(&self, _access_token: &SecretString) -> Result<UserProfile, AuthzError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.profile
                .clone()
                .ok_or_else(|| AuthzError::UpstreamUnavailable("mock lookup failure".to_string()))
        }
    }
}
