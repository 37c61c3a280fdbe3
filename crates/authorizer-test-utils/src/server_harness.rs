//! Mocked identity provider for integration tests.
//!
//! One wiremock server plays both external collaborators:
//! - `GET /.well-known/jwks.json` - the key-distribution endpoint
//! - `POST /` with `X-Amz-Target: ...GetUser` - the identity-lookup endpoint

use crate::crypto_fixtures::{jwks_json, TestKeypair};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the key-distribution endpoint on the mock server.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// `X-Amz-Target` value of the identity-lookup call.
pub const GET_USER_TARGET: &str = "AWSCognitoIdentityProviderService.GetUser";

/// Wiremock-backed stand-in for the identity provider.
pub struct MockIdentityProvider {
    server: MockServer,
}

impl MockIdentityProvider {
    /// Start an empty mock server; mount endpoints with the `serve_*` methods.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URI, usable as the identity-lookup endpoint.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Underlying server, for mounting one-off mocks.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Full key-distribution URL.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Serve a JWKS listing `keypairs`.
    pub async fn serve_jwks(&self, keypairs: &[&TestKeypair]) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_json(keypairs)))
            .mount(&self.server)
            .await;
    }

    /// Serve a JWKS with a response delay and verify the call count when the
    /// server is dropped.
    pub async fn serve_jwks_expecting(
        &self,
        keypairs: &[&TestKeypair],
        expected_calls: u64,
        delay: Duration,
    ) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jwks_json(keypairs))
                    .set_delay(delay),
            )
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Make the key-distribution endpoint fail with `status`.
    pub async fn fail_jwks(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Serve a successful identity lookup.
    pub async fn serve_user(&self, username: &str, attributes: &[(&str, &str)]) {
        let attributes: Vec<_> = attributes
            .iter()
            .map(|(name, value)| json!({ "Name": name, "Value": value }))
            .collect();

        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-amz-target", GET_USER_TARGET))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Username": username,
                "UserAttributes": attributes,
            })))
            .mount(&self.server)
            .await;
    }

    /// Make the identity lookup fail with `status` and a provider-style body.
    pub async fn fail_user_lookup(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("x-amz-target", GET_USER_TARGET))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "__type": "NotAuthorizedException",
                "message": "Access Token has been revoked",
            })))
            .mount(&self.server)
            .await;
    }

    /// Drop all mounted endpoints.
    pub async fn reset(&self) {
        self.server.reset().await;
    }

    /// Number of requests that hit the key-distribution endpoint.
    pub async fn jwks_request_count(&self) -> usize {
        self.count_requests(|req| req.url.path() == JWKS_PATH).await
    }

    /// Number of identity-lookup requests received.
    pub async fn user_lookup_count(&self) -> usize {
        self.count_requests(|req| req.method.as_str() == "POST" && req.url.path() == "/")
            .await
    }

    async fn count_requests(&self, filter: impl Fn(&wiremock::Request) -> bool) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|req| filter(req))
            .count()
    }
}
