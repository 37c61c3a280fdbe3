//! Token location within heterogeneous request envelopes.
//!
//! The host delivers the bearer token in several shapes depending on the
//! integration type. Each shape is a [`TokenSource`]; sources are tried in
//! [`TokenSource::PRIORITY`] order and the first non-empty hit wins.

use serde::Deserialize;
use std::collections::HashMap;

/// Header casings tried case-sensitively before the case-insensitive scan.
const AUTHORIZATION_CASINGS: [&str; 3] = ["authorization", "Authorization", "AUTHORIZATION"];

/// Inbound request envelope.
///
/// Every field is optional; hosts populate different subsets.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerEvent {
    /// Direct token field (TOKEN-type authorizers).
    #[serde(default)]
    pub authorization_token: Option<String>,

    /// Single-value headers.
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,

    /// Multi-value headers.
    #[serde(default)]
    pub multi_value_headers: Option<HashMap<String, Vec<String>>>,

    /// Nested request context.
    #[serde(default)]
    pub request_context: Option<RequestContext>,

    /// Invoked method identifier (REST payloads).
    #[serde(default)]
    pub method_arn: Option<String>,

    /// Invoked route identifier (HTTP API payloads).
    #[serde(default)]
    pub route_arn: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub authorizer: Option<AuthorizerContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerContext {
    #[serde(default)]
    pub authorization_token: Option<String>,
}

impl AuthorizerEvent {
    /// Resource identifier echoed into the decision.
    pub fn resource(&self) -> Option<&str> {
        non_empty(self.method_arn.as_deref()).or_else(|| non_empty(self.route_arn.as_deref()))
    }
}

/// A place a token may be found, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    DirectField,
    Header,
    MultiValueHeader,
    NestedAuthorizer,
}

impl TokenSource {
    pub const PRIORITY: [TokenSource; 4] = [
        TokenSource::DirectField,
        TokenSource::Header,
        TokenSource::MultiValueHeader,
        TokenSource::NestedAuthorizer,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TokenSource::DirectField => "authorizationToken",
            TokenSource::Header => "headers",
            TokenSource::MultiValueHeader => "multiValueHeaders",
            TokenSource::NestedAuthorizer => "requestContext.authorizer",
        }
    }

    /// Look for a token in this source only.
    pub fn extract(self, event: &AuthorizerEvent) -> Option<&str> {
        match self {
            TokenSource::DirectField => non_empty(event.authorization_token.as_deref()),
            TokenSource::Header => {
                let headers = event.headers.as_ref()?;
                let exact = AUTHORIZATION_CASINGS
                    .iter()
                    .find_map(|name| non_empty(headers.get(*name).map(String::as_str)));
                exact.or_else(|| {
                    headers
                        .iter()
                        .filter(|(key, _)| key.eq_ignore_ascii_case("authorization"))
                        .find_map(|(_, value)| non_empty(Some(value.as_str())))
                })
            }
            TokenSource::MultiValueHeader => event
                .multi_value_headers
                .as_ref()?
                .iter()
                .filter(|(key, _)| key.eq_ignore_ascii_case("authorization"))
                .find_map(|(_, values)| non_empty(values.first().map(String::as_str))),
            TokenSource::NestedAuthorizer => non_empty(
                event
                    .request_context
                    .as_ref()?
                    .authorizer
                    .as_ref()?
                    .authorization_token
                    .as_deref(),
            ),
        }
    }
}

/// Find the token, returning it with the source it came from.
pub fn locate_token(event: &AuthorizerEvent) -> Option<(TokenSource, &str)> {
    let found = TokenSource::PRIORITY
        .iter()
        .find_map(|source| source.extract(event).map(|token| (*source, token)));

    match found {
        Some((source, token)) => {
            tracing::debug!(
                target: "authorizer.locator",
                source = source.name(),
                token_len = token.len(),
                "Token located"
            );
        }
        None => {
            let header_names: Vec<&str> = event
                .headers
                .iter()
                .flat_map(|h| h.keys())
                .map(String::as_str)
                .collect();
            tracing::debug!(
                target: "authorizer.locator",
                headers = ?header_names,
                "No token in any source"
            );
        }
    }

    found
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
