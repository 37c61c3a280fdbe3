//! Compact token parsing.
//!
//! Splits a located token into its three segments and decodes the header and
//! payload without verifying anything. Verification happens in
//! [`crate::auth::validator`] once the signing key is known.

use crate::auth::claims::Claims;
use crate::errors::AuthzError;
use base64::{engine::general_purpose::URL_SAFE, Engine};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Maximum accepted token size in bytes, checked before any decoding.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

const BEARER_PREFIX: &str = "Bearer ";

/// Unverified token header.
///
/// Only decodes from a JSON object; the flattened `extra` map rejects arrays.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenHeader {
    #[serde(default)]
    pub kid: Option<String>,

    #[serde(default)]
    pub alg: Option<String>,

    /// Header parameters other than `kid` and `alg` (`typ` and so on).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A token split into segments with decoded header and claims.
pub struct ParsedToken {
    raw: SecretString,
    kid: String,
    header: TokenHeader,
    claims: Claims,
    signing_input: String,
    signature: String,
}

impl fmt::Debug for ParsedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedToken")
            .field("kid", &self.kid)
            .field("header", &self.header)
            .field("claims", &self.claims)
            .finish_non_exhaustive()
    }
}

impl ParsedToken {
    /// Parse a token as located in the request.
    ///
    /// Strips an exact `"Bearer "` prefix and surrounding whitespace, then
    /// requires exactly three non-empty dot-separated segments.
    ///
    /// # Errors
    ///
    /// Returns `AuthzError::TokenMalformed` for any structural, base64 or
    /// JSON failure, or a header without a `kid`.
    pub fn parse(located: &str) -> Result<Self, AuthzError> {
        let token = located.strip_prefix(BEARER_PREFIX).unwrap_or(located).trim();

        if token.len() > MAX_TOKEN_SIZE_BYTES {
            return Err(AuthzError::TokenMalformed(format!(
                "token is {} bytes, limit {}",
                token.len(),
                MAX_TOKEN_SIZE_BYTES
            )));
        }

        let parts: Vec<&str> = token.split('.').collect();
        let (header_b64, payload_b64, signature_b64) = match parts.as_slice() {
            [h, p, s] if !h.is_empty() && !p.is_empty() && !s.is_empty() => (*h, *p, *s),
            _ => {
                return Err(AuthzError::TokenMalformed(format!(
                    "expected 3 non-empty segments, got {}",
                    parts.len()
                )))
            }
        };

        let header_bytes = decode_segment(header_b64)
            .map_err(|e| AuthzError::TokenMalformed(format!("header: {}", e)))?;
        let header: TokenHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| AuthzError::TokenMalformed(format!("header json: {}", e)))?;

        let payload_bytes = decode_segment(payload_b64)
            .map_err(|e| AuthzError::TokenMalformed(format!("payload: {}", e)))?;
        let claims: Claims = serde_json::from_slice(&payload_bytes)
            .map_err(|e| AuthzError::TokenMalformed(format!("payload json: {}", e)))?;

        let kid = header
            .kid
            .clone()
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| AuthzError::TokenMalformed("header has no kid".to_string()))?;

        tracing::debug!(
            target: "authorizer.token",
            kid = %kid,
            alg = ?header.alg,
            token_use = ?claims.token_use,
            "Token parsed"
        );

        Ok(Self {
            raw: SecretString::from(token.to_string()),
            kid,
            header,
            claims,
            signing_input: format!("{}.{}", header_b64, payload_b64),
            signature: signature_b64.to_string(),
        })
    }

    /// The bare compact token (prefix and whitespace removed).
    pub fn raw(&self) -> &SecretString {
        &self.raw
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// Unverified claims. Only trust them after validation.
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// `header.payload` bytes covered by the signature.
    pub fn signing_input(&self) -> &[u8] {
        self.signing_input.as_bytes()
    }

    /// Signature segment as it appeared in the token (base64url).
    pub fn signature(&self) -> &str {
        &self.signature
    }
}

/// Decode a base64url segment, padding it with `=` to a multiple of 4 first.
pub fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let mut padded = segment.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    URL_SAFE.decode(padded)
}
