//! Signature and claims validation.
//!
//! Checks run in a fixed order, and the first failure wins:
//!
//! 1. Header `alg` is RS256 (no algorithm negotiation)
//! 2. RS256 signature over `header.payload` verifies with the resolved key
//! 3. `exp` is strictly greater than the evaluation time
//! 4. `iss` equals the configured provider's issuer exactly
//! 5. Audience / client, only when a client identifier is configured

use crate::auth::claims::Claims;
use crate::auth::jwks::PublicKey;
use crate::auth::token::ParsedToken;
use crate::errors::AuthzError;
use jsonwebtoken::{crypto, Algorithm};

const REQUIRED_ALG: &str = "RS256";

/// Validates parsed tokens against the configured provider.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    expected_issuer: String,
    client_id: Option<String>,
}

impl TokenValidator {
    pub fn new(expected_issuer: String, client_id: Option<String>) -> Self {
        Self {
            expected_issuer,
            client_id,
        }
    }

    /// Validate `token` with `key` at time `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// `SignatureInvalid`, `TokenExpired`, `IssuerMismatch` or
    /// `AudienceMismatch`, carrying detail for internal logging.
    pub fn validate<'a>(
        &self,
        token: &'a ParsedToken,
        key: &PublicKey,
        now: i64,
    ) -> Result<&'a Claims, AuthzError> {
        verify_signature(token, key)?;

        let claims = token.claims();

        match claims.exp {
            Some(exp) if exp > now => {}
            exp => {
                tracing::debug!(target: "authorizer.validator", exp = ?exp, now, "Token expired");
                return Err(AuthzError::TokenExpired { exp, now });
            }
        }

        if claims.iss.as_deref() != Some(self.expected_issuer.as_str()) {
            tracing::debug!(
                target: "authorizer.validator",
                expected = %self.expected_issuer,
                actual = ?claims.iss,
                "Issuer mismatch"
            );
            return Err(AuthzError::IssuerMismatch {
                expected: self.expected_issuer.clone(),
                actual: claims.iss.clone(),
            });
        }

        if let Some(client_id) = &self.client_id {
            // ID tokens carry `aud`; access tokens carry `client_id`
            let matches = match (&claims.aud, &claims.client_id) {
                (Some(aud), _) => aud.contains(client_id),
                (None, Some(token_client)) => token_client == client_id,
                (None, None) => false,
            };
            if !matches {
                tracing::debug!(target: "authorizer.validator", "Audience mismatch");
                return Err(AuthzError::AudienceMismatch {
                    expected: client_id.clone(),
                });
            }
        }

        tracing::debug!(target: "authorizer.validator", kid = %key.kid, "Token validated");
        Ok(claims)
    }
}

fn verify_signature(token: &ParsedToken, key: &PublicKey) -> Result<(), AuthzError> {
    let header_alg = token.header().alg.as_deref();
    if header_alg != Some(REQUIRED_ALG) {
        tracing::warn!(target: "authorizer.validator", alg = ?header_alg, "Unexpected token algorithm");
        return Err(AuthzError::SignatureInvalid(format!(
            "token alg {:?} is not {}",
            header_alg, REQUIRED_ALG
        )));
    }
    if let Some(alg) = key.alg.as_deref() {
        if alg != REQUIRED_ALG {
            tracing::warn!(target: "authorizer.validator", kid = %key.kid, alg = %alg, "Unexpected JWK algorithm");
            return Err(AuthzError::SignatureInvalid(format!(
                "key alg {} is not {}",
                alg, REQUIRED_ALG
            )));
        }
    }

    match crypto::verify(
        token.signature(),
        token.signing_input(),
        &key.decoding_key,
        Algorithm::RS256,
    ) {
        Ok(true) => Ok(()),
        Ok(false) => Err(AuthzError::SignatureInvalid(
            "signature does not match".to_string(),
        )),
        Err(e) => Err(AuthzError::SignatureInvalid(e.to_string())),
    }
}
