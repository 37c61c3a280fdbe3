//! Builders for signed test tokens.
//!
//! Produces RS256 compact tokens shaped like the identity provider's ID and
//! access tokens, signed with the fixed keys from [`crate::crypto_fixtures`].

use crate::crypto_fixtures::TestKeypair;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{Map, Value};

/// Region used by test configurations.
pub const TEST_REGION: &str = "ap-northeast-1";

/// User pool identifier used by test configurations.
pub const TEST_USER_POOL_ID: &str = "ap-northeast-1_TestPool";

/// App client identifier used by test configurations.
pub const TEST_CLIENT_ID: &str = "test-app-client";

/// Issuer string matching [`TEST_REGION`] and [`TEST_USER_POOL_ID`].
pub fn test_issuer() -> String {
    format!(
        "https://cognito-idp.{}.amazonaws.com/{}",
        TEST_REGION, TEST_USER_POOL_ID
    )
}

/// Builder for signed test tokens.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::id_token()
///     .subject("user-123")
///     .email("a@b.com")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    keypair: TestKeypair,
    header_kid: Option<String>,
    algorithm: Algorithm,
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Token with only `iss` and `exp` (one hour out) set.
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), Value::String(test_issuer()));
        claims.insert("iat".to_string(), Value::from(now));
        claims.insert("exp".to_string(), Value::from(now + 3600));

        Self {
            keypair: TestKeypair::primary(),
            header_kid: None,
            algorithm: Algorithm::RS256,
            claims,
        }
    }

    /// ID token for `user-123` / `a@b.com`.
    pub fn id_token() -> Self {
        Self::new()
            .token_use("id")
            .subject("user-123")
            .email("a@b.com")
            .claim("aud", Value::String(TEST_CLIENT_ID.to_string()))
            .claim("cognito:username", Value::String("alice".to_string()))
    }

    /// Access token for `user-456` without profile claims.
    pub fn access_token() -> Self {
        Self::new()
            .token_use("access")
            .subject("user-456")
            .claim("client_id", Value::String(TEST_CLIENT_ID.to_string()))
            .claim("username", Value::String("bob".to_string()))
            .claim("scope", Value::String("aws.cognito.signin.user.admin".to_string()))
    }

    pub fn subject(self, sub: &str) -> Self {
        self.claim("sub", Value::String(sub.to_string()))
    }

    pub fn email(self, email: &str) -> Self {
        self.claim("email", Value::String(email.to_string()))
    }

    pub fn token_use(self, token_use: &str) -> Self {
        self.claim("token_use", Value::String(token_use.to_string()))
    }

    pub fn issuer(self, iss: &str) -> Self {
        self.claim("iss", Value::String(iss.to_string()))
    }

    pub fn audience(self, aud: &str) -> Self {
        self.claim("aud", Value::String(aud.to_string()))
    }

    pub fn client_id(self, client_id: &str) -> Self {
        self.claim("client_id", Value::String(client_id.to_string()))
    }

    /// Absolute expiry (Unix seconds).
    pub fn expires_at(self, exp: i64) -> Self {
        self.claim("exp", Value::from(exp))
    }

    /// Expiry relative to now; negative values produce an expired token.
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = Utc::now().timestamp() + seconds;
        self.expires_at(exp)
    }

    /// Set an arbitrary claim.
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim entirely.
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Sign with a different keypair (its kid goes into the header).
    pub fn signed_with(mut self, keypair: TestKeypair) -> Self {
        self.keypair = keypair;
        self
    }

    /// Override the header kid without changing the signing key.
    pub fn header_kid(mut self, kid: &str) -> Self {
        self.header_kid = Some(kid.to_string());
        self
    }

    /// Header algorithm; only RSA algorithms can be signed with the fixtures.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Claims as they will be encoded.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Sign and encode the compact token.
    pub fn build(&self) -> String {
        let mut header = Header::new(self.algorithm);
        header.typ = Some("JWT".to_string());
        header.kid = Some(
            self.header_kid
                .clone()
                .unwrap_or_else(|| self.keypair.kid.clone()),
        );

        let key = EncodingKey::from_rsa_pem(self.keypair.private_key_pem.as_bytes())
            .expect("fixture RSA key should parse");

        encode(&header, &Value::Object(self.claims.clone()), &key)
            .expect("test token should encode")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
