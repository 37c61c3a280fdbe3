//! JWKS client for fetching and caching the identity provider's public keys.
//!
//! The key set is fetched from the provider's `/.well-known/jwks.json`
//! endpoint and shared by every request in the process.
//!
//! # Lifecycle
//!
//! - Populated once, either eagerly via [`JwksClient::warm`] at startup or
//!   lazily on the first lookup.
//! - Population is single-flight: concurrent cold lookups wait on one fetch
//!   and all observe the same [`PublicKeySet`].
//! - A set is never mutated after it is built; refreshes replace it wholesale.
//! - An unknown kid fails fast with `KeyNotFound` unless refetch-on-miss is
//!   enabled, in which case a miss refetches only when the cached set is
//!   older than the minimum refresh interval (default
//!   [`MIN_REFRESH_INTERVAL`]).

use crate::errors::AuthzError;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Minimum age of the cached set before a kid miss may trigger a refetch.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// JSON Web Key from the JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" for RS256 keys).
    #[serde(default)]
    pub kty: Option<String>,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Algorithm (should be "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,
}

/// JWKS response body.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

/// A usable verification key.
#[derive(Clone)]
pub struct PublicKey {
    pub kid: String,
    pub alg: Option<String>,
    pub decoding_key: DecodingKey,
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("kid", &self.kid)
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

impl PublicKey {
    /// Build from an RSA JWK; `None` for keys that cannot verify RS256.
    pub fn from_jwk(jwk: &Jwk) -> Option<Self> {
        let Some(kid) = jwk.kid.as_deref().filter(|kid| !kid.is_empty()) else {
            tracing::warn!(target: "authorizer.jwks", kty = ?jwk.kty, "Skipping JWK without kid");
            return None;
        };
        if jwk.kty.as_deref() != Some("RSA") {
            tracing::warn!(target: "authorizer.jwks", kid = %kid, kty = ?jwk.kty, "Skipping non-RSA JWK");
            return None;
        }
        if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
            tracing::warn!(target: "authorizer.jwks", kid = %kid, "Skipping JWK not meant for signatures");
            return None;
        }

        let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
            tracing::warn!(target: "authorizer.jwks", kid = %kid, "Skipping RSA JWK without n/e");
            return None;
        };

        match DecodingKey::from_rsa_components(n, e) {
            Ok(decoding_key) => Some(Self {
                kid: kid.to_string(),
                alg: jwk.alg.clone(),
                decoding_key,
            }),
            Err(err) => {
                tracing::warn!(target: "authorizer.jwks", kid = %kid, error = %err, "Skipping JWK with invalid RSA components");
                None
            }
        }
    }
}

/// Immutable snapshot of the provider's keys.
#[derive(Debug)]
pub struct PublicKeySet {
    keys: HashMap<String, PublicKey>,
    fetched_at: DateTime<Utc>,
}

impl PublicKeySet {
    pub fn from_jwks(jwks: JwksResponse, fetched_at: DateTime<Utc>) -> Self {
        let keys = jwks
            .keys
            .iter()
            .filter_map(PublicKey::from_jwk)
            .map(|key| (key.kid.clone(), key))
            .collect();

        Self { keys, fetched_at }
    }

    pub fn get(&self, kid: &str) -> Option<&PublicKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn age(&self) -> Duration {
        (Utc::now() - self.fetched_at).to_std().unwrap_or_default()
    }
}

/// Process-wide key resolver.
pub struct JwksClient {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    http_client: reqwest::Client,

    /// Current key set; `None` until first population.
    cache: RwLock<Option<Arc<PublicKeySet>>>,

    /// Serializes fetches so concurrent callers share one request.
    fetch_lock: Mutex<()>,

    refresh_on_miss: bool,

    min_refresh_interval: Duration,
}

impl JwksClient {
    /// Create a client with fail-fast behaviour on unknown kids.
    pub fn new(jwks_url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "authorizer.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
            fetch_lock: Mutex::new(()),
            refresh_on_miss: false,
            min_refresh_interval: MIN_REFRESH_INTERVAL,
        }
    }

    /// Enable or disable refetch-on-miss.
    pub fn with_refresh_on_miss(mut self, enabled: bool) -> Self {
        self.refresh_on_miss = enabled;
        self
    }

    /// Minimum cached-set age before a miss may refetch.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Look up a key by kid.
    ///
    /// # Errors
    ///
    /// Returns `AuthzError::UpstreamUnavailable` if the key set cannot be
    /// fetched, `AuthzError::KeyNotFound` if the kid is not in it.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<PublicKey, AuthzError> {
        let set = self.key_set().await?;
        if let Some(key) = set.get(kid) {
            tracing::debug!(target: "authorizer.jwks", "JWKS cache hit");
            return Ok(key.clone());
        }

        if !self.refresh_on_miss {
            tracing::warn!(target: "authorizer.jwks", known_keys = set.len(), "Key not found in JWKS cache");
            return Err(AuthzError::KeyNotFound {
                kid: kid.to_string(),
            });
        }

        let set = self.refresh_after_miss(&set).await?;
        set.get(kid).cloned().ok_or_else(|| {
            tracing::warn!(target: "authorizer.jwks", known_keys = set.len(), "Key not found in JWKS after refresh");
            AuthzError::KeyNotFound {
                kid: kid.to_string(),
            }
        })
    }

    /// Populate the cache before serving traffic.
    pub async fn warm(&self) -> Result<(), AuthzError> {
        self.key_set().await.map(|_| ())
    }

    /// Whether a key set has been loaded.
    pub async fn is_warm(&self) -> bool {
        self.cache.read().await.is_some()
    }

    /// Fetch a fresh set and replace the cached one.
    pub async fn force_refresh(&self) -> Result<(), AuthzError> {
        let _guard = self.fetch_lock.lock().await;
        self.fetch_and_store().await.map(|_| ())
    }

    /// Current set, fetching it once if the cache is cold.
    async fn key_set(&self) -> Result<Arc<PublicKeySet>, AuthzError> {
        if let Some(set) = self.cache.read().await.as_ref() {
            return Ok(Arc::clone(set));
        }

        let _guard = self.fetch_lock.lock().await;

        // Another caller may have populated the cache while we waited
        if let Some(set) = self.cache.read().await.as_ref() {
            return Ok(Arc::clone(set));
        }

        self.fetch_and_store().await
    }

    /// Refresh once for a kid miss; concurrent misses share the refresh.
    async fn refresh_after_miss(
        &self,
        stale: &Arc<PublicKeySet>,
    ) -> Result<Arc<PublicKeySet>, AuthzError> {
        let _guard = self.fetch_lock.lock().await;

        if let Some(current) = self.cache.read().await.as_ref() {
            if !Arc::ptr_eq(current, stale) {
                return Ok(Arc::clone(current));
            }
        }

        if stale.age() < self.min_refresh_interval {
            tracing::debug!(target: "authorizer.jwks", "Key set refreshed recently, not refetching");
            return Ok(Arc::clone(stale));
        }

        self.fetch_and_store().await
    }

    /// Caller must hold `fetch_lock`.
    async fn fetch_and_store(&self) -> Result<Arc<PublicKeySet>, AuthzError> {
        let set = match self.fetch().await {
            Ok(set) => Arc::new(set),
            Err(e) => {
                metrics::record_jwks_fetch("error");
                return Err(e);
            }
        };
        metrics::record_jwks_fetch("success");

        tracing::info!(
            target: "authorizer.jwks",
            key_count = set.len(),
            "JWKS cache refreshed"
        );

        *self.cache.write().await = Some(Arc::clone(&set));
        Ok(set)
    }

    async fn fetch(&self) -> Result<PublicKeySet, AuthzError> {
        tracing::debug!(target: "authorizer.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "authorizer.jwks", error = %e, "Failed to fetch JWKS");
                AuthzError::UpstreamUnavailable(format!("JWKS fetch failed: {}", e))
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "authorizer.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(AuthzError::UpstreamUnavailable(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "authorizer.jwks", error = %e, "Failed to parse JWKS response");
            AuthzError::UpstreamUnavailable(format!("JWKS response unparseable: {}", e))
        })?;

        Ok(PublicKeySet::from_jwks(jwks, Utc::now()))
    }
}
