//! Authorizer configuration.
//!
//! Configuration is loaded from environment variables. The client identifier
//! is redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default identity-provider region.
pub const DEFAULT_REGION: &str = "ap-northeast-1";

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default timeout for outbound requests in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for `HTTP_TIMEOUT_SECONDS`.
pub const MAX_HTTP_TIMEOUT_SECONDS: u64 = 60;

/// Authorizer configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Identity-provider region (e.g., "ap-northeast-1").
    pub region: String,

    /// User pool identifier.
    pub user_pool_id: String,

    /// Expected audience / app client identifier. Audience is only checked
    /// when this is set.
    pub client_id: Option<String>,

    /// Key-distribution endpoint.
    pub jwks_url: String,

    /// Identity-lookup endpoint.
    pub identity_endpoint: String,

    /// Refetch the key set once when a kid is unknown.
    pub jwks_refresh_on_miss: bool,

    /// Timeout for key fetches and identity lookups.
    pub http_timeout_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("region", &self.region)
            .field("user_pool_id", &self.user_pool_id)
            .field("client_id", &self.client_id.as_ref().map(|_| "[REDACTED]"))
            .field("jwks_url", &self.jwks_url)
            .field("identity_endpoint", &self.identity_endpoint)
            .field("jwks_refresh_on_miss", &self.jwks_refresh_on_miss)
            .field("http_timeout_seconds", &self.http_timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid boolean configuration: {0}")]
    InvalidBool(String),

    #[error("Invalid HTTP timeout configuration: {0}")]
    InvalidHttpTimeout(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        // Empty values are treated as unset
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let user_pool_id = get("USER_POOL_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("USER_POOL_ID".to_string()))?;

        let region = get("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string());

        let bind_address =
            get("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let client_id = get("USER_POOL_CLIENT_ID");

        let provider_host = format!("https://cognito-idp.{}.amazonaws.com", region);

        let jwks_url = get("JWKS_URL").unwrap_or_else(|| {
            format!("{}/{}/.well-known/jwks.json", provider_host, user_pool_id)
        });

        let identity_endpoint = get("COGNITO_ENDPOINT").unwrap_or_else(|| provider_host.clone());

        let jwks_refresh_on_miss = match get("JWKS_REFRESH_ON_MISS") {
            Some(value) => parse_bool(&value).ok_or_else(|| {
                ConfigError::InvalidBool(format!(
                    "JWKS_REFRESH_ON_MISS must be true or false, got '{}'",
                    value
                ))
            })?,
            None => false,
        };

        let http_timeout_seconds = if let Some(value_str) = get("HTTP_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidHttpTimeout(format!(
                    "HTTP_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_HTTP_TIMEOUT_SECONDS {
                return Err(ConfigError::InvalidHttpTimeout(format!(
                    "HTTP_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                    MAX_HTTP_TIMEOUT_SECONDS, value
                )));
            }

            value
        } else {
            DEFAULT_HTTP_TIMEOUT_SECONDS
        };

        Ok(Config {
            bind_address,
            region,
            user_pool_id,
            client_id,
            jwks_url,
            identity_endpoint,
            jwks_refresh_on_miss,
            http_timeout_seconds,
        })
    }

    /// Issuer string every accepted token must carry.
    ///
    /// Always derived from region and pool; endpoint overrides do not change it.
    pub fn issuer(&self) -> String {
        format!(
            "https://cognito-idp.{}.amazonaws.com/{}",
            self.region, self.user_pool_id
        )
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "USER_POOL_ID".to_string(),
            "ap-northeast-1_Pool".to_string(),
        )])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.region, "ap-northeast-1");
        assert_eq!(config.user_pool_id, "ap-northeast-1_Pool");
        assert!(config.client_id.is_none());
        assert_eq!(
            config.jwks_url,
            "https://cognito-idp.ap-northeast-1.amazonaws.com/ap-northeast-1_Pool/.well-known/jwks.json"
        );
        assert_eq!(
            config.identity_endpoint,
            "https://cognito-idp.ap-northeast-1.amazonaws.com"
        );
        assert!(!config.jwks_refresh_on_miss);
        assert_eq!(config.http_timeout_seconds, DEFAULT_HTTP_TIMEOUT_SECONDS);
    }

    #[test]
    fn test_issuer_from_region_and_pool() {
        let mut vars = base_vars();
        vars.insert("AWS_REGION".to_string(), "us-west-2".to_string());

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(
            config.issuer(),
            "https://cognito-idp.us-west-2.amazonaws.com/ap-northeast-1_Pool"
        );
    }

    #[test]
    fn test_issuer_ignores_endpoint_overrides() {
        let mut vars = base_vars();
        vars.insert(
            "JWKS_URL".to_string(),
            "http://127.0.0.1:9999/.well-known/jwks.json".to_string(),
        );
        vars.insert(
            "COGNITO_ENDPOINT".to_string(),
            "http://127.0.0.1:9999".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.jwks_url, "http://127.0.0.1:9999/.well-known/jwks.json");
        assert_eq!(config.identity_endpoint, "http://127.0.0.1:9999");
        assert_eq!(
            config.issuer(),
            "https://cognito-idp.ap-northeast-1.amazonaws.com/ap-northeast-1_Pool"
        );
    }

    #[test]
    fn test_missing_user_pool_id() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(name)) if name == "USER_POOL_ID"));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let mut vars = base_vars();
        vars.insert("USER_POOL_CLIENT_ID".to_string(), "".to_string());
        vars.insert("AWS_REGION".to_string(), "  ".to_string());

        let config = Config::from_vars(&vars).unwrap();

        assert!(config.client_id.is_none());
        assert_eq!(config.region, DEFAULT_REGION);

        let result = Config::from_vars(&HashMap::from([(
            "USER_POOL_ID".to_string(),
            "".to_string(),
        )]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_refresh_on_miss_parsing() {
        let mut vars = base_vars();
        vars.insert("JWKS_REFRESH_ON_MISS".to_string(), "TRUE".to_string());
        assert!(Config::from_vars(&vars).unwrap().jwks_refresh_on_miss);

        vars.insert("JWKS_REFRESH_ON_MISS".to_string(), "0".to_string());
        assert!(!Config::from_vars(&vars).unwrap().jwks_refresh_on_miss);

        vars.insert("JWKS_REFRESH_ON_MISS".to_string(), "sometimes".to_string());
        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidBool(msg)) if msg.contains("sometimes")));
    }

    #[test]
    fn test_http_timeout_validation() {
        let mut vars = base_vars();
        vars.insert("HTTP_TIMEOUT_SECONDS".to_string(), "5".to_string());
        assert_eq!(Config::from_vars(&vars).unwrap().http_timeout_seconds, 5);

        for bad in ["0", "61", "-1", "abc"] {
            vars.insert("HTTP_TIMEOUT_SECONDS".to_string(), bad.to_string());
            let result = Config::from_vars(&vars);
            assert!(
                matches!(result, Err(ConfigError::InvalidHttpTimeout(_))),
                "'{}' should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_debug_redacts_client_id() {
        let mut vars = base_vars();
        vars.insert(
            "USER_POOL_CLIENT_ID".to_string(),
            "secret-client-id".to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        let debug_str = format!("{:?}", config);

        assert!(!debug_str.contains("secret-client-id"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
