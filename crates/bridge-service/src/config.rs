//! Token bridge configuration.
//!
//! Configuration is loaded from environment variables. The signing key is
//! redacted in Debug output.

use crate::handshake::ProxyHeaders;
use crate::policy::{
    check_authentication_type_claim, IssuancePolicy, SigningAlgorithm, DEFAULT_ISSUER,
    DEFAULT_MAX_AGE, MIN_SIGNING_KEY_BYTES,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use common::claims::kinds;
use common::secret::{ExposeSecret, SecretBox};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default token endpoint path.
pub const DEFAULT_TOKEN_PATH: &str = "/token";

/// Upper bound for `TOKEN_MAX_AGE_SECONDS` (one day).
pub const MAX_TOKEN_MAX_AGE_SECONDS: u64 = 86_400;

/// Default proxies allowed to assert a handshake identity.
pub const DEFAULT_TRUSTED_PROXIES: &str = "127.0.0.1,::1";

/// Value of `TOKEN_SIGNING_ALGORITHM` that disables signing.
pub const UNSIGNED_ALGORITHM: &str = "none";

/// Token bridge configuration.
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Token endpoint path (default: "/token").
    pub token_path: String,

    pub issuer: Option<String>,

    pub audience: Option<String>,

    /// Decoded HMAC key.
    pub signing_key: Option<SecretBox<Vec<u8>>>,

    /// `None` when tokens are issued unsigned.
    pub signing_algorithm: Option<SigningAlgorithm>,

    pub max_age: Duration,

    /// Name of the reserved authentication-type claim.
    pub authentication_type_claim: String,

    /// Fallback for tokens lacking the reserved claim.
    pub default_authentication_type: Option<String>,

    /// Peers allowed to assert a handshake identity.
    pub trusted_proxies: Vec<IpAddr>,

    pub proxy_headers: ProxyHeaders,

    /// Graceful shutdown drain period in seconds.
    pub drain_seconds: u64,
}

/// Custom Debug implementation that redacts the signing key.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("token_path", &self.token_path)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field(
                "signing_key",
                &self.signing_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("signing_algorithm", &self.signing_algorithm)
            .field("max_age", &self.max_age)
            .field("authentication_type_claim", &self.authentication_type_claim)
            .field(
                "default_authentication_type",
                &self.default_authentication_type,
            )
            .field("trusted_proxies", &self.trusted_proxies)
            .field("proxy_headers", &self.proxy_headers)
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid token path: {0}")]
    InvalidTokenPath(String),

    #[error("Invalid signing configuration: {0}")]
    InvalidSigning(String),

    #[error("Invalid token max age: {0}")]
    InvalidMaxAge(String),

    #[error("Invalid authentication type claim: {0}")]
    InvalidAuthTypeClaim(String),

    #[error("Invalid handshake configuration: {0}")]
    InvalidHandshake(String),

    #[error("Invalid drain period: {0}")]
    InvalidDrain(String),
}

/// Read a variable, treating an empty or whitespace-only value as unset.
fn non_empty<'a>(vars: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    vars.get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Any invalid value; see [`ConfigError`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Any invalid value; see [`ConfigError`].
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = non_empty(vars, "BIND_ADDRESS")
            .unwrap_or(DEFAULT_BIND_ADDRESS)
            .to_string();

        let token_path = non_empty(vars, "TOKEN_PATH")
            .unwrap_or(DEFAULT_TOKEN_PATH)
            .to_string();
        if !token_path.starts_with('/') {
            return Err(ConfigError::InvalidTokenPath(format!(
                "TOKEN_PATH must start with '/', got '{token_path}'"
            )));
        }

        // Set-but-empty disables the issuer check; unset uses the default
        let issuer = match vars.get("TOKEN_ISSUER") {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(value.trim().to_string()),
            None => Some(DEFAULT_ISSUER.to_string()),
        };

        let audience = non_empty(vars, "TOKEN_AUDIENCE").map(str::to_string);

        let (signing_key, signing_algorithm) = Self::parse_signing(vars)?;

        let max_age = if let Some(value_str) = non_empty(vars, "TOKEN_MAX_AGE_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidMaxAge(format!(
                    "TOKEN_MAX_AGE_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 || value > MAX_TOKEN_MAX_AGE_SECONDS {
                return Err(ConfigError::InvalidMaxAge(format!(
                    "TOKEN_MAX_AGE_SECONDS must be between 1 and \
                     {MAX_TOKEN_MAX_AGE_SECONDS}, got {value}"
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_MAX_AGE
        };

        let authentication_type_claim = non_empty(vars, "TOKEN_AUTH_TYPE_CLAIM")
            .unwrap_or(kinds::AUTHENTICATION_TYPE)
            .to_string();
        check_authentication_type_claim(&authentication_type_claim).map_err(|reason| {
            ConfigError::InvalidAuthTypeClaim(format!("TOKEN_AUTH_TYPE_CLAIM {reason}"))
        })?;

        let default_authentication_type =
            non_empty(vars, "TOKEN_DEFAULT_AUTH_TYPE").map(str::to_string);

        let trusted_proxies = vars
            .get("HANDSHAKE_TRUSTED_PROXIES")
            .map_or(DEFAULT_TRUSTED_PROXIES, String::as_str)
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                entry.parse::<IpAddr>().map_err(|e| {
                    ConfigError::InvalidHandshake(format!(
                        "HANDSHAKE_TRUSTED_PROXIES entry '{entry}' is not an IP address: {e}"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let proxy_headers = ProxyHeaders::parse(
            non_empty(vars, "HANDSHAKE_USER_HEADER").unwrap_or("x-remote-user"),
            non_empty(vars, "HANDSHAKE_AUTH_TYPE_HEADER").unwrap_or("x-remote-auth-type"),
            non_empty(vars, "HANDSHAKE_GROUPS_HEADER").unwrap_or("x-remote-groups"),
        )
        .map_err(|e| ConfigError::InvalidHandshake(e.to_string()))?;

        let drain_seconds = match non_empty(vars, "BRIDGE_DRAIN_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidDrain(format!(
                    "BRIDGE_DRAIN_SECONDS must be a valid non-negative integer, \
                     got '{value_str}': {e}"
                ))
            })?,
            None => 0,
        };

        Ok(Config {
            bind_address,
            token_path,
            issuer,
            audience,
            signing_key,
            signing_algorithm,
            max_age,
            authentication_type_claim,
            default_authentication_type,
            trusted_proxies,
            proxy_headers,
            drain_seconds,
        })
    }

    /// Resolve `TOKEN_SIGNING_KEY` and `TOKEN_SIGNING_ALGORITHM`.
    ///
    /// | key | algorithm | result |
    /// |-----|-----------|--------|
    /// | set | unset | HS256 |
    /// | set | `none` | error |
    /// | set | HSxxx | HSxxx |
    /// | unset | HSxxx | error |
    /// | unset | unset or `none` | unsigned |
    fn parse_signing(
        vars: &HashMap<String, String>,
    ) -> Result<(Option<SecretBox<Vec<u8>>>, Option<SigningAlgorithm>), ConfigError> {
        let algorithm_str = non_empty(vars, "TOKEN_SIGNING_ALGORITHM");
        let algorithm = match algorithm_str {
            Some(value) if value.eq_ignore_ascii_case(UNSIGNED_ALGORITHM) => None,
            Some(value) => Some(
                value
                    .parse::<SigningAlgorithm>()
                    .map_err(ConfigError::InvalidSigning)?,
            ),
            None => None,
        };

        let Some(encoded_key) = non_empty(vars, "TOKEN_SIGNING_KEY") else {
            if let Some(algorithm) = algorithm {
                return Err(ConfigError::InvalidSigning(format!(
                    "TOKEN_SIGNING_ALGORITHM is {algorithm} but TOKEN_SIGNING_KEY is not set"
                )));
            }
            return Ok((None, None));
        };

        if algorithm.is_none() && algorithm_str.is_some() {
            return Err(ConfigError::InvalidSigning(
                "TOKEN_SIGNING_KEY is set but TOKEN_SIGNING_ALGORITHM is 'none'".to_string(),
            ));
        }

        let key = STANDARD.decode(encoded_key).map_err(|e| {
            ConfigError::InvalidSigning(format!("TOKEN_SIGNING_KEY is not valid base64: {e}"))
        })?;

        if key.len() < MIN_SIGNING_KEY_BYTES {
            return Err(ConfigError::InvalidSigning(format!(
                "TOKEN_SIGNING_KEY must decode to at least {MIN_SIGNING_KEY_BYTES} bytes, got {}",
                key.len()
            )));
        }

        Ok((
            Some(SecretBox::new(Box::new(key))),
            Some(algorithm.unwrap_or(SigningAlgorithm::Hs256)),
        ))
    }

    /// Build the issuance policy shared by issuer and validator.
    #[must_use]
    pub fn issuance_policy(&self) -> IssuancePolicy {
        let mut policy = IssuancePolicy::new()
            .with_issuer(self.issuer.clone())
            .with_audience(self.audience.clone())
            .with_max_age(self.max_age)
            .with_authentication_type_claim(self.authentication_type_claim.clone())
            .with_default_authentication_type(self.default_authentication_type.clone());

        if let (Some(key), Some(algorithm)) = (&self.signing_key, self.signing_algorithm) {
            policy = policy.with_signing(key.expose_secret().clone(), algorithm);
        }

        policy
    }
}
