//! Issuance policy shared by the token issuer and validator.
//!
//! Both sides of a deployment must agree on issuer, audience, key and
//! algorithm, otherwise every token fails validation. The policy is built once
//! at startup and shared read-only behind an `Arc`.

use crate::services::claim_translator::OUTGOING_KINDS;
use common::claims::kinds;
use common::secret::{ExposeSecret, SecretBox};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default token lifetime (15 minutes).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(15 * 60);

/// Default `iss` value.
pub const DEFAULT_ISSUER: &str = "AD AUTHORITY";

/// Minimum HMAC key length in bytes.
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

/// HMAC algorithms supported for signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    Hs256,
    Hs384,
    Hs512,
}

impl SigningAlgorithm {
    /// The JOSE `alg` header value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::Hs256 => "HS256",
            SigningAlgorithm::Hs384 => "HS384",
            SigningAlgorithm::Hs512 => "HS512",
        }
    }

    #[must_use]
    pub fn algorithm(self) -> jsonwebtoken::Algorithm {
        match self {
            SigningAlgorithm::Hs256 => jsonwebtoken::Algorithm::HS256,
            SigningAlgorithm::Hs384 => jsonwebtoken::Algorithm::HS384,
            SigningAlgorithm::Hs512 => jsonwebtoken::Algorithm::HS512,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(SigningAlgorithm::Hs256),
            "HS384" => Ok(SigningAlgorithm::Hs384),
            "HS512" => Ok(SigningAlgorithm::Hs512),
            other => Err(format!(
                "unsupported signing algorithm '{other}' (expected HS256, HS384 or HS512)"
            )),
        }
    }
}

/// Issuance and verification policy.
///
/// Tokens are signed only when both `signing_key` and `signing_algorithm` are
/// present. Leaving either unset issues unsecured tokens, which carry no
/// integrity guarantee; that is a deployment decision, not a default.
#[derive(Debug)]
pub struct IssuancePolicy {
    /// Expected and emitted `iss`. `None` disables the check.
    pub issuer: Option<String>,

    /// Expected and emitted `aud`. `None` disables the check.
    pub audience: Option<String>,

    pub signing_key: Option<SecretBox<Vec<u8>>>,

    pub signing_algorithm: Option<SigningAlgorithm>,

    /// Token lifetime.
    pub max_age: Duration,

    /// Name of the reserved claim carrying the authentication type.
    pub authentication_type_claim: String,

    /// Used only for tokens that lack the reserved claim. When `None` such
    /// tokens are rejected as malformed.
    pub default_authentication_type: Option<String>,
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        Self {
            issuer: Some(DEFAULT_ISSUER.to_string()),
            audience: None,
            signing_key: None,
            signing_algorithm: None,
            max_age: DEFAULT_MAX_AGE,
            authentication_type_claim: kinds::AUTHENTICATION_TYPE.to_string(),
            default_authentication_type: None,
        }
    }
}

impl IssuancePolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    #[must_use]
    pub fn with_signing(mut self, key: Vec<u8>, algorithm: SigningAlgorithm) -> Self {
        self.signing_key = Some(SecretBox::new(Box::new(key)));
        self.signing_algorithm = Some(algorithm);
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    #[must_use]
    pub fn with_authentication_type_claim(mut self, claim: impl Into<String>) -> Self {
        self.authentication_type_claim = claim.into();
        self
    }

    #[must_use]
    pub fn with_default_authentication_type(mut self, authentication_type: Option<String>) -> Self {
        self.default_authentication_type = authentication_type;
        self
    }

    /// Key material and algorithm, if signing is fully configured.
    #[must_use]
    pub fn signing(&self) -> Option<(&[u8], SigningAlgorithm)> {
        match (&self.signing_key, self.signing_algorithm) {
            (Some(key), Some(algorithm)) => Some((key.expose_secret().as_slice(), algorithm)),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signing().is_some()
    }

    /// Lifetime in whole seconds.
    #[must_use]
    pub fn max_age_secs(&self) -> i64 {
        i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX)
    }
}

/// Check that `name` can carry the authentication type.
///
/// The reserved claim is stripped from the reconstituted claim set, so it
/// must not share a name with a registered claim or with a claim kind the
/// issuer copies into tokens.
///
/// # Errors
///
/// A short reason suitable for a configuration error message.
pub fn check_authentication_type_claim(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("must not be empty".to_string());
    }
    if kinds::is_registered(name) {
        return Err(format!("must not be a registered claim name, got '{name}'"));
    }
    if OUTGOING_KINDS.contains(&name) {
        return Err(format!("must not be a bridged claim kind, got '{name}'"));
    }
    Ok(())
}
