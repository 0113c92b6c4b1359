//! Deterministic fixtures for testing
//!
//! Keys and policies are fixed so tokens are reproducible across runs.

use bridge_service::identity::Principal;
use bridge_service::policy::{IssuancePolicy, SigningAlgorithm};
use common::claims::{kinds, Claim, ClaimSet};

/// Issuer and audience used by [`test_policy`].
pub const TEST_ISSUER: &str = "https://bridge.test";

/// Deterministic 32-byte HMAC key derived from `seed`.
///
/// The same seed always produces the same key.
pub fn test_signing_key(seed: u8) -> Vec<u8> {
    (0u8..32)
        .map(|i| seed.wrapping_mul(31).wrapping_add(i.wrapping_mul(7)))
        .collect()
}

/// Signed HS256 policy with issuer and audience set to [`TEST_ISSUER`].
pub fn test_policy() -> IssuancePolicy {
    IssuancePolicy::new()
        .with_issuer(Some(TEST_ISSUER.to_string()))
        .with_audience(Some(TEST_ISSUER.to_string()))
        .with_signing(test_signing_key(1), SigningAlgorithm::Hs256)
}

/// Policy without a signing key; tokens are issued unsecured.
pub fn unsigned_policy() -> IssuancePolicy {
    IssuancePolicy::new()
}

/// Builder for handshake principals.
///
/// # Example
/// ```rust,ignore
/// let principal = PrincipalBuilder::new("CORP\\alice")
///     .with_groups(&["g1", "g2"])
///     .build();
/// ```
pub struct PrincipalBuilder {
    name: String,
    authentication_type: String,
    claims: ClaimSet,
}

impl PrincipalBuilder {
    /// Principal with a name claim and `Negotiate` authentication type.
    pub fn new(name: &str) -> Self {
        let short_name = name.split_once('\\').map_or(name, |(_, user)| user);
        Self {
            name: name.to_string(),
            authentication_type: "Negotiate".to_string(),
            claims: ClaimSet::from(vec![Claim::new(kinds::NAME, short_name)]),
        }
    }

    pub fn with_authentication_type(mut self, authentication_type: &str) -> Self {
        self.authentication_type = authentication_type.to_string();
        self
    }

    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.claims
            .extend(groups.iter().map(|group| Claim::new(kinds::GROUP, *group)));
        self
    }

    pub fn with_claim(mut self, kind: &str, value: &str) -> Self {
        self.claims.push(Claim::new(kind, value));
        self
    }

    pub fn build(self) -> Principal {
        Principal::new(self.name, self.authentication_type, self.claims)
    }
}
