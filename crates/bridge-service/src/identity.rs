//! Identities on both sides of the bridge.
//!
//! A [`Principal`] comes out of the handshake. A [`ReconstitutedIdentity`] is
//! rebuilt from a validated bearer token and is what bearer-protected handlers
//! see. The two must agree on authentication type for the bridge to be
//! transparent to authorization code.

use crate::errors::{BridgeError, ValidationError};
use common::claims::{Claim, ClaimSet, TokenClaims};
use std::fmt;

/// Verified identity produced by the handshake.
///
/// Immutable and request-scoped: the handshake middleware inserts it into the
/// request extensions.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    name: String,
    authentication_type: String,
    claims: ClaimSet,
}

impl Principal {
    /// `name` is the handshake-native form, e.g. `CORP\alice`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        authentication_type: impl Into<String>,
        claims: ClaimSet,
    ) -> Self {
        Self {
            name: name.into(),
            authentication_type: authentication_type.into(),
            claims,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn authentication_type(&self) -> &str {
        &self.authentication_type
    }

    #[must_use]
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("name", &"[REDACTED]")
            .field("authentication_type", &self.authentication_type)
            .field("claims", &self.claims.len())
            .finish()
    }
}

/// Identity rebuilt from a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstitutedIdentity {
    canonical_name: String,
    authentication_type: String,
    claims: ClaimSet,
    token_claims: ClaimSet,
    expires_at: i64,
}

impl ReconstitutedIdentity {
    /// Build the identity from verified token claims in one step.
    ///
    /// The authentication type comes from the claim named
    /// `authentication_type_claim`; `default_authentication_type` applies only
    /// when that claim is absent. The reserved claim is removed from
    /// [`Self::claims`] but kept in [`Self::token_claims`] along with every
    /// registered claim.
    ///
    /// # Errors
    ///
    /// `Malformed` if the subject is empty, or the reserved claim is absent and
    /// no default is configured.
    pub fn from_token_claims(
        token: TokenClaims,
        authentication_type_claim: &str,
        default_authentication_type: Option<&str>,
    ) -> Result<Self, ValidationError> {
        if token.sub.trim().is_empty() {
            return Err(ValidationError::Malformed);
        }

        let authentication_type = token
            .claims
            .first(authentication_type_claim)
            .or(default_authentication_type)
            .filter(|value| !value.is_empty())
            .ok_or(ValidationError::Malformed)?
            .to_string();

        let token_claims = token.to_claim_set();
        let claims = token
            .claims
            .retain_kinds(|kind| kind != authentication_type_claim);

        Ok(Self {
            canonical_name: token.sub,
            authentication_type,
            claims,
            token_claims,
            expires_at: token.exp,
        })
    }

    /// `user@DOMAIN` form of the principal name.
    #[must_use]
    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    #[must_use]
    pub fn authentication_type(&self) -> &str {
        &self.authentication_type
    }

    /// Claims bridged from the principal, without the reserved marker.
    #[must_use]
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    /// Every claim the token carried, registered ones included.
    #[must_use]
    pub fn token_claims(&self) -> &ClaimSet {
        &self.token_claims
    }

    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Add a claim to the bridged set. Intended for post-validation hooks.
    #[must_use]
    pub fn with_claim(mut self, claim: Claim) -> Self {
        self.claims.push(claim);
        self
    }
}

/// Post-validation step run on every reconstituted identity.
///
/// Hooks run in registration order; each receives the identity produced by
/// the previous one and may return a replacement or reject the request.
pub trait IdentityHook: Send + Sync {
    /// # Errors
    ///
    /// Any error rejects the request.
    fn on_validated(
        &self,
        identity: ReconstitutedIdentity,
    ) -> Result<ReconstitutedIdentity, BridgeError>;
}

impl<F> IdentityHook for F
where
    F: Fn(ReconstitutedIdentity) -> Result<ReconstitutedIdentity, BridgeError> + Send + Sync,
{
    fn on_validated(
        &self,
        identity: ReconstitutedIdentity,
    ) -> Result<ReconstitutedIdentity, BridgeError> {
        self(identity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::claims::kinds;

    fn token(claims: ClaimSet) -> TokenClaims {
        TokenClaims {
            iss: Some("https://x".to_string()),
            aud: Some("https://x".to_string()),
            sub: "alice@CORP".to_string(),
            nbf: 1000,
            iat: 1000,
            exp: 1900,
            claims,
        }
    }

    #[test]
    fn test_from_token_claims_uses_reserved_claim() {
        let claims = ClaimSet::from(vec![
            Claim::new(kinds::NAME, "alice"),
            Claim::new(kinds::GROUP, "g1"),
            Claim::new(kinds::AUTHENTICATION_TYPE, "Handshake"),
        ]);

        let identity = ReconstitutedIdentity::from_token_claims(
            token(claims),
            kinds::AUTHENTICATION_TYPE,
            Some("Fallback"),
        )
        .unwrap();

        assert_eq!(identity.canonical_name(), "alice@CORP");
        assert_eq!(identity.authentication_type(), "Handshake");
        assert_eq!(identity.expires_at(), 1900);
        assert_eq!(identity.claims().count(kinds::AUTHENTICATION_TYPE), 0);
        assert_eq!(identity.claims().len(), 2);
        assert_eq!(
            identity.token_claims().first(kinds::AUTHENTICATION_TYPE),
            Some("Handshake")
        );
        assert_eq!(identity.token_claims().first("iss"), Some("https://x"));
    }

    #[test]
    fn test_missing_reserved_claim_without_default_is_malformed() {
        let claims = ClaimSet::from(vec![Claim::new(kinds::NAME, "alice")]);

        let result = ReconstitutedIdentity::from_token_claims(
            token(claims),
            kinds::AUTHENTICATION_TYPE,
            None,
        );

        assert_eq!(result.unwrap_err(), ValidationError::Malformed);
    }

    #[test]
    fn test_missing_reserved_claim_uses_default() {
        let claims = ClaimSet::from(vec![Claim::new(kinds::NAME, "alice")]);

        let identity = ReconstitutedIdentity::from_token_claims(
            token(claims),
            kinds::AUTHENTICATION_TYPE,
            Some("Negotiate"),
        )
        .unwrap();

        assert_eq!(identity.authentication_type(), "Negotiate");
    }

    #[test]
    fn test_empty_subject_is_malformed() {
        let mut claims = token(ClaimSet::from(vec![Claim::new(
            kinds::AUTHENTICATION_TYPE,
            "Negotiate",
        )]));
        claims.sub = " ".to_string();

        let result =
            ReconstitutedIdentity::from_token_claims(claims, kinds::AUTHENTICATION_TYPE, None);

        assert_eq!(result.unwrap_err(), ValidationError::Malformed);
    }

    #[test]
    fn test_principal_debug_redacts_name() {
        let principal = Principal::new("CORP\\alice", "Negotiate", ClaimSet::new());

        let debug_str = format!("{principal:?}");
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("alice"));
    }

    #[test]
    fn test_closure_hook() {
        let hook = |identity: ReconstitutedIdentity| {
            Ok::<_, BridgeError>(identity.with_claim(Claim::new("role", "reader")))
        };

        let claims = ClaimSet::from(vec![Claim::new(kinds::AUTHENTICATION_TYPE, "Negotiate")]);
        let identity = ReconstitutedIdentity::from_token_claims(
            token(claims),
            kinds::AUTHENTICATION_TYPE,
            None,
        )
        .unwrap();

        let identity = hook.on_validated(identity).unwrap();
        assert_eq!(identity.claims().first("role"), Some("reader"));
    }
}
