//! Token validation and identity reconstitution.
//!
//! [`validate_token`] is the pure check: signature, issuer, audience, time
//! window, then one-step reconstitution of the identity. [`TokenValidator`]
//! wraps it with metrics, logging and the ordered post-validation hooks.

use crate::crypto;
use crate::errors::{BridgeError, ValidationError};
use crate::identity::{IdentityHook, ReconstitutedIdentity};
use crate::observability::{hash_for_correlation, record_token_validation};
use crate::policy::IssuancePolicy;
use common::jwt;
use std::sync::Arc;
use tracing::instrument;

/// Validate `token` against `policy` at `now` (Unix seconds).
///
/// The accepted window is `nbf <= now < exp`.
///
/// # Errors
///
/// - `Malformed` - Oversized, structurally invalid, or missing required claims
/// - `SignatureInvalid` - Bad signature, algorithm other than the configured
///   one (including `none`), or a signed token when no key is configured
/// - `IssuerMismatch` / `AudienceMismatch` - Policy sets a value the token
///   does not carry
/// - `Expired` - `now >= exp`
/// - `NotYetValid` - `now < nbf`
pub fn validate_token(
    token: &str,
    policy: &IssuancePolicy,
    now: i64,
) -> Result<ReconstitutedIdentity, ValidationError> {
    let header = jwt::read_unverified_header(token).map_err(|_| ValidationError::Malformed)?;

    let claims = match policy.signing() {
        Some((key, algorithm)) => {
            if header.is_unsecured() || header.alg != algorithm.as_str() {
                tracing::debug!(
                    target: "bridge.token.validator",
                    alg = %header.alg,
                    expected = %algorithm,
                    "Token algorithm does not match policy"
                );
                return Err(ValidationError::SignatureInvalid);
            }
            crypto::verify_signed(token, key, algorithm)?
        }
        None => {
            if !header.is_unsecured() {
                tracing::debug!(
                    target: "bridge.token.validator",
                    alg = %header.alg,
                    "Signed token presented but no key is configured"
                );
                return Err(ValidationError::SignatureInvalid);
            }
            crypto::decode_unsigned(token)?
        }
    };

    if let Some(expected) = policy.issuer.as_deref() {
        if claims.iss.as_deref() != Some(expected) {
            return Err(ValidationError::IssuerMismatch);
        }
    }

    if let Some(expected) = policy.audience.as_deref() {
        if claims.aud.as_deref() != Some(expected) {
            return Err(ValidationError::AudienceMismatch);
        }
    }

    if now >= claims.exp {
        return Err(ValidationError::Expired);
    }

    if now < claims.nbf {
        return Err(ValidationError::NotYetValid);
    }

    ReconstitutedIdentity::from_token_claims(
        claims,
        &policy.authentication_type_claim,
        policy.default_authentication_type.as_deref(),
    )
}

/// Validates bearer tokens and runs post-validation hooks in order.
#[derive(Clone)]
pub struct TokenValidator {
    policy: Arc<IssuancePolicy>,
    hooks: Vec<Arc<dyn IdentityHook>>,
}

impl TokenValidator {
    #[must_use]
    pub fn new(policy: Arc<IssuancePolicy>) -> Self {
        Self {
            policy,
            hooks: Vec::new(),
        }
    }

    /// Append a hook. Hooks run in the order they are added.
    #[must_use]
    pub fn with_hook(mut self, hook: impl IdentityHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn policy(&self) -> &IssuancePolicy {
        &self.policy
    }

    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Validate `token` at `now`, then pass the identity through every hook.
    ///
    /// # Errors
    ///
    /// `InvalidToken` with the [`ValidationError`] kind, or whatever error a
    /// hook returns.
    #[instrument(skip_all, name = "bridge.token.validate")]
    pub fn validate(&self, token: &str, now: i64) -> Result<ReconstitutedIdentity, BridgeError> {
        let identity = match validate_token(token, &self.policy, now) {
            Ok(identity) => {
                record_token_validation("success", None);
                tracing::debug!(
                    target: "bridge.token.validator",
                    principal = %hash_for_correlation(identity.canonical_name()),
                    authentication_type = %identity.authentication_type(),
                    "Token validated"
                );
                identity
            }
            Err(e) => {
                record_token_validation("error", Some(e.as_str()));
                tracing::debug!(
                    target: "bridge.token.validator",
                    error_category = e.as_str(),
                    "Token rejected"
                );
                return Err(BridgeError::InvalidToken(e));
            }
        };

        self.hooks
            .iter()
            .try_fold(identity, |identity, hook| hook.on_validated(identity))
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("policy", &self.policy)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::identity::Principal;
    use crate::policy::SigningAlgorithm;
    use crate::services::token_issuer::issue_token;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use common::claims::{kinds, Claim, ClaimSet, TokenClaims};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn alice() -> Principal {
        Principal::new(
            "CORP\\alice",
            "Handshake",
            ClaimSet::from(vec![
                Claim::new(kinds::NAME, "alice"),
                Claim::new(kinds::GROUP, "g1"),
                Claim::new(kinds::GROUP, "g2"),
            ]),
        )
    }

    fn policy() -> IssuancePolicy {
        IssuancePolicy::new()
            .with_issuer(Some("https://x".to_string()))
            .with_audience(Some("https://x".to_string()))
            .with_max_age(Duration::from_secs(15 * 60))
            .with_signing(
                b"scenario-signing-key-32-bytes-ok".to_vec(),
                SigningAlgorithm::Hs256,
            )
    }

    #[test]
    fn test_scenario_round_trip_and_expiry() {
        let policy = policy();
        let token = issue_token(&alice(), &policy, 1000).unwrap();

        let identity = validate_token(&token, &policy, 1500).unwrap();
        assert_eq!(identity.canonical_name(), "alice@CORP");
        assert_eq!(identity.authentication_type(), "Handshake");
        assert_eq!(identity.expires_at(), 1900);

        assert_eq!(
            validate_token(&token, &policy, 2000).unwrap_err(),
            ValidationError::Expired
        );
    }

    #[test]
    fn test_round_trip_holds_across_window() {
        let policy = policy();
        let t0 = 1000;
        let token = issue_token(&alice(), &policy, t0).unwrap();

        for t1 in [t0, t0 + 1, t0 + 450, t0 + policy.max_age_secs() - 1] {
            let identity = validate_token(&token, &policy, t1).unwrap();
            assert_eq!(identity.authentication_type(), alice().authentication_type());
            assert_eq!(identity.canonical_name(), "alice@CORP");
        }
    }

    #[test]
    fn test_expiry_is_exclusive() {
        let policy = policy();
        let token = issue_token(&alice(), &policy, 1000).unwrap();

        assert_eq!(
            validate_token(&token, &policy, 1000 + policy.max_age_secs()).unwrap_err(),
            ValidationError::Expired
        );
    }

    #[test]
    fn test_not_yet_valid() {
        let policy = policy();
        let token = issue_token(&alice(), &policy, 1000).unwrap();

        assert_eq!(
            validate_token(&token, &policy, 999).unwrap_err(),
            ValidationError::NotYetValid
        );
    }

    #[test]
    fn test_all_claims_kept_as_token_claims() {
        let policy = policy();
        let token = issue_token(&alice(), &policy, 1000).unwrap();

        let identity = validate_token(&token, &policy, 1500).unwrap();
        let all = identity.token_claims();

        assert_eq!(all.first("iss"), Some("https://x"));
        assert_eq!(all.first("sub"), Some("alice@CORP"));
        assert_eq!(all.first("exp"), Some("1900"));
        assert_eq!(all.count(kinds::GROUP), 2);
        assert_eq!(all.first(kinds::AUTHENTICATION_TYPE), Some("Handshake"));

        assert_eq!(identity.claims().count(kinds::AUTHENTICATION_TYPE), 0);
        assert_eq!(identity.claims().count(kinds::GROUP), 2);
    }

    #[test]
    fn test_tampered_payload_is_signature_invalid() {
        let policy = policy();
        let token = issue_token(&alice(), &policy, 1000).unwrap();

        let segments: Vec<String> = token.split('.').map(str::to_string).collect();
        let payload = segments[1].clone();

        // Flip every payload character in turn to a different base64url character.
        for index in 0..payload.len() {
            let mut bytes = payload.clone().into_bytes();
            let original = bytes[index];
            bytes[index] = if original == b'A' { b'B' } else { b'A' };
            let tampered_payload = String::from_utf8(bytes).unwrap();

            let tampered = format!("{}.{}.{}", segments[0], tampered_payload, segments[2]);
            assert_eq!(
                validate_token(&tampered, &policy, 1500).unwrap_err(),
                ValidationError::SignatureInvalid,
                "flip at index {index}"
            );
        }
    }

    #[test]
    fn test_wrong_key_is_signature_invalid() {
        let token = issue_token(&alice(), &policy(), 1000).unwrap();
        let other = policy().with_signing(
            b"another-signing-key-32-bytes-ok!".to_vec(),
            SigningAlgorithm::Hs256,
        );

        assert_eq!(
            validate_token(&token, &other, 1500).unwrap_err(),
            ValidationError::SignatureInvalid
        );
    }

    #[test]
    fn test_algorithm_mismatch_is_signature_invalid() {
        let token = issue_token(&alice(), &policy(), 1000).unwrap();
        let other = policy().with_signing(
            b"scenario-signing-key-32-bytes-ok".to_vec(),
            SigningAlgorithm::Hs384,
        );

        assert_eq!(
            validate_token(&token, &other, 1500).unwrap_err(),
            ValidationError::SignatureInvalid
        );
    }

    #[test]
    fn test_unsigned_token_rejected_when_signing_configured() {
        let unsigned_policy = IssuancePolicy::new()
            .with_issuer(Some("https://x".to_string()))
            .with_audience(Some("https://x".to_string()));
        let token = issue_token(&alice(), &unsigned_policy, 1000).unwrap();

        assert_eq!(
            validate_token(&token, &policy(), 1500).unwrap_err(),
            ValidationError::SignatureInvalid
        );
    }

    #[test]
    fn test_signed_token_rejected_when_no_key_configured() {
        let token = issue_token(&alice(), &policy(), 1000).unwrap();
        let unsigned_policy = IssuancePolicy::new()
            .with_issuer(Some("https://x".to_string()))
            .with_audience(Some("https://x".to_string()));

        assert_eq!(
            validate_token(&token, &unsigned_policy, 1500).unwrap_err(),
            ValidationError::SignatureInvalid
        );
    }

    #[test]
    fn test_unsigned_round_trip() {
        let unsigned_policy = IssuancePolicy::new();
        let token = issue_token(&alice(), &unsigned_policy, 1000).unwrap();

        let identity = validate_token(&token, &unsigned_policy, 1500).unwrap();
        assert_eq!(identity.authentication_type(), "Handshake");
    }

    #[test]
    fn test_issuer_mismatch() {
        let token = issue_token(&alice(), &policy(), 1000).unwrap();
        let other = policy().with_issuer(Some("https://y".to_string()));

        assert_eq!(
            validate_token(&token, &other, 1500).unwrap_err(),
            ValidationError::IssuerMismatch
        );
    }

    #[test]
    fn test_audience_mismatch() {
        let token = issue_token(&alice(), &policy(), 1000).unwrap();
        let other = policy().with_audience(Some("https://y".to_string()));

        assert_eq!(
            validate_token(&token, &other, 1500).unwrap_err(),
            ValidationError::AudienceMismatch
        );
    }

    #[test]
    fn test_unset_issuer_and_audience_are_not_checked() {
        let token = issue_token(&alice(), &policy(), 1000).unwrap();
        let lenient = policy().with_issuer(None).with_audience(None);

        assert!(validate_token(&token, &lenient, 1500).is_ok());
    }

    #[test]
    fn test_missing_audience_claim_is_mismatch() {
        let issuing = policy().with_audience(None);
        let token = issue_token(&alice(), &issuing, 1000).unwrap();

        assert_eq!(
            validate_token(&token, &policy(), 1500).unwrap_err(),
            ValidationError::AudienceMismatch
        );
    }

    fn unsigned_token_without_marker() -> String {
        let claims = TokenClaims {
            iss: Some("AD AUTHORITY".to_string()),
            aud: None,
            sub: "alice@CORP".to_string(),
            nbf: 1000,
            iat: 1000,
            exp: 1900,
            claims: ClaimSet::from(vec![Claim::new(kinds::NAME, "alice")]),
        };
        jwt::encode_unsecured(&claims).unwrap()
    }

    #[test]
    fn test_missing_marker_is_malformed_without_default() {
        let token = unsigned_token_without_marker();

        assert_eq!(
            validate_token(&token, &IssuancePolicy::new(), 1500).unwrap_err(),
            ValidationError::Malformed
        );
    }

    #[test]
    fn test_missing_marker_uses_configured_default() {
        let token = unsigned_token_without_marker();
        let policy =
            IssuancePolicy::new().with_default_authentication_type(Some("Negotiate".to_string()));

        let identity = validate_token(&token, &policy, 1500).unwrap();
        assert_eq!(identity.authentication_type(), "Negotiate");
    }

    #[test]
    fn test_garbage_is_malformed() {
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert_eq!(
                validate_token(token, &policy(), 1500).unwrap_err(),
                ValidationError::Malformed,
                "token {token:?}"
            );
        }
    }

    #[test]
    fn test_oversized_token_is_malformed() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let token = format!("{header}.{}.sig", "a".repeat(jwt::MAX_JWT_SIZE_BYTES));

        assert_eq!(
            validate_token(&token, &policy(), 1500).unwrap_err(),
            ValidationError::Malformed
        );
    }

    #[test]
    fn test_hooks_run_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let first_calls = Arc::clone(&calls);
        let second_calls = Arc::clone(&calls);

        let validator = TokenValidator::new(Arc::new(policy()))
            .with_hook(move |identity: ReconstitutedIdentity| {
                assert_eq!(first_calls.fetch_add(1, Ordering::SeqCst), 0);
                Ok::<_, BridgeError>(identity.with_claim(Claim::new("step", "first")))
            })
            .with_hook(move |identity: ReconstitutedIdentity| {
                assert_eq!(second_calls.fetch_add(1, Ordering::SeqCst), 1);
                assert_eq!(identity.claims().first("step"), Some("first"));
                Ok::<_, BridgeError>(identity.with_claim(Claim::new("step", "second")))
            });

        let token = issue_token(&alice(), validator.policy(), 1000).unwrap();
        let identity = validator.validate(&token, 1500).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let steps: Vec<&str> = identity.claims().values("step").collect();
        assert_eq!(steps, vec!["first", "second"]);
    }

    #[test]
    fn test_hook_can_reject() {
        let validator = TokenValidator::new(Arc::new(policy())).with_hook(
            |_identity: ReconstitutedIdentity| -> Result<ReconstitutedIdentity, BridgeError> {
                Err(BridgeError::Forbidden("account disabled".to_string()))
            },
        );

        let token = issue_token(&alice(), validator.policy(), 1000).unwrap();
        let result = validator.validate(&token, 1500);

        assert!(matches!(result, Err(BridgeError::Forbidden(_))));
    }

    #[test]
    fn test_hooks_skipped_for_invalid_tokens() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hook_calls = Arc::clone(&calls);
        let validator = TokenValidator::new(Arc::new(policy())).with_hook(
            move |identity: ReconstitutedIdentity| -> Result<ReconstitutedIdentity, BridgeError> {
                hook_calls.fetch_add(1, Ordering::SeqCst);
                Ok(identity)
            },
        );

        let token = issue_token(&alice(), validator.policy(), 1000).unwrap();
        let result = validator.validate(&token, 5000);

        assert!(matches!(
            result,
            Err(BridgeError::InvalidToken(ValidationError::Expired))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(validator.hook_count(), 1);
    }
}
