//! Token issuance: handshake principal in, compact token out.

use crate::crypto;
use crate::errors::BridgeError;
use crate::identity::Principal;
use crate::observability::{hash_for_correlation, record_token_issuance};
use crate::policy::{check_authentication_type_claim, IssuancePolicy};
use crate::services::claim_translator;
use common::claims::{Claim, TokenClaims};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Assemble the claims of the token for `principal` at `now` (Unix seconds).
///
/// The token carries `sub` = canonical name, the principal's name and group
/// claims, and the reserved authentication-type claim. `nbf` and `iat` are
/// `now`; `exp` is `now + max_age`.
///
/// # Errors
///
/// - `Internal` - The principal has no name (a handshake integration bug)
/// - `Configuration` - The reserved claim name collides with a bridged claim
pub fn build_token_claims(
    principal: &Principal,
    policy: &IssuancePolicy,
    now: i64,
) -> Result<TokenClaims, BridgeError> {
    if principal.name().trim().is_empty() || principal.authentication_type().is_empty() {
        tracing::error!(
            target: "bridge.token.issuer",
            "Handshake produced a principal without a name or authentication type"
        );
        return Err(BridgeError::Internal);
    }

    check_authentication_type_claim(&policy.authentication_type_claim).map_err(|reason| {
        BridgeError::Configuration(format!("authentication type claim {reason}"))
    })?;

    let mut claims = claim_translator::outgoing_claims(principal);
    claims.push(Claim::new(
        policy.authentication_type_claim.clone(),
        principal.authentication_type(),
    ));

    Ok(TokenClaims {
        iss: policy.issuer.clone(),
        aud: policy.audience.clone(),
        sub: claim_translator::translate_name(principal.name()),
        nbf: now,
        iat: now,
        exp: now.saturating_add(policy.max_age_secs()),
        claims,
    })
}

/// Encode `claims` as a compact token, signed only when the policy holds
/// both a key and an algorithm.
///
/// # Errors
///
/// `Crypto` if signing or encoding failed (a configuration fault).
pub fn encode_token(claims: &TokenClaims, policy: &IssuancePolicy) -> Result<String, BridgeError> {
    match policy.signing() {
        Some((key, algorithm)) => crypto::sign_claims(claims, key, algorithm),
        None => crypto::encode_unsigned(claims),
    }
}

/// Build and encode the token for `principal` at `now` (Unix seconds).
///
/// # Errors
///
/// See [`build_token_claims`] and [`encode_token`].
pub fn issue_token(
    principal: &Principal,
    policy: &IssuancePolicy,
    now: i64,
) -> Result<String, BridgeError> {
    let token_claims = build_token_claims(principal, policy, now)?;
    encode_token(&token_claims, policy)
}

/// Claim-shaping step run on every token before it is encoded.
///
/// Hooks run in registration order; each receives the claims produced by the
/// previous one and may add, drop or rewrite them, or refuse issuance. The
/// reserved authentication-type claim must come out unchanged.
pub trait TokenHook: Send + Sync {
    /// # Errors
    ///
    /// Any error fails the issuance.
    fn on_issue(
        &self,
        principal: &Principal,
        claims: TokenClaims,
    ) -> Result<TokenClaims, BridgeError>;
}

impl<F> TokenHook for F
where
    F: Fn(&Principal, TokenClaims) -> Result<TokenClaims, BridgeError> + Send + Sync,
{
    fn on_issue(
        &self,
        principal: &Principal,
        claims: TokenClaims,
    ) -> Result<TokenClaims, BridgeError> {
        self(principal, claims)
    }
}

/// Issues tokens under a fixed policy, passing the claims through hooks.
#[derive(Clone)]
pub struct TokenIssuer {
    policy: Arc<IssuancePolicy>,
    hooks: Vec<Arc<dyn TokenHook>>,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(policy: Arc<IssuancePolicy>) -> Self {
        if !policy.is_signed() {
            tracing::warn!(
                target: "bridge.token.issuer",
                "No signing key configured: issued tokens are unsigned \
                 and carry no integrity protection"
            );
        }
        Self {
            policy,
            hooks: Vec::new(),
        }
    }

    /// Append a hook. Hooks run in the order they are added.
    #[must_use]
    pub fn with_hook(mut self, hook: impl TokenHook + 'static) -> Self {
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

    /// Issue a token for `principal`, recording metrics and a correlation log.
    ///
    /// # Errors
    ///
    /// See [`issue_token`], or whatever error a hook returns. `Internal` if a
    /// hook altered the reserved claim. Failures are not retried.
    #[instrument(skip_all, name = "bridge.token.issue")]
    pub fn issue(&self, principal: &Principal, now: i64) -> Result<String, BridgeError> {
        let start = Instant::now();
        let result = self.shape_and_encode(principal, now);
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                record_token_issuance("success", duration);
                tracing::info!(
                    target: "bridge.token.issuer",
                    principal = %hash_for_correlation(principal.name()),
                    authentication_type = %principal.authentication_type(),
                    expires_at = now.saturating_add(self.policy.max_age_secs()),
                    signed = self.policy.is_signed(),
                    "Token issued"
                );
            }
            Err(e) => {
                record_token_issuance("error", duration);
                tracing::error!(
                    target: "bridge.token.issuer",
                    principal = %hash_for_correlation(principal.name()),
                    error = %e,
                    "Token issuance failed"
                );
            }
        }

        result
    }

    fn shape_and_encode(&self, principal: &Principal, now: i64) -> Result<String, BridgeError> {
        let built = build_token_claims(principal, &self.policy, now)?;
        let shaped = self
            .hooks
            .iter()
            .try_fold(built, |claims, hook| hook.on_issue(principal, claims))?;

        let reserved = &self.policy.authentication_type_claim;
        if shaped.claims.count(reserved) != 1
            || shaped.claims.first(reserved) != Some(principal.authentication_type())
        {
            tracing::error!(
                target: "bridge.token.issuer",
                "Token hook altered the reserved authentication type claim"
            );
            return Err(BridgeError::Internal);
        }

        encode_token(&shaped, &self.policy)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("policy", &self.policy)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
