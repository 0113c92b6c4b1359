//! Cryptographic operations for negotiated tokens.
//!
//! Thin wrappers over `jsonwebtoken` HMAC signing and verification, plus the
//! unsecured encoding used when a deployment runs without a signing key.
//!
//! Registered-claim checks (issuer, audience, time window) are not delegated
//! to `jsonwebtoken`: the validator performs them against an explicit `now`
//! so that the expiry boundary is exact and testable.

use crate::errors::{BridgeError, ValidationError};
use crate::policy::SigningAlgorithm;
use common::claims::TokenClaims;
use common::jwt;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::instrument;

/// Sign token claims with an HMAC key.
///
/// # Errors
///
/// `Crypto` if encoding fails. This is a configuration fault and is not
/// retried.
#[instrument(skip_all)]
pub fn sign_claims(
    claims: &TokenClaims,
    key: &[u8],
    algorithm: SigningAlgorithm,
) -> Result<String, BridgeError> {
    let header = Header::new(algorithm.algorithm());

    encode(&header, claims, &EncodingKey::from_secret(key)).map_err(|e| {
        tracing::error!(
            target: "bridge.crypto",
            error = %e,
            algorithm = %algorithm,
            "Token signing failed"
        );
        BridgeError::Crypto(format!("Token signing failed: {e}"))
    })
}

/// Encode token claims without a signature (`alg: none`).
///
/// # Errors
///
/// `Crypto` if the claims cannot be serialized.
pub fn encode_unsigned(claims: &TokenClaims) -> Result<String, BridgeError> {
    jwt::encode_unsecured(claims).map_err(|e| {
        tracing::error!(target: "bridge.crypto", error = %e, "Unsigned token encoding failed");
        BridgeError::Crypto(format!("Token encoding failed: {e}"))
    })
}

/// Verify an HMAC-signed token and return its claims.
///
/// Only the signature and structure are checked here.
///
/// # Errors
///
/// - `SignatureInvalid` - Signature mismatch or unexpected algorithm
/// - `Malformed` - Anything else (structure, base64, JSON, missing fields)
#[instrument(skip_all)]
pub fn verify_signed(
    token: &str,
    key: &[u8],
    algorithm: SigningAlgorithm,
) -> Result<TokenClaims, ValidationError> {
    let mut validation = Validation::new(algorithm.algorithm());
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.leeway = 0;
    validation.required_spec_claims.clear();

    decode::<TokenClaims>(token, &DecodingKey::from_secret(key), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                tracing::debug!(target: "bridge.crypto", "Token signature verification failed");
                ValidationError::SignatureInvalid
            }
            _ => {
                tracing::debug!(
                    target: "bridge.crypto",
                    error = %e,
                    "Signed token could not be decoded"
                );
                ValidationError::Malformed
            }
        })
}

/// Decode an unsecured token.
///
/// # Errors
///
/// `Malformed` if the token is not a well-formed unsecured token.
pub fn decode_unsigned(token: &str) -> Result<TokenClaims, ValidationError> {
    jwt::decode_unsecured(token).map_err(|_| ValidationError::Malformed)
}
