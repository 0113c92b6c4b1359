//! Compact token (JWT) utilities shared by the bridge service and its clients.
//!
//! This module provides the parsing helpers that do not need key material:
//! - Size limits for DoS prevention
//! - Unverified header/payload reads (algorithm dispatch, client-side expiry)
//! - Encoding of unsecured tokens (`alg: none`) for deployments that
//!   deliberately run without a signing key
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing read through this module is trusted: the server verifies
//!   signatures separately, the client only reads `exp` to schedule refreshes
//! - Error messages are intentionally generic

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed token size in bytes (16KB).
///
/// Group membership claims dominate token size; a principal with a few hundred
/// groups still fits. Anything larger is rejected before any base64 decoding
/// or signature work.
pub const MAX_JWT_SIZE_BYTES: usize = 16_384;

/// `alg` header value of an unsecured token.
pub const UNSECURED_ALGORITHM: &str = "none";

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while reading a compact token without verifying it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtFormatError {
    /// Token size exceeds maximum allowed.
    #[error("The token is too large")]
    TokenTooLarge,

    /// Token format is invalid (structure, base64 or JSON).
    #[error("The token is malformed")]
    MalformedToken,
}

// =============================================================================
// Types
// =============================================================================

/// The subset of the JOSE header the bridge looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

impl TokenHeader {
    /// Returns true if the token claims to be unsecured.
    #[must_use]
    pub fn is_unsecured(&self) -> bool {
        self.alg.eq_ignore_ascii_case(UNSECURED_ALGORITHM)
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: i64,
}

// =============================================================================
// Functions
// =============================================================================

/// Split a compact token into its three segments after the size check.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Token does not have exactly three segments
pub fn split_token(token: &str) -> Result<(&str, &str, &str), JwtFormatError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtFormatError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None)
            if !header.is_empty() && !payload.is_empty() =>
        {
            Ok((header, payload, signature))
        }
        _ => {
            tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
            Err(JwtFormatError::MalformedToken)
        }
    }
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, JwtFormatError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode token segment base64");
        JwtFormatError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse token segment JSON");
        JwtFormatError::MalformedToken
    })
}

/// Read the JOSE header without verifying the token.
///
/// # Errors
///
/// See [`split_token`]; also `MalformedToken` if the header is not valid
/// base64url-encoded JSON with an `alg` field.
pub fn read_unverified_header(token: &str) -> Result<TokenHeader, JwtFormatError> {
    let (header, _, _) = split_token(token)?;
    decode_segment(header)
}

/// Read the payload without verifying the signature.
///
/// # Errors
///
/// See [`split_token`]; also `MalformedToken` if the payload does not
/// deserialize into `T`.
pub fn read_unverified_claims<T: DeserializeOwned>(token: &str) -> Result<T, JwtFormatError> {
    let (_, payload, _) = split_token(token)?;
    decode_segment(payload)
}

/// Extract the `exp` claim (Unix epoch seconds) without verifying the token.
///
/// Used by clients, which hold no key material, to know when to refresh.
///
/// # Errors
///
/// `MalformedToken` if the payload has no integer `exp`.
pub fn extract_expiry(token: &str) -> Result<i64, JwtFormatError> {
    read_unverified_claims::<ExpiryClaim>(token).map(|c| c.exp)
}

/// Encode claims as an unsecured compact token (`header.payload.`).
///
/// The result carries no integrity guarantee whatsoever. Issuing such tokens
/// is a deployment decision made by leaving the signing key unset.
///
/// # Errors
///
/// Returns `serde_json::Error` if the claims cannot be serialized.
pub fn encode_unsecured<T: Serialize>(claims: &T) -> Result<String, serde_json::Error> {
    let header = TokenHeader {
        alg: UNSECURED_ALGORITHM.to_string(),
        typ: Some("JWT".to_string()),
    };
    let header_json = serde_json::to_vec(&header)?;
    let payload_json = serde_json::to_vec(claims)?;

    Ok(format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(payload_json)
    ))
}

/// Decode an unsecured token produced by [`encode_unsecured`].
///
/// # Errors
///
/// `MalformedToken` if the header is not `alg: none`, the signature segment is
/// not empty, or the payload does not deserialize into `T`.
pub fn decode_unsecured<T: DeserializeOwned>(token: &str) -> Result<T, JwtFormatError> {
    let (header, payload, signature) = split_token(token)?;
    let header: TokenHeader = decode_segment(header)?;
    if !header.is_unsecured() || !signature.is_empty() {
        return Err(JwtFormatError::MalformedToken);
    }
    decode_segment(payload)
}

// =============================================================================
// Tests
// =============================================================================
