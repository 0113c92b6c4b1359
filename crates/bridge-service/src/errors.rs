//! Token bridge error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Messages
//! returned to clients are intentionally generic; the specific cause is logged
//! and counted server-side.

use axum::{
    http::{header::WWW_AUTHENTICATE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Bearer challenge for requests that carry no bearer token.
pub const BEARER_CHALLENGE: &str = "Bearer realm=\"token-bridge\"";

/// Bearer challenge for requests whose token was rejected.
pub const INVALID_TOKEN_CHALLENGE: &str = "Bearer realm=\"token-bridge\", error=\"invalid_token\"";

/// Challenge asking the client to perform the handshake.
pub const NEGOTIATE_CHALLENGE: &str = "Negotiate";

/// Reasons a compact token is rejected.
///
/// Every kind is terminal for the request that carried the token.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("token issuer does not match")]
    IssuerMismatch,

    #[error("token audience does not match")]
    AudienceMismatch,

    #[error("token is malformed")]
    Malformed,
}

impl ValidationError {
    /// Bounded label value for metrics and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationError::SignatureInvalid => "signature_invalid",
            ValidationError::Expired => "expired",
            ValidationError::NotYetValid => "not_yet_valid",
            ValidationError::IssuerMismatch => "issuer_mismatch",
            ValidationError::AudienceMismatch => "audience_mismatch",
            ValidationError::Malformed => "malformed",
        }
    }
}

/// Token bridge error type.
///
/// Maps to HTTP status codes:
/// - MissingToken, InvalidToken: 401 with a Bearer challenge
/// - HandshakeRequired: 401 with a Negotiate challenge
/// - Forbidden: 403
/// - Configuration, Crypto, Internal: 500
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] ValidationError),

    #[error("Handshake authentication required")]
    HandshakeRequired,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Internal server error")]
    Internal,
}

impl BridgeError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            BridgeError::MissingToken
            | BridgeError::InvalidToken(_)
            | BridgeError::HandshakeRequired => 401,
            BridgeError::Forbidden(_) => 403,
            BridgeError::Configuration(_) | BridgeError::Crypto(_) | BridgeError::Internal => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let (status, code, message, challenge) = match &self {
            BridgeError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "MISSING_TOKEN",
                "A bearer token is required".to_string(),
                Some(BEARER_CHALLENGE),
            ),
            BridgeError::InvalidToken(_) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                "The bearer token is invalid".to_string(),
                Some(INVALID_TOKEN_CHALLENGE),
            ),
            BridgeError::HandshakeRequired => (
                StatusCode::UNAUTHORIZED,
                "HANDSHAKE_REQUIRED",
                "Negotiate authentication is required".to_string(),
                Some(NEGOTIATE_CHALLENGE),
            ),
            BridgeError::Forbidden(reason) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone(), None)
            }
            BridgeError::Configuration(reason) => {
                tracing::error!(
                    target: "bridge.config",
                    reason = %reason,
                    "Configuration fault reached a request"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    "The service is misconfigured".to_string(),
                    None,
                )
            }
            BridgeError::Crypto(reason) => {
                tracing::error!(
                    target: "bridge.crypto",
                    reason = %reason,
                    "Cryptographic operation failed"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CRYPTO_ERROR",
                    "An internal cryptographic error occurred".to_string(),
                    None,
                )
            }
            BridgeError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if let Some(challenge) = challenge {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }

        response
    }
}
