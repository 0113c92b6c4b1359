//! Bearer token middleware.
//!
//! Extracts the bearer token from the Authorization header, validates it
//! against the issuance policy, and injects the resulting
//! [`ReconstitutedIdentity`](crate::identity::ReconstitutedIdentity) into
//! request extensions.

use crate::errors::BridgeError;
use crate::services::token_validator::TokenValidator;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the bearer middleware.
#[derive(Clone)]
pub struct BearerState {
    pub validator: Arc<TokenValidator>,
}

/// Extract the bearer token from the Authorization header.
///
/// The scheme is matched case-insensitively.
fn extract_bearer_token(req: &Request) -> Result<&str, BridgeError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "bridge.middleware.auth", "Missing Authorization header");
            BridgeError::MissingToken
        })?;

    let (scheme, token) = auth_header.split_once(' ').ok_or_else(|| {
        tracing::debug!(target: "bridge.middleware.auth", "Invalid Authorization header format");
        BridgeError::MissingToken
    })?;

    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        tracing::debug!(
            target: "bridge.middleware.auth",
            "Authorization header is not a bearer token"
        );
        return Err(BridgeError::MissingToken);
    }

    Ok(token)
}

/// Require a valid negotiated token.
///
/// # Response
///
/// - Returns 401 if the token is missing or invalid
/// - Returns 403 if a post-validation hook rejects the identity
/// - Continues with the `ReconstitutedIdentity` in extensions otherwise
#[instrument(skip_all, name = "bridge.middleware.auth")]
pub async fn require_bearer(
    State(state): State<Arc<BearerState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, BridgeError> {
    let token = extract_bearer_token(&req)?;

    let identity = state
        .validator
        .validate(token, chrono::Utc::now().timestamp())?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
