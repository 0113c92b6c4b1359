//! Token endpoint handler.
//!
//! Only reachable behind `require_handshake`, so a `Principal` is always in
//! the request extensions.

use crate::errors::BridgeError;
use crate::identity::Principal;
use crate::services::token_issuer::TokenIssuer;
use axum::{
    extract::State,
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::IntoResponse,
    Extension,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET `<TOKEN_PATH>`.
///
/// Issues a compact token for the handshake principal at the current wall
/// clock time.
///
/// # Response
///
/// - 200 with the compact token as a `text/plain` body
/// - 500 if issuance fails
#[instrument(skip_all, name = "bridge.token.endpoint")]
pub async fn issue_token(
    State(issuer): State<Arc<TokenIssuer>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, BridgeError> {
    let token = issuer.issue(&principal, chrono::Utc::now().timestamp())?;

    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (CACHE_CONTROL, "no-store"),
        ],
        token,
    ))
}
