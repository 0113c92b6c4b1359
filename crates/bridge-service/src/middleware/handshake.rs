//! Handshake middleware.
//!
//! Runs the configured [`HandshakeAuthenticator`] and either injects the
//! verified [`Principal`](crate::identity::Principal) into request extensions
//! or answers `401` with a `Negotiate` challenge.

use crate::errors::BridgeError;
use crate::handshake::HandshakeAuthenticator;
use crate::observability::{hash_for_correlation, record_handshake};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the handshake middleware.
#[derive(Clone)]
pub struct HandshakeState {
    pub authenticator: Arc<dyn HandshakeAuthenticator>,
}

/// Require a completed handshake.
///
/// # Response
///
/// - Returns 401 with `WWW-Authenticate: Negotiate` if no handshake identity is present
/// - Returns 500 if the authenticator fails
/// - Continues with the `Principal` in extensions otherwise
#[instrument(skip_all, name = "bridge.middleware.handshake")]
pub async fn require_handshake(
    State(state): State<Arc<HandshakeState>>,
    req: Request,
    next: Next,
) -> Result<impl IntoResponse, BridgeError> {
    let (mut parts, body) = req.into_parts();

    let principal = match state.authenticator.authenticate(&parts).await {
        Ok(Some(principal)) => principal,
        Ok(None) => {
            record_handshake("challenged");
            tracing::debug!(target: "bridge.middleware.handshake", "Handshake required");
            return Err(BridgeError::HandshakeRequired);
        }
        Err(e) => {
            record_handshake("error");
            tracing::error!(
                target: "bridge.middleware.handshake",
                error = %e,
                "Handshake authenticator failed"
            );
            return Err(e);
        }
    };

    record_handshake("success");
    tracing::debug!(
        target: "bridge.middleware.handshake",
        principal = %hash_for_correlation(principal.name()),
        authentication_type = %principal.authentication_type(),
        "Handshake identity accepted"
    );

    parts.extensions.insert(principal);
    Ok(next.run(Request::from_parts(parts, body)).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<HandshakeState>();
    }
}
