//! HTTP routes for the token bridge.
//!
//! Defines the Axum router, the token endpoint registration and the
//! application state.

use crate::errors::BridgeError;
use crate::handlers;
use crate::handshake::HandshakeAuthenticator;
use crate::middleware::{require_bearer, require_handshake, BearerState, HandshakeState};
use crate::services::token_issuer::TokenIssuer;
use crate::services::token_validator::TokenValidator;
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Paths owned by the fixed routes; the token endpoint may not reuse them.
pub const RESERVED_PATHS: [&str; 6] = [
    "/",
    "/unprotected",
    "/protected",
    "/protected_negotiate",
    "/health",
    "/metrics",
];

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<TokenIssuer>,
    pub validator: Arc<TokenValidator>,
    pub handshake: Arc<dyn HandshakeAuthenticator>,
    pub token_path: String,
}

/// Register the token endpoint at `path`.
///
/// The returned route always carries the handshake middleware, so the handler
/// only ever runs with a verified principal.
///
/// # Errors
///
/// `Configuration` if the issuer or handshake authenticator is missing, or the
/// path is not an absolute literal path.
pub fn map_token_endpoint(
    path: &str,
    issuer: Option<Arc<TokenIssuer>>,
    handshake: Option<Arc<dyn HandshakeAuthenticator>>,
) -> Result<Router, BridgeError> {
    let issuer = issuer.ok_or_else(|| {
        BridgeError::Configuration("token endpoint requires a token issuer".to_string())
    })?;
    let authenticator = handshake.ok_or_else(|| {
        BridgeError::Configuration(
            "token endpoint requires a handshake authenticator".to_string(),
        )
    })?;

    if !path.starts_with('/') || path.contains([':', '*', '{', '}']) {
        return Err(BridgeError::Configuration(format!(
            "token path must be an absolute literal path, got '{path}'"
        )));
    }

    tracing::debug!(target: "bridge.routes", path = %path, "Registering token endpoint");

    let handshake_state = Arc::new(HandshakeState { authenticator });

    Ok(Router::new()
        .route(path, get(handlers::issue_token))
        .route_layer(middleware::from_fn_with_state(
            handshake_state,
            require_handshake,
        ))
        .with_state(issuer))
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `<token_path>` - Token endpoint (handshake)
/// - `/` - Greeting
/// - `/unprotected` - Anonymous identity summary
/// - `/protected` - Identity summary (bearer)
/// - `/protected_negotiate` - Identity summary (handshake)
/// - `/health` - Liveness probe
/// - `/metrics` - Prometheus metrics
/// - TraceLayer for request logging
/// - 30 second request timeout
///
/// # Errors
///
/// `Configuration` if the token path is invalid or collides with a fixed
/// route.
pub fn build_routes(
    state: AppState,
    metrics_handle: PrometheusHandle,
) -> Result<Router, BridgeError> {
    if RESERVED_PATHS.contains(&state.token_path.as_str()) {
        return Err(BridgeError::Configuration(format!(
            "token path '{}' collides with a built-in route",
            state.token_path
        )));
    }

    let token_routes = map_token_endpoint(
        &state.token_path,
        Some(Arc::clone(&state.issuer)),
        Some(Arc::clone(&state.handshake)),
    )?;

    let public_routes = Router::new()
        .route("/", get(handlers::root))
        .route("/unprotected", get(handlers::unprotected_details))
        .route("/health", get(handlers::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Bearer routes never trigger the handshake
    let bearer_state = Arc::new(BearerState {
        validator: Arc::clone(&state.validator),
    });
    let bearer_routes = Router::new()
        .route("/protected", get(handlers::bearer_details))
        .route_layer(middleware::from_fn_with_state(bearer_state, require_bearer));

    let handshake_state = Arc::new(HandshakeState {
        authenticator: state.handshake,
    });
    let handshake_routes = Router::new()
        .route("/protected_negotiate", get(handlers::handshake_details))
        .route_layer(middleware::from_fn_with_state(
            handshake_state,
            require_handshake,
        ));

    Ok(public_routes
        .merge(metrics_routes)
        .merge(bearer_routes)
        .merge(handshake_routes)
        .merge(token_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30))))
}
