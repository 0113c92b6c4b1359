//! Negotiated Token Bridge
//!
//! Serves the token endpoint and the bearer-protected routes.

use bridge_service::config::Config;
use bridge_service::handshake::{HandshakeAuthenticator, TrustedProxyAuthenticator};
use bridge_service::observability::init_metrics_recorder;
use bridge_service::routes::{self, AppState};
use bridge_service::services::token_issuer::TokenIssuer;
use bridge_service::services::token_validator::TokenValidator;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bridge_service=debug,common=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting token bridge");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        token_path = %config.token_path,
        signing_algorithm = ?config.signing_algorithm,
        max_age_seconds = config.max_age.as_secs(),
        "Configuration loaded successfully"
    );

    // Initialize metrics recorder before anything records
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let policy = Arc::new(config.issuance_policy());
    let issuer = Arc::new(TokenIssuer::new(Arc::clone(&policy)));
    let validator = Arc::new(TokenValidator::new(policy));

    if config.trusted_proxies.is_empty() {
        warn!("HANDSHAKE_TRUSTED_PROXIES is empty: every handshake will be challenged");
    }
    let handshake: Arc<dyn HandshakeAuthenticator> = Arc::new(TrustedProxyAuthenticator::new(
        config.trusted_proxies.clone(),
        config.proxy_headers.clone(),
    ));

    let state = AppState {
        issuer,
        validator,
        handshake,
        token_path: config.token_path.clone(),
    };

    // Build application routes
    let app = routes::build_routes(state, metrics_handle).map_err(|e| {
        error!("Failed to build routes: {}", e);
        e
    })?;

    // Parse bind address
    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Token bridge listening on {}", addr);

    // Peer address is required by the trusted-proxy handshake
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(config.drain_seconds))
    .await?;

    info!("Token bridge shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is complete.
async fn shutdown_signal(drain_secs: u64) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (BRIDGE_DRAIN_SECONDS=0)");
    }
}
