//! Test server harness for E2E testing
//!
//! Provides `TestBridgeServer` for spawning a real bridge on a random port.

use crate::handshake::TestHandshake;
use bridge_service::handshake::HandshakeAuthenticator;
use bridge_service::observability::init_metrics_recorder;
use bridge_service::policy::IssuancePolicy;
use bridge_service::routes::{self, AppState};
use bridge_service::services::token_issuer::TokenIssuer;
use bridge_service::services::token_validator::TokenValidator;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the token bridge in E2E tests
///
/// The handshake is performed by [`TestHandshake`], so requests authenticate
/// by sending [`crate::TEST_HANDSHAKE_HEADER`].
///
/// # Example
/// ```rust,ignore
/// let server = TestBridgeServer::spawn(test_policy()).await?;
/// let response = reqwest::get(format!("{}/health", server.url())).await?;
/// assert_eq!(response.status(), 200);
/// ```
pub struct TestBridgeServer {
    addr: SocketAddr,
    handshake: Arc<TestHandshake>,
    handle: JoinHandle<()>,
}

impl TestBridgeServer {
    /// Spawn a server with the default token path (`/token`).
    pub async fn spawn(policy: IssuancePolicy) -> Result<Self, anyhow::Error> {
        Self::spawn_with_path(policy, "/token").await
    }

    /// Spawn a server with a custom token path.
    ///
    /// The server binds to 127.0.0.1:0 and runs in the background until the
    /// harness is dropped with the test runtime.
    pub async fn spawn_with_path(
        policy: IssuancePolicy,
        token_path: &str,
    ) -> Result<Self, anyhow::Error> {
        let policy = Arc::new(policy);
        let handshake = Arc::new(TestHandshake::new());
        let authenticator: Arc<dyn HandshakeAuthenticator> = handshake.clone();

        let state = AppState {
            issuer: Arc::new(TokenIssuer::new(Arc::clone(&policy))),
            validator: Arc::new(TokenValidator::new(policy)),
            handshake: authenticator,
            token_path: token_path.to_string(),
        };

        // The global recorder can only be installed once per process; later
        // servers get a standalone recorder.
        let metrics_handle = match init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                use metrics_exporter_prometheus::PrometheusBuilder;
                PrometheusBuilder::new().build_recorder().handle()
            }
        };

        let app = routes::build_routes(state, metrics_handle)
            .map_err(|e| anyhow::anyhow!("Failed to build routes: {}", e))?;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            handshake,
            handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// URL of the default token endpoint
    pub fn token_url(&self) -> String {
        format!("{}/token", self.url())
    }

    /// Get the socket address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of handshake attempts the server has seen
    pub fn handshake_calls(&self) -> usize {
        self.handshake.calls()
    }

    /// Protocol versions of the handshake attempts, in arrival order
    pub fn handshake_versions(&self) -> Vec<axum::http::Version> {
        self.handshake.versions()
    }
}

impl Drop for TestBridgeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
