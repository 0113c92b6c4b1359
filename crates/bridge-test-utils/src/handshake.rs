//! Header-driven handshake authenticator for tests.
//!
//! Any request carrying [`TEST_HANDSHAKE_HEADER`] is treated as having
//! completed the handshake as that principal. Calls are counted, and their
//! protocol versions kept, so tests can assert that bearer requests never
//! reach the handshake and that handshakes arrive over HTTP/1.1.

use async_trait::async_trait;
use axum::http::request::Parts;
use axum::http::Version;
use bridge_service::errors::BridgeError;
use bridge_service::handshake::HandshakeAuthenticator;
use bridge_service::identity::Principal;
use common::claims::{kinds, Claim, ClaimSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Header naming the principal, e.g. `CORP\alice`.
pub const TEST_HANDSHAKE_HEADER: &str = "x-test-handshake";

/// Optional comma-separated group list.
pub const TEST_GROUPS_HEADER: &str = "x-test-groups";

#[derive(Debug, Default)]
pub struct TestHandshake {
    calls: AtomicUsize,
    versions: Mutex<Vec<Version>>,
}

impl TestHandshake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the authenticator was consulted.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Protocol version of every request the authenticator saw, in order.
    pub fn versions(&self) -> Vec<Version> {
        self.versions
            .lock()
            .map(|versions| versions.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HandshakeAuthenticator for TestHandshake {
    async fn authenticate(&self, parts: &Parts) -> Result<Option<Principal>, BridgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut versions) = self.versions.lock() {
            versions.push(parts.version);
        }

        let Some(name) = parts
            .headers
            .get(TEST_HANDSHAKE_HEADER)
            .and_then(|value| value.to_str().ok())
        else {
            return Ok(None);
        };

        let mut claims = ClaimSet::new();
        claims.push(Claim::new(kinds::NAME, name));
        if let Some(groups) = parts
            .headers
            .get(TEST_GROUPS_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            claims.extend(
                groups
                    .split(',')
                    .filter(|group| !group.is_empty())
                    .map(|group| Claim::new(kinds::GROUP, group)),
            );
        }

        Ok(Some(Principal::new(name, "Negotiate", claims)))
    }
}
