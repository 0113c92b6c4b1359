//! Handshake authentication capability.
//!
//! The Negotiate exchange itself is performed outside this service. The
//! bridge only needs "given this request, who did the handshake verify?",
//! expressed by [`HandshakeAuthenticator`].
//!
//! The shipped implementation, [`TrustedProxyAuthenticator`], trusts a
//! fronting proxy on a known address that terminates Negotiate and forwards
//! the verified identity in headers. Identity headers arriving from any other
//! peer are ignored.

use crate::errors::BridgeError;
use crate::identity::Principal;
use async_trait::async_trait;
use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use axum::http::HeaderName;
use common::claims::{kinds, Claim, ClaimSet};
use std::net::{IpAddr, SocketAddr};

/// Authentication type recorded when the proxy does not state one.
pub const DEFAULT_HANDSHAKE_AUTH_TYPE: &str = "Negotiate";

/// Produces the verified principal for a request, if the handshake completed.
#[async_trait]
pub trait HandshakeAuthenticator: Send + Sync {
    /// `Ok(None)` means the handshake has not been performed; the caller
    /// answers with a `Negotiate` challenge.
    ///
    /// # Errors
    ///
    /// Infrastructure failures only. A missing or refused handshake is
    /// `Ok(None)`.
    async fn authenticate(&self, parts: &Parts) -> Result<Option<Principal>, BridgeError>;
}

/// Header names used by [`TrustedProxyAuthenticator`].
#[derive(Debug, Clone)]
pub struct ProxyHeaders {
    pub user: HeaderName,
    pub authentication_type: HeaderName,
    pub groups: HeaderName,
}

impl Default for ProxyHeaders {
    fn default() -> Self {
        Self {
            user: HeaderName::from_static("x-remote-user"),
            authentication_type: HeaderName::from_static("x-remote-auth-type"),
            groups: HeaderName::from_static("x-remote-groups"),
        }
    }
}

impl ProxyHeaders {
    /// Parse header names from configuration.
    ///
    /// # Errors
    ///
    /// `Configuration` if any name is not a valid header name.
    pub fn parse(
        user: &str,
        authentication_type: &str,
        groups: &str,
    ) -> Result<Self, BridgeError> {
        let parse = |value: &str| {
            HeaderName::from_bytes(value.trim().to_ascii_lowercase().as_bytes()).map_err(|e| {
                BridgeError::Configuration(format!("invalid handshake header name '{value}': {e}"))
            })
        };

        Ok(Self {
            user: parse(user)?,
            authentication_type: parse(authentication_type)?,
            groups: parse(groups)?,
        })
    }
}

/// Accepts identities asserted by a trusted fronting proxy.
///
/// The peer address is read from `ConnectInfo<SocketAddr>`, so the server
/// must be run with `into_make_service_with_connect_info::<SocketAddr>()`.
#[derive(Debug, Clone)]
pub struct TrustedProxyAuthenticator {
    trusted_proxies: Vec<IpAddr>,
    headers: ProxyHeaders,
}

impl TrustedProxyAuthenticator {
    #[must_use]
    pub fn new(trusted_proxies: Vec<IpAddr>, headers: ProxyHeaders) -> Self {
        Self {
            trusted_proxies,
            headers,
        }
    }

    fn is_trusted(&self, peer: IpAddr) -> bool {
        let peer = peer.to_canonical();
        self.trusted_proxies
            .iter()
            .any(|trusted| trusted.to_canonical() == peer)
    }

    fn header_str<'a>(parts: &'a Parts, name: &HeaderName) -> Option<&'a str> {
        parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[async_trait]
impl HandshakeAuthenticator for TrustedProxyAuthenticator {
    async fn authenticate(&self, parts: &Parts) -> Result<Option<Principal>, BridgeError> {
        let Some(user) = Self::header_str(parts, &self.headers.user) else {
            return Ok(None);
        };

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        match peer {
            Some(ip) if self.is_trusted(ip) => {}
            _ => {
                tracing::warn!(
                    target: "bridge.handshake",
                    peer = ?peer,
                    "Ignoring handshake identity asserted by an untrusted peer"
                );
                return Ok(None);
            }
        }

        let authentication_type = Self::header_str(parts, &self.headers.authentication_type)
            .unwrap_or(DEFAULT_HANDSHAKE_AUTH_TYPE);

        let mut claims = ClaimSet::new();
        claims.push(Claim::new(kinds::NAME, user));
        if let Some(groups) = Self::header_str(parts, &self.headers.groups) {
            claims.extend(
                groups
                    .split(',')
                    .map(str::trim)
                    .filter(|group| !group.is_empty())
                    .map(|group| Claim::new(kinds::GROUP, group)),
            );
        }

        Ok(Some(Principal::new(user, authentication_type, claims)))
    }
}
