//! Client-side bearer credential cache with single-flight refresh.
//!
//! A [`ClientTokenCache`] owns the current compact token for one client
//! configuration. Every outgoing request goes through
//! [`ClientTokenCache::attach_credential`], which refreshes the token from the
//! bridge token endpoint when there is none or it has expired, then sets the
//! `Authorization: Bearer` header.
//!
//! # Features
//!
//! - At most one refresh in flight per cache (async mutex + double-checked expiry)
//! - Credential published through `tokio::sync::watch`: readers never lock and
//!   never observe a half-written credential
//! - Refresh round-trip forced to HTTP/1.1, since the Negotiate handshake that
//!   guards the token endpoint does not run over HTTP/2
//! - Relative token endpoint paths resolved against the outgoing request URL
//! - Optional refresh timeout
//!
//! # Example
//!
//! ```rust,ignore
//! use common::token_cache::{ClientTokenCache, HttpTokenEndpoint};
//!
//! let client = reqwest::Client::new();
//! let endpoint = HttpTokenEndpoint::new(reqwest::Client::builder(), "/token")?;
//! let cache = ClientTokenCache::new(endpoint);
//!
//! let request = client.get("https://api.corp.example/orders").build()?;
//! let response = cache.execute(&client, request).await?;
//! ```
//!
//! # Security
//!
//! - The raw token is stored as `SecretString` and the header value is marked
//!   sensitive; neither appears in `Debug` output or logs
//! - The client never verifies the token signature: it reads `exp` only to
//!   decide when to refresh. The server remains the authority.

use crate::jwt;
use crate::secret::SecretString;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, instrument, warn};

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while obtaining or attaching a bearer credential.
///
/// Each variant keeps the underlying cause so that handshake failures can be
/// told apart from token or policy problems.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenCacheError {
    /// Transport failure talking to the token endpoint.
    #[error("Token endpoint request failed: {0}")]
    HttpError(String),

    /// Token endpoint answered with a non-success status (typically a failed
    /// handshake).
    #[error("Token endpoint rejected the request with status {status}")]
    Rejected { status: u16 },

    /// Token endpoint answered with something that is not a usable token.
    #[error("Token endpoint returned an invalid token: {0}")]
    InvalidToken(String),

    /// Token endpoint answered with a token that is already expired.
    #[error("Token endpoint returned a token that expired at {expires_at}")]
    AlreadyExpired { expires_at: i64 },

    /// Refresh did not complete within the configured timeout.
    #[error("Token refresh timed out after {0:?}")]
    Timeout(Duration),

    /// The outgoing request itself failed after the credential was attached.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Invalid cache or endpoint configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

// =============================================================================
// Cached Credential
// =============================================================================

/// A bearer credential ready to be attached to requests.
#[derive(Clone)]
pub struct CachedCredential {
    header: HeaderValue,
    expires_at: i64,
    raw_token: SecretString,
}

impl CachedCredential {
    /// Build a credential from a compact token returned by the token endpoint.
    ///
    /// # Errors
    ///
    /// `InvalidToken` if the token has no readable `exp` claim or contains
    /// characters that cannot appear in a header.
    pub fn from_token(token: &str) -> Result<Self, TokenCacheError> {
        let expires_at = jwt::extract_expiry(token)
            .map_err(|e| TokenCacheError::InvalidToken(e.to_string()))?;

        let mut header = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            TokenCacheError::InvalidToken("token is not a valid header value".to_string())
        })?;
        header.set_sensitive(true);

        Ok(Self {
            header,
            expires_at,
            raw_token: SecretString::from(token.to_string()),
        })
    }

    /// The `Authorization` header value (`Bearer <token>`).
    #[must_use]
    pub fn header(&self) -> &HeaderValue {
        &self.header
    }

    /// Expiry as Unix epoch seconds.
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// The compact token, for diagnostics.
    #[must_use]
    pub fn raw_token(&self) -> &SecretString {
        &self.raw_token
    }

    /// Expiry is exclusive: a credential is expired at `expires_at` itself.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for CachedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCredential")
            .field("header", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("raw_token", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Token Endpoint
// =============================================================================

/// Source of fresh compact tokens.
///
/// `target` is the URL of the request that triggered the refresh, so an
/// endpoint can reach the token path on the same server.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn fetch_token(&self, target: &Url) -> Result<String, TokenCacheError>;
}

/// Where the token endpoint lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLocation {
    /// Fixed URL.
    Absolute(Url),
    /// Path (or relative reference) resolved against each request URL.
    Relative(String),
}

impl TokenLocation {
    /// Parse an absolute URL, falling back to a relative reference.
    ///
    /// # Errors
    ///
    /// `Configuration` if the location is empty.
    pub fn parse(location: &str) -> Result<Self, TokenCacheError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(TokenCacheError::Configuration(
                "token endpoint location is empty".to_string(),
            ));
        }

        Ok(match Url::parse(location) {
            Ok(url) => Self::Absolute(url),
            Err(_) => Self::Relative(location.to_string()),
        })
    }

    /// Resolve against the URL of the outgoing request.
    ///
    /// # Errors
    ///
    /// `Configuration` if a relative reference cannot be joined to `target`.
    pub fn resolve(&self, target: &Url) -> Result<Url, TokenCacheError> {
        match self {
            Self::Absolute(url) => Ok(url.clone()),
            Self::Relative(reference) => target.join(reference).map_err(|e| {
                TokenCacheError::Configuration(format!(
                    "cannot resolve token endpoint '{reference}': {e}"
                ))
            }),
        }
    }
}

/// Token endpoint reached over HTTP with `reqwest`.
///
/// The endpoint owns a client built from the caller's builder, so it keeps
/// whatever the handshake needs (default headers, proxy, TLS roots) but is
/// restricted to HTTP/1.1. A per-request version alone does not downgrade a
/// client configured for HTTP/2 prior knowledge.
#[derive(Debug, Clone)]
pub struct HttpTokenEndpoint {
    client: reqwest::Client,
    location: TokenLocation,
}

impl HttpTokenEndpoint {
    /// Create an endpoint from a client builder and an absolute or relative
    /// location. The builder is forced to HTTP/1.1.
    ///
    /// # Errors
    ///
    /// `Configuration` if the location is empty or the client cannot be built.
    pub fn new(builder: reqwest::ClientBuilder, location: &str) -> Result<Self, TokenCacheError> {
        let location = TokenLocation::parse(location)?;
        let client = builder.http1_only().build().map_err(|e| {
            TokenCacheError::Configuration(format!("cannot build token endpoint client: {e}"))
        })?;
        Ok(Self { client, location })
    }

    #[must_use]
    pub fn location(&self) -> &TokenLocation {
        &self.location
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    #[instrument(skip_all)]
    async fn fetch_token(&self, target: &Url) -> Result<String, TokenCacheError> {
        let url = self.location.resolve(target)?;

        debug!(target: "common.token_cache", url = %url, "Requesting token from bridge endpoint");

        let response = self
            .client
            .get(url)
            .version(reqwest::Version::HTTP_11)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "common.token_cache", error = %e, "HTTP request failed");
                TokenCacheError::HttpError(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                target: "common.token_cache",
                status = %status,
                "Token endpoint rejected the request"
            );
            return Err(TokenCacheError::Rejected {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            debug!(target: "common.token_cache", error = %e, "Failed to read token response body");
            TokenCacheError::HttpError(e.to_string())
        })?;

        let token = body.trim();
        if token.is_empty() {
            return Err(TokenCacheError::InvalidToken(
                "empty response body".to_string(),
            ));
        }

        Ok(token.to_string())
    }
}

// =============================================================================
// Client Token Cache
// =============================================================================

/// Current credential as published to subscribers.
pub type CredentialReceiver = watch::Receiver<Option<Arc<CachedCredential>>>;

/// Owns the bearer credential for one client configuration.
///
/// Construct one per client and share it (for example behind an `Arc`) among
/// the tasks issuing requests through that client.
pub struct ClientTokenCache<E = HttpTokenEndpoint> {
    endpoint: E,
    current: watch::Sender<Option<Arc<CachedCredential>>>,
    refresh_lock: Mutex<()>,
    refresh_timeout: Option<Duration>,
}

impl<E: TokenEndpoint> ClientTokenCache<E> {
    /// Create an empty cache.
    #[must_use]
    pub fn new(endpoint: E) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            endpoint,
            current,
            refresh_lock: Mutex::new(()),
            refresh_timeout: None,
        }
    }

    /// Bound each refresh round-trip. Without this the cache relies on the
    /// endpoint's own transport timeouts.
    #[must_use]
    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    /// Snapshot of the current credential, expired or not.
    #[must_use]
    pub fn current(&self) -> Option<Arc<CachedCredential>> {
        self.current.borrow().clone()
    }

    /// Watch credential replacements.
    #[must_use]
    pub fn subscribe(&self) -> CredentialReceiver {
        self.current.subscribe()
    }

    /// True if no credential is cached or `now >= expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.valid_credential(now).is_none()
    }

    fn valid_credential(&self, now: i64) -> Option<Arc<CachedCredential>> {
        self.current
            .borrow()
            .as_ref()
            .filter(|credential| !credential.is_expired(now))
            .cloned()
    }

    /// Attach the bearer credential to `request`, refreshing first if needed.
    ///
    /// A caller-supplied `Authorization` header is never replaced.
    ///
    /// # Errors
    ///
    /// Any refresh failure. The request must not be sent in that case.
    pub async fn attach_credential(
        &self,
        request: &mut reqwest::Request,
        now: i64,
    ) -> Result<(), TokenCacheError> {
        let credential = match self.valid_credential(now) {
            Some(credential) => credential,
            None => self.refresh(request.url(), now).await?,
        };

        if !request.headers().contains_key(AUTHORIZATION) {
            request
                .headers_mut()
                .insert(AUTHORIZATION, credential.header().clone());
        }

        Ok(())
    }

    /// Fetch a new credential unless another caller already did.
    ///
    /// Only one refresh runs at a time per cache; callers queued behind it
    /// re-check expiry and reuse the result. On failure the cached credential
    /// is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - `HttpError` / `Rejected` - Token endpoint unreachable or refused
    /// - `InvalidToken` - Response is not a compact token with `exp`
    /// - `AlreadyExpired` - Token expired on arrival
    /// - `Timeout` - Refresh exceeded the configured timeout
    #[instrument(skip_all)]
    pub async fn refresh(
        &self,
        target: &Url,
        now: i64,
    ) -> Result<Arc<CachedCredential>, TokenCacheError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(credential) = self.valid_credential(now) {
            debug!(target: "common.token_cache", "Credential refreshed by another caller");
            return Ok(credential);
        }

        let token = match self.refresh_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.endpoint.fetch_token(target))
                .await
                .map_err(|_| {
                    warn!(
                        target: "common.token_cache",
                        timeout = ?timeout,
                        "Token refresh timed out"
                    );
                    TokenCacheError::Timeout(timeout)
                })??,
            None => self.endpoint.fetch_token(target).await?,
        };

        let credential = CachedCredential::from_token(&token)?;
        if credential.is_expired(now) {
            warn!(
                target: "common.token_cache",
                expires_at = credential.expires_at(),
                now = now,
                "Token endpoint returned an expired token"
            );
            return Err(TokenCacheError::AlreadyExpired {
                expires_at: credential.expires_at(),
            });
        }

        let credential = Arc::new(credential);
        self.current.send_replace(Some(Arc::clone(&credential)));

        debug!(
            target: "common.token_cache",
            expires_at = credential.expires_at(),
            "Credential refreshed"
        );

        Ok(credential)
    }

    /// Attach the credential using the wall clock and send the request.
    ///
    /// # Errors
    ///
    /// Refresh failures as in [`Self::refresh`]; `RequestFailed` if sending
    /// the request itself fails.
    pub async fn execute(
        &self,
        client: &reqwest::Client,
        mut request: reqwest::Request,
    ) -> Result<reqwest::Response, TokenCacheError> {
        self.attach_credential(&mut request, chrono::Utc::now().timestamp())
            .await?;

        client
            .execute(request)
            .await
            .map_err(|e| TokenCacheError::RequestFailed(e.to_string()))
    }
}

impl<E> std::fmt::Debug for ClientTokenCache<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientTokenCache")
            .field("current", &*self.current.borrow())
            .field("refresh_timeout", &self.refresh_timeout)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
