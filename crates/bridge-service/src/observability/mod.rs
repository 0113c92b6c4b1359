//! Observability for the token bridge.
//!
//! All instrumentation uses `#[instrument(skip_all)]` and explicit safe field
//! allow-listing. Fields are categorized as:
//! - **SAFE**: Can be logged in plaintext (authentication type, error kind, expiry)
//! - **HASHED**: Must be SHA-256 hashed for correlation (principal names)
//! - **NEVER**: Must never appear in logs (tokens, signing keys)

pub mod metrics;

pub use metrics::{
    init_metrics_recorder, record_handshake, record_token_issuance, record_token_validation,
};

use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars).
///
/// Used for principal names, which need correlation across the handshake,
/// issuance and validation log lines but should not be logged in plaintext.
///
/// # Privacy
///
/// This is a one-way hash for correlation only, not a secret-protection
/// mechanism. Truncation to 8 chars limits reversibility.
#[must_use]
pub fn hash_for_correlation(value: &str) -> String {
    let result = Sha256::digest(value.as_bytes());
    hex::encode(result.get(..4).unwrap_or_default())
}
