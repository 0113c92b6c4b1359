//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions over compact tokens. Payloads are decoded
//! without verification; pair these with a validator when the signature
//! matters.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::Value;

fn decode_segment(segment: &str) -> Value {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .unwrap_or_else(|e| panic!("Failed to base64 decode token segment: {e}"));
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("Failed to parse token segment JSON: {e}"))
}

fn segments(token: &str) -> Vec<&str> {
    let parts: Vec<_> = token.split('.').collect();
    assert_eq!(
        parts.len(),
        3,
        "Token must have 3 parts (header.payload.signature), got {}",
        parts.len()
    );
    parts
}

/// Custom assertions for compact tokens
///
/// # Example
/// ```rust,ignore
/// token
///     .assert_signed()
///     .assert_for_subject("alice@CORP")
///     .assert_expires_in(900);
/// ```
pub trait TokenAssertions {
    /// Assert the token has an HMAC signature
    fn assert_signed(&self) -> &Self;

    /// Assert the token is unsecured (`alg: none`, empty signature)
    fn assert_unsigned(&self) -> &Self;

    /// Assert the token's `sub`
    fn assert_for_subject(&self, subject: &str) -> &Self;

    /// Assert `exp - iat` equals `seconds`
    fn assert_expires_in(&self, seconds: i64) -> &Self;

    /// Assert the payload carries `claim` with `value` (string or array member)
    fn assert_has_claim(&self, claim: &str, value: &str) -> &Self;

    /// Assert the payload does not carry `claim`
    fn assert_lacks_claim(&self, claim: &str) -> &Self;
}

impl TokenAssertions for String {
    fn assert_signed(&self) -> &Self {
        let parts = segments(self);
        let header = decode_segment(parts[0]);
        let alg = header["alg"].as_str().unwrap_or_default();
        assert!(alg.starts_with("HS"), "Expected HMAC algorithm, got '{alg}'");
        assert!(!parts[2].is_empty(), "Signed token must have a signature");
        self
    }

    fn assert_unsigned(&self) -> &Self {
        let parts = segments(self);
        let header = decode_segment(parts[0]);
        assert_eq!(header["alg"], "none", "Expected unsecured token");
        assert!(parts[2].is_empty(), "Unsecured token must have an empty signature");
        self
    }

    fn assert_for_subject(&self, subject: &str) -> &Self {
        let payload = decode_segment(segments(self)[1]);
        assert_eq!(payload["sub"], subject, "Token subject mismatch");
        self
    }

    fn assert_expires_in(&self, seconds: i64) -> &Self {
        let payload = decode_segment(segments(self)[1]);
        let exp = payload["exp"].as_i64().expect("Token must have exp");
        let iat = payload["iat"].as_i64().expect("Token must have iat");
        assert_eq!(exp - iat, seconds, "Token lifetime mismatch");
        self
    }

    fn assert_has_claim(&self, claim: &str, value: &str) -> &Self {
        let payload = decode_segment(segments(self)[1]);
        let found = match &payload[claim] {
            Value::String(s) => s == value,
            Value::Array(items) => items.iter().any(|item| item == value),
            other => panic!("Token claim '{claim}' missing or not a string: {other}"),
        };
        assert!(found, "Token claim '{claim}' does not contain '{value}'");
        self
    }

    fn assert_lacks_claim(&self, claim: &str) -> &Self {
        let payload = decode_segment(segments(self)[1]);
        assert!(
            payload.get(claim).is_none(),
            "Token unexpectedly carries claim '{claim}'"
        );
        self
    }
}
