//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used across the bridge for compact tokens
//! and signing key material.
//!
//! `SecretBox<T>` and `SecretString` implement `Debug` with redaction, so a
//! struct deriving `Debug` that holds a secret is safe to log via `{:?}` or
//! tracing. Secrets are zeroized when dropped.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretBox, SecretString};
//!
//! #[derive(Debug)]
//! struct SigningMaterial {
//!     key_id: String,
//!     key: SecretBox<Vec<u8>>,
//! }
//!
//! let material = SigningMaterial {
//!     key_id: "bridge-2024".to_string(),
//!     key: SecretBox::new(Box::new(vec![7u8; 32])),
//! };
//!
//! // Key bytes never appear in debug output
//! assert!(!format!("{material:?}").contains("7, 7"));
//!
//! // Access requires an explicit call
//! assert_eq!(material.key.expose_secret().len(), 32);
//!
//! let token = SecretString::from("eyJhbGciOiJub25lIn0.e30.");
//! assert!(token.expose_secret().starts_with("eyJ"));
//! ```
//!
//! Use `SecretString` for compact tokens (server responses, cached client
//! credentials) and `SecretBox<Vec<u8>>` for HMAC signing keys.

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};
