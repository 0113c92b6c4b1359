//! # Bridge Test Utilities
//!
//! Shared test utilities for the token bridge.
//!
//! This crate provides:
//! - Deterministic key and policy fixtures
//! - A principal builder
//! - A header-driven handshake authenticator (`TestHandshake`)
//! - Server test harness (`TestBridgeServer` for E2E tests)
//! - Custom assertions (`TokenAssertions` trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bridge_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestBridgeServer::spawn(test_policy()).await?;
//!
//!     let token = reqwest::Client::new()
//!         .get(server.token_url())
//!         .header(TEST_HANDSHAKE_HEADER, "CORP\\alice")
//!         .send()
//!         .await?
//!         .text()
//!         .await?;
//!
//!     token.assert_signed().assert_for_subject("alice@CORP");
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod handshake;
pub mod server_harness;

// Re-export commonly used items
pub use assertions::TokenAssertions;
pub use fixtures::{test_policy, test_signing_key, unsigned_policy, PrincipalBuilder, TEST_ISSUER};
pub use handshake::{TestHandshake, TEST_GROUPS_HEADER, TEST_HANDSHAKE_HEADER};
pub use server_harness::TestBridgeServer;
