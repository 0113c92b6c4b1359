//! Request middleware for the token bridge.
//!
//! - `require_handshake` guards the token endpoint and handshake-only routes
//! - `require_bearer` guards routes that accept a negotiated token

pub mod auth;
pub mod handshake;

pub use auth::{require_bearer, BearerState};
pub use handshake::{require_handshake, HandshakeState};
