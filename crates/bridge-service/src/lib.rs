//! Negotiated Token Bridge Service Library
//!
//! Turns a completed Negotiate handshake into a signed bearer token, and
//! validates that token on later requests so they never repeat the
//! handshake.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `crypto` - Token signing and verification
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `handshake` - Handshake authentication capability
//! - `identity` - Principal and reconstituted identity types
//! - `middleware` - Handshake and bearer middleware
//! - `observability` - Metrics and log correlation
//! - `policy` - Issuance policy
//! - `routes` - Router and token endpoint registration
//! - `services` - Claim translation, issuance and validation

pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod handshake;
pub mod identity;
pub mod middleware;
pub mod observability;
pub mod policy;
pub mod routes;
pub mod services;
