//! Common utilities and types shared by the token bridge service and its clients.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for compact token (JWT) parsing utilities and size limits
pub mod jwt;

/// Module for the claim model carried inside bridge tokens
pub mod claims;

/// Module for the client-side bearer credential cache with single-flight refresh
pub mod token_cache;
