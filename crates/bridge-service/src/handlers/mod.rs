//! HTTP request handlers for the token bridge.

pub mod details;
pub mod health;
pub mod metrics;
pub mod token_handler;

pub use details::{bearer_details, handshake_details, root, unprotected_details};
pub use health::health_check;
pub use metrics::metrics_handler;
pub use token_handler::issue_token;
