//! Liveness probe.

/// Returns `OK` while the process is serving. Checks no dependencies; the
/// bridge has none at request time.
pub async fn health_check() -> &'static str {
    "OK"
}
