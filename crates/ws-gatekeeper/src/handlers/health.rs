//! Liveness check handler.

/// Liveness check handler.
///
/// Returns a simple "OK" response to indicate the process is running.
/// Does NOT check the realm JWKS endpoint: the key is fetched once at startup
/// and a gatekeeper that cannot reach the realm later still serves already
/// connected sessions.
pub async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check_returns_ok() {
        assert_eq!(health_check().await, "OK");
    }
}
