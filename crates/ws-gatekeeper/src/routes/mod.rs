//! HTTP routes for the gatekeeper.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::gatekeeper::Gatekeeper;
use crate::handlers;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use crate::observability::metrics::init_metrics_recorder;

/// Application state shared across all handlers.
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Admission state machine shared by every socket.
    pub gatekeeper: Arc<Gatekeeper>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness check
/// - `/metrics` - Prometheus metrics endpoint
/// - `config.ws_path` - WebSocket upgrade
/// - TraceLayer for request logging
/// - 30 second timeout on the HTTP part of each request (the upgraded
///   socket is not affected)
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let ws_path = state.config.ws_path.clone();

    let app_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route(&ws_path, get(handlers::ws_handler))
        .with_state(state);

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    app_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<Config>();
    }

    #[test]
    fn test_app_state_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppState>();
    }
}
