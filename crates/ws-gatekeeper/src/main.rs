//! WebSocket Gatekeeper
//!
//! Entry point: loads configuration, fetches the realm signing key, and
//! serves the WebSocket route until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ws_gatekeeper::auth::{KeyProvider, TokenVerifier};
use ws_gatekeeper::config::Config;
use ws_gatekeeper::gatekeeper::Gatekeeper;
use ws_gatekeeper::registry::ConnectionRegistry;
use ws_gatekeeper::routes::{self, init_metrics_recorder, AppState};
use ws_gatekeeper::session::LoggingMessageHandler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting WebSocket Gatekeeper");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        ws_path = %config.ws_path,
        jwks_url = %config.jwks_url,
        tenant_claim = %config.tenant_claim,
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        heartbeat_interval_seconds = config.heartbeat_interval_seconds,
        allow_query_token = config.allow_query_token,
        "Configuration loaded successfully"
    );

    // Initialize metrics recorder before anything records
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Fetch the realm key up front; a gatekeeper that cannot verify tokens
    // must not start
    let keys = Arc::new(KeyProvider::new(config.jwks_url.clone()));
    keys.ensure_key().await.map_err(|e| {
        error!("Failed to fetch realm signing key: {}", e);
        e
    })?;

    let verifier = Arc::new(
        TokenVerifier::new(
            Arc::clone(&keys),
            config.tenant_claim.clone(),
            config.jwt_clock_skew_seconds,
        )
        .with_audience(config.jwt_audience.clone()),
    );

    let cancel_token = CancellationToken::new();
    let gatekeeper = Arc::new(Gatekeeper::new(
        verifier,
        Arc::new(ConnectionRegistry::new()),
        Arc::new(LoggingMessageHandler),
        config.heartbeat_interval(),
        &cancel_token,
    ));

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState {
        config,
        gatekeeper: Arc::clone(&gatekeeper),
    });
    let app = routes::build_routes(state, metrics_handle);

    info!("WebSocket Gatekeeper listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown_token = cancel_token.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        shutdown_token.cancel();
    })
    .await?;

    gatekeeper.shutdown().await;

    info!("WebSocket Gatekeeper shutdown complete");

    Ok(())
}

/// Initialize tracing; `GK_LOG_FORMAT=json` switches to JSON output.
fn init_tracing() {
    let json = std::env::var("GK_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let (json_layer, text_layer) = if json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ws_gatekeeper=debug,gk=debug,tower_http=debug".into()),
        )
        .with(json_layer)
        .with(text_layer)
        .init();
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    // Optional drain period before the listener stops accepting
    let drain_secs: u64 = std::env::var("GK_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (GK_DRAIN_SECONDS=0)");
    }
}
