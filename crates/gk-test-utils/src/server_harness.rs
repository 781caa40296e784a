//! Test server harness for E2E testing
//!
//! Provides `TestGatekeeperServer` for spawning real gatekeeper instances in
//! tests.

use crate::mock_jwks::MockRealm;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use ws_gatekeeper::auth::TokenVerifier;
use ws_gatekeeper::config::Config;
use ws_gatekeeper::gatekeeper::Gatekeeper;
use ws_gatekeeper::registry::ConnectionRegistry;
use ws_gatekeeper::routes::{self, AppState};
use ws_gatekeeper::session::MessageHandler;

/// Test harness for spawning the gatekeeper in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_connect_e2e() -> Result<()> {
///     let realm = MockRealm::start("acme").await;
///     let server = TestGatekeeperServer::spawn(&realm, &[], RecordingHandler::new()).await?;
///
///     let (socket, _) = tokio_tungstenite::connect_async(server.ws_url()).await?;
///     Ok(())
/// }
/// ```
pub struct TestGatekeeperServer {
    addr: SocketAddr,
    config: Config,
    gatekeeper: Arc<Gatekeeper>,
    cancel_token: CancellationToken,
    _handle: JoinHandle<()>,
}

impl TestGatekeeperServer {
    /// Spawn a server verifying against `realm`.
    ///
    /// `vars` are extra configuration variables layered over the defaults
    /// (e.g. `("GK_ALLOW_QUERY_TOKEN", "true")`).
    pub async fn spawn(
        realm: &MockRealm,
        vars: &[(&str, &str)],
        handler: Arc<dyn MessageHandler>,
    ) -> Result<Self, anyhow::Error> {
        let mut env = HashMap::from([
            ("KEYCLOAK_HOST".to_string(), realm.host()),
            ("KEYCLOAK_REALM".to_string(), realm.realm().to_string()),
            ("GK_BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ]);
        for (name, value) in vars {
            env.insert((*name).to_string(), (*value).to_string());
        }

        let config = Config::from_vars(&env)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let verifier = TokenVerifier::new(
            realm.key_provider(),
            config.tenant_claim.clone(),
            config.jwt_clock_skew_seconds,
        )
        .with_audience(config.jwt_audience.clone());

        let cancel_token = CancellationToken::new();
        let gatekeeper = Arc::new(Gatekeeper::new(
            Arc::new(verifier),
            Arc::new(ConnectionRegistry::new()),
            handler,
            config.heartbeat_interval(),
            &cancel_token,
        ));

        // The global recorder can only be installed once per process
        let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();

        let state = Arc::new(AppState {
            config: config.clone(),
            gatekeeper: Arc::clone(&gatekeeper),
        });
        let app = routes::build_routes(state, metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind(&config.bind_address)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            gatekeeper,
            cancel_token,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// WebSocket URL of the upgrade route.
    pub fn ws_url(&self) -> String {
        format!("ws://{}{}", self.addr, self.config.ws_path)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gatekeeper(&self) -> &Arc<Gatekeeper> {
        &self.gatekeeper
    }
}

impl Drop for TestGatekeeperServer {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        self._handle.abort();
    }
}
