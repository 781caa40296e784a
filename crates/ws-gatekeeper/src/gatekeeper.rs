//! Admission state machine.
//!
//! Every session moves through
//!
//! ```text
//! Quarantined ──(valid Bearer message)──▶ Connected
//!      │                                      │
//!      └──(violation / bad token / close)──▶ Removed ◀──(close / error)
//! ```
//!
//! A session that presents a valid `Authorization` header at upgrade skips
//! quarantine. Removed is terminal. Policy rejections always end in a close
//! with code 1000 and a fixed reason string.

use crate::auth::TokenVerifier;
use crate::errors::{
    AuthError, GatekeeperError, ProtocolViolation, TransportError, POLICY_CLOSE_CODE,
};
use crate::observability::metrics;
use crate::registry::{ConnectionRegistry, Membership};
use crate::session::{InboundMessage, MessageHandler, SharedSession};
use crate::tasks::heartbeat::HeartbeatMonitor;
use bytes::Bytes;
use common::jwt::{strip_bearer_prefix, BEARER_PREFIX};
use common::secret::{ExposeSecret, SecretString};
use common::types::{ConnectionId, TenantId};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Credential presented at upgrade time.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Raw `Authorization` header value; must carry the `Bearer ` prefix.
    Header(SecretString),
    /// Bare JWT from the `token` query parameter.
    QueryToken(SecretString),
}

/// Result of a successful `on_connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Quarantined,
    Connected(TenantId),
}

/// Orchestrates verification, registry transitions and the heartbeat.
pub struct Gatekeeper {
    verifier: Arc<TokenVerifier>,
    registry: Arc<ConnectionRegistry>,
    handler: Arc<dyn MessageHandler>,
    heartbeat: HeartbeatMonitor,
}

impl Gatekeeper {
    /// Create a gatekeeper and start its heartbeat.
    ///
    /// The heartbeat runs on a child of `cancel_token`. Must be called from
    /// within a Tokio runtime.
    pub fn new(
        verifier: Arc<TokenVerifier>,
        registry: Arc<ConnectionRegistry>,
        handler: Arc<dyn MessageHandler>,
        heartbeat_interval: Duration,
        cancel_token: &CancellationToken,
    ) -> Self {
        let heartbeat = HeartbeatMonitor::start(
            Arc::clone(&registry),
            heartbeat_interval,
            cancel_token.child_token(),
        );

        Self {
            verifier,
            registry,
            handler,
            heartbeat,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn verifier(&self) -> &Arc<TokenVerifier> {
        &self.verifier
    }

    /// Handle a completed upgrade.
    ///
    /// Without a credential (no header, a blank header, or `Bearer ` with
    /// nothing after it) the session is quarantined. With one, it is
    /// verified: success connects the session directly, failure closes it
    /// without ever registering it.
    ///
    /// # Errors
    ///
    /// Returns the rejection after the close has been queued.
    #[instrument(skip_all, name = "gk.gatekeeper.connect", fields(connection_id = %session.id()))]
    pub async fn on_connect(
        &self,
        session: SharedSession,
        credential: Option<Credential>,
    ) -> Result<Admission, GatekeeperError> {
        let id = session.id();

        let token = match &credential {
            None => None,
            Some(Credential::Header(value)) => {
                let value = value.expose_secret();
                // A scheme with no token carries no credential
                if value.trim().is_empty() || value.trim() == BEARER_PREFIX.trim_end() {
                    None
                } else {
                    match strip_bearer_prefix(value) {
                        Some(token) => Some(token),
                        None => {
                            tracing::debug!(
                                target: "gk.gatekeeper",
                                connection_id = %id,
                                "Authorization header without Bearer scheme"
                            );
                            return Err(self
                                .reject(&session, AuthError::Malformed.into())
                                .await);
                        }
                    }
                }
            }
            Some(Credential::QueryToken(value)) => {
                Some(value.expose_secret().trim()).filter(|t| !t.is_empty())
            }
        };

        let Some(token) = token else {
            self.registry.admit_quarantined(Arc::clone(&session)).await;
            metrics::record_admission("quarantined");
            tracing::info!(target: "gk.gatekeeper", connection_id = %id, "Session quarantined pending credentials");
            return Ok(Admission::Quarantined);
        };

        match self.verifier.verify(token).await {
            Ok(tenant) => {
                self.registry
                    .admit_connected(Arc::clone(&session), tenant.clone())
                    .await;
                metrics::record_admission("connected");
                tracing::info!(
                    target: "gk.gatekeeper",
                    connection_id = %id,
                    tenant = %tenant,
                    "Session connected"
                );
                Ok(Admission::Connected(tenant))
            }
            Err(e) => Err(self.reject(&session, e.into()).await),
        }
    }

    /// Handle a text frame.
    ///
    /// A quarantined session must send `Bearer <jwt>`; anything else is a
    /// quarantine violation. Connected sessions are forwarded to the
    /// message handler. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns the rejection after the session has been removed and closed.
    pub async fn on_message(&self, id: ConnectionId, text: String) -> Result<(), GatekeeperError> {
        let Some((membership, session)) = self.registry.lookup(id).await else {
            tracing::debug!(target: "gk.gatekeeper", connection_id = %id, "Message for unknown session ignored");
            return Ok(());
        };

        match membership {
            Membership::Connected(tenant) => {
                self.handler
                    .on_message(id, &tenant, InboundMessage::Text(text))
                    .await;
                Ok(())
            }
            Membership::Quarantined => {
                let Some(token) = strip_bearer_prefix(&text) else {
                    return Err(self
                        .reject(&session, ProtocolViolation::CredentialsRequired.into())
                        .await);
                };

                let tenant = match self.verifier.verify(token).await {
                    Ok(tenant) => tenant,
                    Err(e) => return Err(self.reject(&session, e.into()).await),
                };

                if self.registry.promote(id, tenant.clone()).await {
                    metrics::record_admission("promoted");
                    tracing::info!(
                        target: "gk.gatekeeper",
                        connection_id = %id,
                        tenant = %tenant,
                        "Quarantined session authenticated"
                    );
                } else {
                    tracing::debug!(
                        target: "gk.gatekeeper",
                        connection_id = %id,
                        "Session left quarantine during verification"
                    );
                }
                Ok(())
            }
        }
    }

    /// Handle a binary frame.
    ///
    /// # Errors
    ///
    /// Binary frames from a quarantined session are a quarantine violation.
    pub async fn on_binary_message(
        &self,
        id: ConnectionId,
        data: Bytes,
    ) -> Result<(), GatekeeperError> {
        let Some((membership, session)) = self.registry.lookup(id).await else {
            tracing::debug!(target: "gk.gatekeeper", connection_id = %id, "Binary message for unknown session ignored");
            return Ok(());
        };

        match membership {
            Membership::Connected(tenant) => {
                self.handler
                    .on_message(id, &tenant, InboundMessage::Binary(data))
                    .await;
                Ok(())
            }
            Membership::Quarantined => Err(self
                .reject(&session, ProtocolViolation::BinaryWhileQuarantined.into())
                .await),
        }
    }

    /// Handle the end of a session.
    pub async fn on_close(&self, id: ConnectionId) {
        if self.registry.remove(id).await {
            tracing::info!(target: "gk.gatekeeper", connection_id = %id, "Session closed");
        }
    }

    /// Handle a transport failure. The session is always removed.
    pub async fn on_error(&self, id: ConnectionId, error: TransportError) {
        self.registry.remove(id).await;

        if error.is_disconnect() {
            tracing::debug!(target: "gk.gatekeeper", connection_id = %id, error = %error, "Peer disconnected");
        } else {
            tracing::error!(target: "gk.gatekeeper", connection_id = %id, error = %error, "Session transport error");
        }
    }

    /// Stop the heartbeat and wait for it to exit. Idempotent.
    pub async fn shutdown(&self) {
        self.heartbeat.stop().await;
    }

    /// Remove and close a session for a policy reason.
    async fn reject(&self, session: &SharedSession, error: GatekeeperError) -> GatekeeperError {
        let id = session.id();
        self.registry.remove(id).await;
        metrics::record_rejection(error.kind());

        tracing::info!(
            target: "gk.gatekeeper",
            connection_id = %id,
            kind = error.kind(),
            error = %error,
            "Session rejected"
        );

        if let Err(e) = session.close(POLICY_CLOSE_CODE, error.close_reason()) {
            tracing::debug!(
                target: "gk.gatekeeper",
                connection_id = %id,
                error = %e,
                "Close frame could not be queued, session terminated"
            );
        }

        error
    }
}
