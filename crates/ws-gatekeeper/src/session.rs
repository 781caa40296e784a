//! Session capabilities exposed to the gatekeeper.
//!
//! The transport owns the socket. The gatekeeper only sees a
//! [`SessionHandle`]: something with a [`ConnectionId`] that frames can be
//! queued on. Authenticated traffic is handed to a [`MessageHandler`].

use crate::errors::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use common::types::{ConnectionId, TenantId};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

/// Payload of every heartbeat ping.
pub const HEARTBEAT_PAYLOAD: [u8; 1] = [0x00];

/// Frame queued for delivery to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    /// Close handshake; nothing is sent after it.
    Close { code: u16, reason: String },
}

/// Application message from an authenticated peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Text(String),
    Binary(Bytes),
}

/// Handle to one live transport session.
///
/// `send` must not block: implementations queue the frame and report
/// failure if the session can no longer accept it. `terminate` must not
/// depend on that queue.
pub trait SessionHandle: Send + Sync {
    /// Registry key of this session.
    fn id(&self) -> ConnectionId;

    /// Queue a frame for delivery.
    fn send(&self, frame: Outbound) -> Result<(), TransportError>;

    /// Drop the transport without a close handshake.
    ///
    /// The transport then reports the end of the session through the usual
    /// close path. Idempotent.
    fn terminate(&self);

    /// Start the close handshake.
    ///
    /// If the close frame cannot be queued the session is terminated
    /// instead, so a peer that stopped reading is still disconnected. The
    /// queueing error is returned either way.
    fn close(&self, code: u16, reason: &str) -> Result<(), TransportError> {
        let result = self.send(Outbound::Close {
            code,
            reason: reason.to_string(),
        });
        if result.is_err() {
            self.terminate();
        }
        result
    }

    /// Send a heartbeat ping.
    fn ping(&self) -> Result<(), TransportError> {
        self.send(Outbound::Ping(Bytes::from_static(&HEARTBEAT_PAYLOAD)))
    }
}

/// Reference-counted session handle as stored in the registry.
pub type SharedSession = Arc<dyn SessionHandle>;

/// Receiver of authenticated application traffic.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, id: ConnectionId, tenant: &TenantId, message: InboundMessage);
}

/// Handler that only logs what it receives.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMessageHandler;

#[async_trait]
impl MessageHandler for LoggingMessageHandler {
    async fn on_message(&self, id: ConnectionId, tenant: &TenantId, message: InboundMessage) {
        match message {
            InboundMessage::Text(text) => tracing::debug!(
                target: "gk.gatekeeper",
                connection_id = %id,
                tenant = %tenant,
                len = text.len(),
                "Text message received"
            ),
            InboundMessage::Binary(data) => tracing::debug!(
                target: "gk.gatekeeper",
                connection_id = %id,
                tenant = %tenant,
                len = data.len(),
                "Binary message received"
            ),
        }
    }
}

/// Session backed by a bounded channel drained by the socket writer task.
///
/// `terminate` cancels a token the socket loop selects on, bypassing the
/// queue.
#[derive(Debug, Clone)]
pub struct ChannelSession {
    id: ConnectionId,
    tx: mpsc::Sender<Outbound>,
    terminate: CancellationToken,
}

impl ChannelSession {
    pub fn new(
        id: ConnectionId,
        tx: mpsc::Sender<Outbound>,
        terminate: CancellationToken,
    ) -> Self {
        Self { id, tx, terminate }
    }

    /// Whether `terminate` has been called.
    pub fn is_terminated(&self) -> bool {
        self.terminate.is_cancelled()
    }
}

impl SessionHandle for ChannelSession {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, frame: Outbound) -> Result<(), TransportError> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => {
                tracing::warn!(
                    target: "gk.transport",
                    connection_id = %self.id,
                    "Outbound queue full, peer is not reading"
                );
                TransportError::QueueFull
            }
            TrySendError::Closed(_) => {
                tracing::debug!(
                    target: "gk.transport",
                    connection_id = %self.id,
                    "Outbound frame dropped, writer has exited"
                );
                TransportError::ChannelClosed
            }
        })
    }

    fn terminate(&self) {
        if !self.terminate.is_cancelled() {
            tracing::debug!(target: "gk.transport", connection_id = %self.id, "Session terminated");
        }
        self.terminate.cancel();
    }
}
