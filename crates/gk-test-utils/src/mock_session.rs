//! Session and message handler doubles
//!
//! `RecordingSession` keeps every frame the gatekeeper queues on it;
//! `RecordingHandler` keeps every message the gatekeeper forwards.

use async_trait::async_trait;
use common::types::{ConnectionId, TenantId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use ws_gatekeeper::errors::TransportError;
use ws_gatekeeper::session::{InboundMessage, MessageHandler, Outbound, SessionHandle, SharedSession};

/// Session that records outbound frames.
#[derive(Debug)]
pub struct RecordingSession {
    id: ConnectionId,
    fail_pings: AtomicBool,
    stalled: AtomicBool,
    terminated: AtomicBool,
    frames: Mutex<Vec<Outbound>>,
}

impl RecordingSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(),
            fail_pings: AtomicBool::new(false),
            stalled: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            frames: Mutex::new(Vec::new()),
        })
    }

    /// Make every subsequent ping fail as if the socket were gone.
    pub fn fail_pings(&self) {
        self.fail_pings.store(true, Ordering::SeqCst);
    }

    /// Make every subsequent send fail as if the peer stopped reading.
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    /// Whether the transport was dropped without a close handshake.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// This session as the registry stores it.
    pub fn shared(self: &Arc<Self>) -> SharedSession {
        Arc::clone(self) as SharedSession
    }

    /// Every frame queued so far.
    pub fn frames(&self) -> Vec<Outbound> {
        self.frames.lock().unwrap().clone()
    }

    pub fn ping_count(&self) -> usize {
        self.frames()
            .iter()
            .filter(|f| matches!(f, Outbound::Ping(_)))
            .count()
    }

    /// `(code, reason)` of the first close frame, if any.
    pub fn close_frame(&self) -> Option<(u16, String)> {
        self.frames().into_iter().find_map(|f| match f {
            Outbound::Close { code, reason } => Some((code, reason)),
            _ => None,
        })
    }
}

impl SessionHandle for RecordingSession {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, frame: Outbound) -> Result<(), TransportError> {
        if self.stalled.load(Ordering::SeqCst) {
            return Err(TransportError::QueueFull);
        }
        if matches!(frame, Outbound::Ping(_)) && self.fail_pings.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected("broken pipe".to_string()));
        }
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }

    fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }
}

/// Message handler that records what it is given.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    received: Mutex<Vec<(ConnectionId, TenantId, InboundMessage)>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn received(&self) -> Vec<(ConnectionId, TenantId, InboundMessage)> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageHandler for RecordingHandler {
    async fn on_message(&self, id: ConnectionId, tenant: &TenantId, message: InboundMessage) {
        self.received
            .lock()
            .unwrap()
            .push((id, tenant.clone(), message));
    }
}
