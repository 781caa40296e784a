//! Connection registry.
//!
//! Tracks live sessions in two disjoint sets, quarantined and connected,
//! plus the tenant of every connected session. A single lock guards all
//! three so every transition is atomic to observers: a session is in
//! exactly one set or in neither, and a connected session always has a
//! tenant.

use crate::observability::metrics;
use crate::session::SharedSession;
use common::types::{ConnectionId, TenantId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Where a session currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Membership {
    /// Handshake complete, no valid credential yet.
    Quarantined,
    /// Authenticated as the given tenant.
    Connected(TenantId),
}

#[derive(Default)]
struct RegistryState {
    quarantined: HashMap<ConnectionId, SharedSession>,
    connected: HashMap<ConnectionId, SharedSession>,
    tenants: HashMap<ConnectionId, TenantId>,
}

impl RegistryState {
    fn publish_counts(&self) {
        metrics::set_connections(self.quarantined.len(), self.connected.len());
    }
}

/// Registry of quarantined and connected sessions.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session to the quarantined set.
    ///
    /// Returns `false` (and changes nothing) if the id is already tracked.
    pub async fn admit_quarantined(&self, session: SharedSession) -> bool {
        let id = session.id();
        let mut state = self.state.write().await;
        if state.quarantined.contains_key(&id) || state.connected.contains_key(&id) {
            return false;
        }
        state.quarantined.insert(id, session);
        state.publish_counts();
        tracing::debug!(target: "gk.registry", connection_id = %id, "Session quarantined");
        true
    }

    /// Add a session directly to the connected set.
    ///
    /// A quarantined entry for the same id is replaced.
    pub async fn admit_connected(&self, session: SharedSession, tenant: TenantId) {
        let id = session.id();
        let mut state = self.state.write().await;
        state.quarantined.remove(&id);
        state.connected.insert(id, session);
        state.tenants.insert(id, tenant);
        state.publish_counts();
        tracing::debug!(target: "gk.registry", connection_id = %id, "Session connected");
    }

    /// Move a quarantined session to the connected set and record its tenant.
    ///
    /// Returns `false` if the session is not quarantined (never admitted,
    /// already connected, or removed).
    pub async fn promote(&self, id: ConnectionId, tenant: TenantId) -> bool {
        let mut state = self.state.write().await;
        let Some(session) = state.quarantined.remove(&id) else {
            return false;
        };
        state.connected.insert(id, session);
        state.tenants.insert(id, tenant);
        state.publish_counts();
        tracing::debug!(target: "gk.registry", connection_id = %id, "Session promoted");
        true
    }

    /// Forget a session entirely.
    ///
    /// Idempotent; returns whether anything was removed.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let mut state = self.state.write().await;
        let was_quarantined = state.quarantined.remove(&id).is_some();
        let was_connected = state.connected.remove(&id).is_some();
        state.tenants.remove(&id);

        let removed = was_quarantined || was_connected;
        if removed {
            state.publish_counts();
            tracing::debug!(target: "gk.registry", connection_id = %id, "Session removed");
        }
        removed
    }

    pub async fn is_quarantined(&self, id: ConnectionId) -> bool {
        self.state.read().await.quarantined.contains_key(&id)
    }

    pub async fn is_connected(&self, id: ConnectionId) -> bool {
        self.state.read().await.connected.contains_key(&id)
    }

    /// Tenant of a connected session.
    pub async fn tenant_of(&self, id: ConnectionId) -> Option<TenantId> {
        self.state.read().await.tenants.get(&id).cloned()
    }

    /// Membership and handle of a tracked session.
    pub async fn lookup(&self, id: ConnectionId) -> Option<(Membership, SharedSession)> {
        let state = self.state.read().await;
        if let Some(session) = state.quarantined.get(&id) {
            return Some((Membership::Quarantined, Arc::clone(session)));
        }
        let session = state.connected.get(&id)?;
        let tenant = state.tenants.get(&id)?.clone();
        Some((Membership::Connected(tenant), Arc::clone(session)))
    }

    /// Copy of the connected set.
    pub async fn connected_snapshot(&self) -> Vec<SharedSession> {
        self.state
            .read()
            .await
            .connected
            .values()
            .map(Arc::clone)
            .collect()
    }

    /// `(quarantined, connected)` set sizes.
    pub async fn counts(&self) -> (usize, usize) {
        let state = self.state.read().await;
        (state.quarantined.len(), state.connected.len())
    }
}
