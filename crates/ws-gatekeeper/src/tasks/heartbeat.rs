//! Heartbeat background task.
//!
//! Pings every connected session on a fixed interval. A session whose ping
//! cannot be queued is closed with the heartbeat-failure reason, or
//! terminated outright when the close frame cannot be queued either (a peer
//! that stopped reading fills the queue). The registry entry is removed
//! later by the transport's close callback, never by this task.
//!
//! # Graceful Shutdown
//!
//! The task runs until its cancellation token fires. [`HeartbeatMonitor::stop`]
//! cancels the token and waits for the task, so no ping is sent after it
//! returns.

use crate::errors::{POLICY_CLOSE_CODE, REASON_HEARTBEAT_FAILURE};
use crate::observability::metrics;
use crate::registry::ConnectionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

/// Shortest accepted interval; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Ping every connected session once.
///
/// Returns the number of sessions whose ping failed (and which were asked
/// to close).
pub async fn ping_connected(registry: &ConnectionRegistry) -> usize {
    let mut failures = 0;

    for session in registry.connected_snapshot().await {
        if let Err(e) = session.ping() {
            failures += 1;
            metrics::record_heartbeat_failure();
            warn!(
                target: "gk.task.heartbeat",
                connection_id = %session.id(),
                error = %e,
                "Ping failed, closing session"
            );
            if let Err(e) = session.close(POLICY_CLOSE_CODE, REASON_HEARTBEAT_FAILURE) {
                tracing::debug!(
                    target: "gk.task.heartbeat",
                    connection_id = %session.id(),
                    error = %e,
                    "Close frame could not be queued, session terminated"
                );
            }
        }
    }

    failures
}

/// Run the heartbeat loop until `cancel_token` fires.
///
/// The immediate first tick is consumed, so the first ping goes out one
/// full interval after start.
pub async fn run_heartbeat(
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let failures = ping_connected(&registry).await;
                if failures > 0 {
                    warn!(
                        target: "gk.task.heartbeat",
                        failures,
                        "Heartbeat closed unresponsive sessions"
                    );
                }
            }
            _ = cancel_token.cancelled() => {
                info!(target: "gk.task.heartbeat", "Heartbeat task received shutdown signal, exiting");
                break;
            }
        }
    }
}

/// Owner of the running heartbeat task.
pub struct HeartbeatMonitor {
    cancel_token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatMonitor {
    /// Spawn the heartbeat task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        registry: Arc<ConnectionRegistry>,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> Self {
        info!(
            target: "gk.task.heartbeat",
            interval_seconds = interval.as_secs_f64(),
            "Starting heartbeat task"
        );

        let handle = tokio::spawn(
            run_heartbeat(registry, interval, cancel_token.clone())
                .instrument(tracing::info_span!("gk.task.heartbeat")),
        );

        Self {
            cancel_token,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Cancel the task and wait for it to exit. Idempotent.
    pub async fn stop(&self) {
        self.cancel_token.cancel();

        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(target: "gk.task.heartbeat", error = %e, "Heartbeat task ended abnormally");
            }
            info!(target: "gk.task.heartbeat", "Heartbeat task stopped");
        }
    }

    /// Whether `stop` has been requested.
    pub fn is_stopped(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}
