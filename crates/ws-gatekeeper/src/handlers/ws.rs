//! WebSocket upgrade handler.
//!
//! Binds one socket to the gatekeeper: assigns a [`ConnectionId`], exposes
//! the socket as a [`ChannelSession`] and forwards every lifecycle event.
//! No admission policy lives here.

use crate::errors::TransportError;
use crate::gatekeeper::{Credential, Gatekeeper};
use crate::routes::AppState;
use crate::session::{ChannelSession, Outbound, SharedSession};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::Response;
use bytes::Bytes;
use common::secret::SecretString;
use common::types::ConnectionId;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Frames that may be queued for one session before sends start failing.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// Longest a single frame write may take before the peer is considered
/// stalled.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct UpgradeParams {
    /// Bare JWT, honoured only when query tokens are enabled.
    #[serde(default)]
    pub token: Option<String>,
}

/// Handler for GET on the WebSocket path.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UpgradeParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let credential = upgrade_credential(&headers, params, state.config.allow_query_token);
    let gatekeeper = Arc::clone(&state.gatekeeper);

    ws.on_upgrade(move |socket| handle_socket(socket, gatekeeper, credential))
}

/// Pick the credential for an upgrade request.
///
/// The `Authorization` header wins; the `token` query parameter is only
/// consulted when no header is present and `allow_query_token` is set.
pub fn upgrade_credential(
    headers: &HeaderMap,
    params: UpgradeParams,
    allow_query_token: bool,
) -> Option<Credential> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        // Non-visible-ASCII values can never carry the Bearer scheme; pass a
        // placeholder through so the gatekeeper rejects the session.
        let value = value.to_str().unwrap_or("\u{0}");
        return Some(Credential::Header(SecretString::from(value)));
    }

    if allow_query_token {
        return params
            .token
            .map(|token| Credential::QueryToken(SecretString::from(token)));
    }

    None
}

/// Drive one socket until it closes.
async fn handle_socket(
    socket: WebSocket,
    gatekeeper: Arc<Gatekeeper>,
    credential: Option<Credential>,
) {
    let (sink, stream) = socket.split();
    serve_session(sink, stream, gatekeeper, credential).await;
}

/// Run one session over the two halves of a socket.
///
/// Outbound frames go through a bounded queue drained by a writer task; each
/// write is bounded by [`WRITE_TIMEOUT`]. The session ends when the peer
/// closes, either half fails, or the gatekeeper terminates the session, and
/// the gatekeeper is then told through `on_close` / `on_error`.
pub async fn serve_session<Si, St>(
    mut sink: Si,
    mut stream: St,
    gatekeeper: Arc<Gatekeeper>,
    credential: Option<Credential>,
) where
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display + Send,
    St: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let id = ConnectionId::new();
    let (tx, mut rx) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE_CAPACITY);
    let terminated = CancellationToken::new();
    let session: SharedSession = Arc::new(ChannelSession::new(id, tx, terminated.clone()));

    tracing::debug!(target: "gk.transport", connection_id = %id, "WebSocket upgraded");

    // Writer task: drain the session queue into the socket
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let is_close = matches!(frame, Outbound::Close { .. });
            match tokio::time::timeout(WRITE_TIMEOUT, sink.send(to_ws_message(frame))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(TransportError::classify(e.to_string())),
                Err(_) => return Err(TransportError::WriteTimeout),
            }
            if is_close {
                break;
            }
        }
        Ok::<(), TransportError>(())
    });

    if let Err(e) = gatekeeper.on_connect(Arc::clone(&session), credential).await {
        tracing::debug!(target: "gk.transport", connection_id = %id, error = %e, "Upgrade rejected");
    }

    let outcome = tokio::select! {
        result = read_loop(&gatekeeper, id, &mut stream) => result,
        result = &mut writer => match result {
            Ok(result) => result,
            Err(e) => Err(TransportError::Io(e.to_string())),
        },
        () = terminated.cancelled() => {
            tracing::debug!(
                target: "gk.transport",
                connection_id = %id,
                "Dropping terminated session"
            );
            Ok(())
        }
    };
    writer.abort();

    match outcome {
        Ok(()) => gatekeeper.on_close(id).await,
        Err(e) => gatekeeper.on_error(id, e).await,
    }
}

/// Forward inbound frames until the peer closes or the stream fails.
async fn read_loop<St>(
    gatekeeper: &Gatekeeper,
    id: ConnectionId,
    stream: &mut St,
) -> Result<(), TransportError>
where
    St: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(message) = stream.next().await {
        let message = message.map_err(|e| TransportError::classify(e.to_string()))?;

        let result = match message {
            Message::Text(text) => gatekeeper.on_message(id, text).await,
            Message::Binary(data) => gatekeeper.on_binary_message(id, Bytes::from(data)).await,
            Message::Close(_) => break,
            // Pongs are answered by axum; no pong tracking
            Message::Ping(_) | Message::Pong(_) => Ok(()),
        };

        if let Err(e) = result {
            tracing::debug!(target: "gk.transport", connection_id = %id, error = %e, "Frame rejected");
        }
    }

    Ok(())
}

fn to_ws_message(frame: Outbound) -> Message {
    match frame {
        Outbound::Text(text) => Message::Text(text),
        Outbound::Binary(data) => Message::Binary(data.to_vec()),
        Outbound::Ping(data) => Message::Ping(data.to_vec()),
        Outbound::Close { code, reason } => Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })),
    }
}
