//! Gatekeeper error types.
//!
//! Every rejection ends in a WebSocket close with a policy reason string;
//! internal details (JWKS URLs, decode errors) are logged server-side and
//! never echoed to the peer.

use thiserror::Error;

/// Close code used for every policy rejection (normal closure).
pub const POLICY_CLOSE_CODE: u16 = 1000;

/// Close reason for failed token checks.
pub const REASON_UNAUTHORIZED: &str = "unauthorized";

/// Close reason for a quarantined peer sending anything but credentials.
pub const REASON_QUARANTINE_VIOLATION: &str = "quarantine violation";

/// Close reason for a connected peer whose ping could not be sent.
pub const REASON_HEARTBEAT_FAILURE: &str = "heartbeat failure";

/// Lower-cased fragments of I/O errors that mean the peer simply hung up.
const DISCONNECT_MARKERS: [&str; 8] = [
    "connection reset",
    "broken pipe",
    "unexpected eof",
    "end of stream",
    "connection closed",
    "already closed",
    "closed connection",
    "without closing handshake",
];

/// Failure retrieving the realm signing key.
///
/// Fatal to every verification attempt until a later fetch succeeds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyFetchError {
    /// The HTTP request could not be completed.
    #[error("JWKS request failed: {0}")]
    Request(String),

    /// The JWKS endpoint answered with a non-success status.
    #[error("JWKS endpoint returned HTTP {0}")]
    Status(u16),

    /// The body was not a JWKS document.
    #[error("JWKS response could not be parsed: {0}")]
    Parse(String),

    /// The key set contained no keys.
    #[error("JWKS key set is empty")]
    EmptyKeySet,

    /// The first key lacks RSA components or they do not decode.
    #[error("JWKS key is unusable: {0}")]
    InvalidKey(String),
}

/// Per-request token rejection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token absent, oversized or structurally invalid.
    #[error("Malformed token")]
    Malformed,

    /// Token expired or not yet valid.
    #[error("Token is not active")]
    Inactive,

    /// Signature does not verify against the realm key.
    #[error("Token signature is invalid")]
    BadSignature,

    /// Signature verified but claims were rejected by policy.
    #[error("Token rejected by policy: {0}")]
    PolicyRejected(String),
}

/// Outcome of a failed [`crate::auth::TokenVerifier::verify`] call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The token itself was rejected.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The realm key could not be obtained.
    #[error(transparent)]
    KeyFetch(#[from] KeyFetchError),
}

/// A quarantined peer sent something other than credentials.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// Text frame without the `Bearer ` prefix.
    #[error("Expected bearer credentials")]
    CredentialsRequired,

    /// Binary frames never carry credentials.
    #[error("Binary frame while quarantined")]
    BinaryWhileQuarantined,
}

/// I/O failure on an established session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Peer went away (end of stream, reset, broken pipe).
    #[error("Peer disconnected: {0}")]
    Disconnected(String),

    /// Any other I/O or protocol failure.
    #[error("Transport I/O error: {0}")]
    Io(String),

    /// The session's outbound queue is gone (writer already exited).
    #[error("Session channel closed")]
    ChannelClosed,

    /// The session's outbound queue is full: the peer is not reading.
    #[error("Session outbound queue full")]
    QueueFull,

    /// A frame could not be written within the write timeout.
    #[error("Write timed out")]
    WriteTimeout,
}

impl TransportError {
    /// Classify a transport error message.
    ///
    /// Messages that describe an ordinary hang-up become `Disconnected`,
    /// everything else `Io`.
    #[must_use]
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_ascii_lowercase();
        if DISCONNECT_MARKERS.iter().any(|m| lowered.contains(m)) {
            Self::Disconnected(message)
        } else {
            Self::Io(message)
        }
    }

    /// Whether this is an ordinary disconnect rather than a fault.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected(_) | Self::ChannelClosed)
    }
}

/// Gatekeeper error type.
///
/// Maps to the close reason sent to the peer:
/// - `Verify`: `unauthorized`
/// - `Protocol`: `quarantine violation`
/// - `Transport`: no close frame is sent (the session is already gone)
#[derive(Debug, Error)]
pub enum GatekeeperError {
    #[error("Verification failed: {0}")]
    Verify(#[from] VerifyError),

    #[error("Protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<AuthError> for GatekeeperError {
    fn from(err: AuthError) -> Self {
        GatekeeperError::Verify(VerifyError::Auth(err))
    }
}

impl From<KeyFetchError> for GatekeeperError {
    fn from(err: KeyFetchError) -> Self {
        GatekeeperError::Verify(VerifyError::KeyFetch(err))
    }
}

impl GatekeeperError {
    /// Close reason string sent to the peer.
    pub fn close_reason(&self) -> &'static str {
        match self {
            GatekeeperError::Verify(_) => REASON_UNAUTHORIZED,
            GatekeeperError::Protocol(_) => REASON_QUARANTINE_VIOLATION,
            GatekeeperError::Transport(_) => "transport error",
        }
    }

    /// Bounded label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatekeeperError::Verify(VerifyError::Auth(AuthError::Malformed)) => "malformed",
            GatekeeperError::Verify(VerifyError::Auth(AuthError::Inactive)) => "inactive",
            GatekeeperError::Verify(VerifyError::Auth(AuthError::BadSignature)) => "bad_signature",
            GatekeeperError::Verify(VerifyError::Auth(AuthError::PolicyRejected(_))) => {
                "policy_rejected"
            }
            GatekeeperError::Verify(VerifyError::KeyFetch(_)) => "key_unavailable",
            GatekeeperError::Protocol(_) => "protocol_violation",
            GatekeeperError::Transport(_) => "transport",
        }
    }
}
