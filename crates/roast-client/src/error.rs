//! Client errors.

use roast_protocol::ProtocolError;
use smol_str::SmolStr;
use thiserror::Error;

/// Errors surfaced by the session, transport, and configuration layers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Building or decoding a protocol message failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// WebSocket connect, send, or read failure.
    #[error("transport error: {0}")]
    Transport(SmolStr),

    /// Invalid `roaster.toml` contents.
    #[error("invalid config: {0}")]
    InvalidConfig(SmolStr),

    /// The transport has not reported the connection open yet.
    #[error("session not open yet")]
    NotConnected,

    /// The connection closed; build a new session to continue.
    #[error("session closed")]
    SessionClosed,
}
