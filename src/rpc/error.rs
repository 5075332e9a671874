use thiserror::Error;

use crate::socket::SocketError;

use super::message::{MessageError, ResponseError};

/// Errors returned by proxy calls and message connections.
#[derive(Debug, Error)]
pub enum RpcError {
    /// No response arrived before the call timeout elapsed.
    #[error("request `{method}` timed out")]
    Timeout { method: String },
    /// The connection closed while the request was pending.
    #[error("connection has been disposed")]
    Disposed,
    /// No connection opened before the call timeout elapsed.
    #[error("no connection available for `{method}`")]
    NotConnected { method: String },
    #[error("remote error: {0}")]
    Remote(#[from] ResponseError),
    #[error("failed to (de)serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Socket(#[from] SocketError),
}
