//! Reconnecting WebSocket transport.
//!
//! [`ReconnectingSocket`] owns a worker thread that keeps a connection to a
//! single URL alive. Failed attempts are retried with exponential backoff,
//! outbound frames are queued while disconnected, and lifecycle changes are
//! published to open, message, close and error listeners.

pub(crate) mod backoff;
mod config;
mod drop_warner;
mod error;
mod events;
mod reconnecting;
mod shared;
mod transport;
mod worker;


pub use config::{
    DEFAULT_CONNECTION_TIMEOUT, DEFAULT_MAX_RECONNECTION_DELAY, DEFAULT_MIN_RECONNECTION_DELAY,
    DEFAULT_MIN_UPTIME, DEFAULT_RECONNECTION_DELAY_GROW_FACTOR, MaxRetries, ReconnectOptions,
    SocketConfig,
};
pub use error::SocketError;
pub use events::{
    CLOSE_ABNORMAL, CLOSE_NORMAL, CloseCallback, CloseEvent, ErrorCallback, ErrorEvent, EventKind,
    EventListener, ListenerId, MessageCallback, OpenCallback, ReadyState, TIMEOUT_MESSAGE,
};
pub(crate) use events::SocketEvent;
pub use reconnecting::{ReconnectingSocket, SocketSender};
pub use transport::{Channel, Incoming, TlsOptions, Transport, WebSocketTransport};
