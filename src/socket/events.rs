//! Events emitted by a [`ReconnectingSocket`](super::ReconnectingSocket).

use std::{fmt, sync::Arc};

use serde::Serialize;

/// Lifecycle state of the underlying connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Message attached to error events raised by connection timeouts.
pub const TIMEOUT_MESSAGE: &str = "TIMEOUT";

/// Transport-level failure reported to error listeners.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub url: String,
    pub message: String,
    pub retry_count: u32,
}

impl ErrorEvent {
    pub fn new(url: impl Into<String>, message: impl Into<String>, retry_count: u32) -> Self {
        Self {
            kind: "error",
            url: url.into(),
            message: message.into(),
            retry_count,
        }
    }

    /// Return `true` when the event reports a connection timeout.
    pub fn is_timeout(&self) -> bool {
        self.message == TIMEOUT_MESSAGE
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.url)
    }
}

/// Close code sent for a normal shutdown.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code reported when the connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Details of a closed connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseEvent {
    pub code: u16,
    pub reason: String,
    pub was_clean: bool,
}

impl CloseEvent {
    pub fn new(code: u16, reason: impl Into<String>, was_clean: bool) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean,
        }
    }

    pub(crate) fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(CLOSE_ABNORMAL, reason, false)
    }
}

/// Identifies a registered listener so it can be removed later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Kind of event a listener subscribes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Open,
    Message,
    Close,
    Error,
}

pub type OpenCallback = Arc<dyn Fn() + Send + Sync>;
pub type MessageCallback = Arc<dyn Fn(&str) + Send + Sync>;
pub type CloseCallback = Arc<dyn Fn(&CloseEvent) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&ErrorEvent) + Send + Sync>;

/// Callback registered with [`ReconnectingSocket::add_event_listener`](super::ReconnectingSocket::add_event_listener).
#[derive(Clone)]
pub enum EventListener {
    Open(OpenCallback),
    Message(MessageCallback),
    Close(CloseCallback),
    Error(ErrorCallback),
}

impl EventListener {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Open(_) => EventKind::Open,
            Self::Message(_) => EventKind::Message,
            Self::Close(_) => EventKind::Close,
            Self::Error(_) => EventKind::Error,
        }
    }
}

impl fmt::Debug for EventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventListener").field(&self.kind()).finish()
    }
}

/// Event delivered from the worker thread to listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SocketEvent {
    Open,
    Message(String),
    Close(CloseEvent),
    Error(ErrorEvent),
}

impl SocketEvent {
    pub(crate) fn kind(&self) -> EventKind {
        match self {
            Self::Open => EventKind::Open,
            Self::Message(_) => EventKind::Message,
            Self::Close(_) => EventKind::Close,
            Self::Error(_) => EventKind::Error,
        }
    }
}
