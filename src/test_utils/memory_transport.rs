//! Scripted in-memory transport for exercising the socket worker.

use std::{collections::VecDeque, io, sync::Arc, time::Duration};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;

use crate::socket::{Channel, CloseEvent, Incoming, Transport};

/// Result handed out for a single connection attempt.
pub(crate) enum Outcome {
    Fail(io::ErrorKind),
    Open(MemoryChannel),
}

/// Transport that replays a fixed list of outcomes.
///
/// Attempts beyond the script fail with `ConnectionRefused`.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Outcome>>,
    urls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub(crate) fn new(outcomes: impl IntoIterator<Item = Outcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            urls: Mutex::new(Vec::new()),
        })
    }

    /// Script a transport whose first attempt opens; returns the remote peer.
    pub(crate) fn opening() -> (Arc<Self>, MemoryPeer) {
        let (channel, peer) = memory_pair();
        (Self::new([Outcome::Open(channel)]), peer)
    }

    /// URLs passed to `connect`, in order.
    pub(crate) fn connected_urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.urls.lock().len()
    }
}

impl Transport for ScriptedTransport {
    fn connect(&self, url: &str, _timeout: Duration) -> io::Result<Box<dyn Channel>> {
        self.urls.lock().push(url.to_owned());
        match self.outcomes.lock().pop_front() {
            Some(Outcome::Open(channel)) => Ok(Box::new(channel)),
            Some(Outcome::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
            None => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "no scripted outcome left",
            )),
        }
    }
}

/// Client side of an in-memory connection.
pub(crate) struct MemoryChannel {
    inbound: Receiver<Incoming>,
    outbound: Sender<String>,
    closed: Arc<Mutex<Option<CloseEvent>>>,
}

/// Server side of an in-memory connection.
pub(crate) struct MemoryPeer {
    to_client: Option<Sender<Incoming>>,
    from_client: Receiver<String>,
    closed: Arc<Mutex<Option<CloseEvent>>>,
}

pub(crate) fn memory_pair() -> (MemoryChannel, MemoryPeer) {
    let (to_client, inbound) = unbounded();
    let (outbound, from_client) = unbounded();
    let closed = Arc::new(Mutex::new(None));
    (
        MemoryChannel {
            inbound,
            outbound,
            closed: Arc::clone(&closed),
        },
        MemoryPeer {
            to_client: Some(to_client),
            from_client,
            closed,
        },
    )
}

impl Channel for MemoryChannel {
    fn send_text(&mut self, text: &str) -> io::Result<()> {
        self.outbound
            .send(text.to_owned())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
    }

    fn poll(&mut self, wait: Duration) -> io::Result<Option<Incoming>> {
        match self.inbound.recv_timeout(wait) {
            Ok(incoming) => Ok(Some(incoming)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )),
        }
    }

    fn close(&mut self, code: u16, reason: &str) -> io::Result<()> {
        *self.closed.lock() = Some(CloseEvent::new(code, reason, true));
        Ok(())
    }
}

impl MemoryPeer {
    pub(crate) fn push_text(&self, text: &str) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(Incoming::Text(text.to_owned()));
        }
    }

    pub(crate) fn close_remote(&self, code: u16, reason: &str) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(Incoming::Closed(CloseEvent::new(code, reason, true)));
        }
    }

    /// Drop the connection without a close frame.
    pub(crate) fn reset(&mut self) {
        self.to_client = None;
    }

    pub(crate) fn recv(&self, timeout: Duration) -> Option<String> {
        self.from_client.recv_timeout(timeout).ok()
    }

    /// Close frame sent by the client, if any.
    pub(crate) fn client_close(&self) -> Option<CloseEvent> {
        self.closed.lock().clone()
    }
}
