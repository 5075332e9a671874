//! Helpers for observing socket events from tests.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};

use crate::socket::{ReconnectingSocket, SocketEvent};

pub(crate) const EVENT_TIMEOUT: Duration = Duration::from_secs(3);

/// Forward every event emitted by `socket` into a channel.
pub(crate) fn record_events(socket: &ReconnectingSocket) -> Receiver<SocketEvent> {
    let (tx, rx) = unbounded();
    let open_tx = tx.clone();
    socket.on_open(move || {
        let _ = open_tx.send(SocketEvent::Open);
    });
    let message_tx = tx.clone();
    socket.on_message(move |text| {
        let _ = message_tx.send(SocketEvent::Message(text.to_owned()));
    });
    let close_tx = tx.clone();
    socket.on_close(move |event| {
        let _ = close_tx.send(SocketEvent::Close(event.clone()));
    });
    socket.on_error(move |event| {
        let _ = tx.send(SocketEvent::Error(event.clone()));
    });
    rx
}

/// Wait for the next event, failing the test after [`EVENT_TIMEOUT`].
pub(crate) fn next_event(rx: &Receiver<SocketEvent>) -> SocketEvent {
    rx.recv_timeout(EVENT_TIMEOUT).expect("socket event in time")
}

/// Poll `condition` until it holds or [`EVENT_TIMEOUT`] expires.
pub(crate) fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + EVENT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
