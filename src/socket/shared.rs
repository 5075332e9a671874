//! State shared between the socket handle and its worker thread.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use parking_lot::Mutex;

use super::events::{EventKind, EventListener, ListenerId, ReadyState, SocketEvent};

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, EventListener)>,
}

pub(crate) struct SocketShared {
    ready_state: AtomicU8,
    retry_count: AtomicU32,
    listeners: Mutex<Listeners>,
}

impl SocketShared {
    pub(crate) fn new(initial: ReadyState) -> Self {
        Self {
            ready_state: AtomicU8::new(initial as u8),
            retry_count: AtomicU32::new(0),
            listeners: Mutex::new(Listeners::default()),
        }
    }

    pub(crate) fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.ready_state.load(Ordering::Acquire))
    }

    pub(crate) fn set_ready_state(&self, state: ReadyState) {
        self.ready_state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::Relaxed)
    }

    pub(crate) fn set_retry_count(&self, count: u32) {
        self.retry_count.store(count, Ordering::Relaxed);
    }

    pub(crate) fn add_listener(&self, listener: EventListener) -> ListenerId {
        let mut guard = self.listeners.lock();
        guard.next_id += 1;
        let id = ListenerId(guard.next_id);
        guard.entries.push((id, listener));
        id
    }

    pub(crate) fn remove_listener(&self, id: ListenerId) -> bool {
        let mut guard = self.listeners.lock();
        let before = guard.entries.len();
        guard.entries.retain(|(entry, _)| *entry != id);
        guard.entries.len() != before
    }

    pub(crate) fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .lock()
            .entries
            .iter()
            .filter(|(_, listener)| listener.kind() == kind)
            .count()
    }

    /// Invoke every listener registered for the event's kind.
    ///
    /// Callbacks run outside the lock so they may register or remove
    /// listeners themselves.
    pub(crate) fn emit(&self, event: &SocketEvent) {
        let kind = event.kind();
        let targets: Vec<EventListener> = self
            .listeners
            .lock()
            .entries
            .iter()
            .filter(|(_, listener)| listener.kind() == kind)
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in targets {
            match (listener, event) {
                (EventListener::Open(callback), SocketEvent::Open) => callback(),
                (EventListener::Message(callback), SocketEvent::Message(text)) => callback(text),
                (EventListener::Close(callback), SocketEvent::Close(close)) => callback(close),
                (EventListener::Error(callback), SocketEvent::Error(error)) => callback(error),
                _ => {}
            }
        }
    }
}
