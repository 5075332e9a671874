//! Public socket type exported by the crate.

use std::{fmt, sync::Arc, thread, time::Duration};

use crossbeam_channel::{Sender, TrySendError, bounded};
use parking_lot::Mutex;

use super::{
    config::{ReconnectOptions, SocketConfig},
    drop_warner::{DropCause, DropWarner},
    error::SocketError,
    events::{CloseEvent, ErrorEvent, EventKind, EventListener, ListenerId, ReadyState},
    shared::SocketShared,
    transport::{Transport, WebSocketTransport},
    worker::{SocketCommand, WorkerSeed, spawn_worker},
};

/// WebSocket that transparently reconnects with exponential backoff.
///
/// Construction does not touch the network. Listeners are registered first
/// and [`start`](Self::start) then hands the connection over to a worker
/// thread, so no event can fire before its listener exists.
pub struct ReconnectingSocket {
    url: String,
    options: ReconnectOptions,
    tx: Mutex<Option<Sender<SocketCommand>>>,
    seed: Mutex<Option<WorkerSeed>>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    shared: Arc<SocketShared>,
    warner: Arc<DropWarner>,
    shutdown_timeout: Duration,
}

impl ReconnectingSocket {
    /// Create a socket for `url` using the `tungstenite` transport.
    pub fn new(url: impl Into<String>, options: ReconnectOptions) -> Self {
        Self::with_transport(
            url,
            options,
            SocketConfig::default(),
            Arc::new(WebSocketTransport::new()),
        )
    }

    /// Create a socket that connects through a custom transport.
    pub fn with_transport(
        url: impl Into<String>,
        options: ReconnectOptions,
        config: SocketConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let url = url.into();
        let initial = if options.start_closed {
            ReadyState::Closed
        } else {
            ReadyState::Connecting
        };
        let shared = Arc::new(SocketShared::new(initial));
        let (tx, rx) = bounded(config.capacity);
        let warner = Arc::new(DropWarner::new(url.as_str(), config.warn_interval));
        let shutdown_timeout = config.shutdown_timeout;
        let seed = WorkerSeed {
            rx,
            transport,
            url: url.clone(),
            options: options.clone(),
            config,
            shared: Arc::clone(&shared),
            warner: Arc::clone(&warner),
        };
        Self {
            url,
            options,
            tx: Mutex::new(Some(tx)),
            seed: Mutex::new(Some(seed)),
            handle: Mutex::new(None),
            shared,
            warner,
            shutdown_timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Options the socket was constructed with.
    pub fn options(&self) -> &ReconnectOptions {
        &self.options
    }

    pub fn ready_state(&self) -> ReadyState {
        self.shared.ready_state()
    }

    /// Retries made since the last connection that stayed up.
    pub fn retry_count(&self) -> u32 {
        self.shared.retry_count()
    }

    /// Spawn the worker thread. Calling this more than once has no effect.
    pub fn start(&self) {
        let Some(seed) = self.seed.lock().take() else {
            return;
        };
        *self.handle.lock() = Some(spawn_worker(seed));
    }

    /// Return `true` once [`start`](Self::start) has been called.
    pub fn is_started(&self) -> bool {
        self.seed.lock().is_none()
    }

    pub fn add_event_listener(&self, listener: EventListener) -> ListenerId {
        self.shared.add_listener(listener)
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.shared.remove_listener(id)
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.shared.listener_count(kind)
    }

    pub fn on_open(&self, callback: impl Fn() + Send + Sync + 'static) -> ListenerId {
        self.add_event_listener(EventListener::Open(Arc::new(callback)))
    }

    pub fn on_message(&self, callback: impl Fn(&str) + Send + Sync + 'static) -> ListenerId {
        self.add_event_listener(EventListener::Message(Arc::new(callback)))
    }

    pub fn on_close(&self, callback: impl Fn(&CloseEvent) + Send + Sync + 'static) -> ListenerId {
        self.add_event_listener(EventListener::Close(Arc::new(callback)))
    }

    pub fn on_error(&self, callback: impl Fn(&ErrorEvent) + Send + Sync + 'static) -> ListenerId {
        self.add_event_listener(EventListener::Error(Arc::new(callback)))
    }

    /// Cloneable handle for sending text frames from other threads.
    pub fn sender(&self) -> SocketSender {
        SocketSender {
            tx: self.tx.lock().clone(),
            warner: Arc::clone(&self.warner),
        }
    }

    /// Send a text frame, queueing it while the connection is down.
    pub fn send(&self, text: impl Into<String>) -> Result<(), SocketError> {
        self.submit(SocketCommand::Send(text.into()))
    }

    /// Close the connection and stop reconnecting.
    pub fn close(&self, code: u16, reason: &str) -> Result<(), SocketError> {
        self.submit(SocketCommand::Close {
            code,
            reason: reason.to_owned(),
        })
    }

    /// Drop the current connection (if any) and reconnect immediately.
    pub fn reconnect(&self, code: u16, reason: &str) -> Result<(), SocketError> {
        self.submit(SocketCommand::Reconnect {
            code,
            reason: reason.to_owned(),
        })
    }

    /// Stop the worker thread and wait for it to exit.
    pub fn shutdown(&self) {
        self.request_shutdown();
        self.join_worker();
    }

    fn submit(&self, cmd: SocketCommand) -> Result<(), SocketError> {
        let Some(tx) = self.tx.lock().clone() else {
            return Err(SocketError::Closed);
        };
        enqueue_command(&tx, cmd, &self.warner)
    }

    fn request_shutdown(&self) {
        let Some(tx) = self.tx.lock().take() else {
            return;
        };
        if self.seed.lock().take().is_some() {
            // Never started: dropping the seed releases the receiver.
            return;
        }
        let (ack_tx, ack_rx) = bounded(1);
        if self.on_worker_thread() {
            let _ = tx.try_send(SocketCommand::Shutdown(ack_tx));
            return;
        }
        if tx
            .send_timeout(SocketCommand::Shutdown(ack_tx), self.shutdown_timeout)
            .is_err()
        {
            return;
        }
        let _ = ack_rx.recv_timeout(self.shutdown_timeout);
    }

    fn on_worker_thread(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| handle.thread().id() == thread::current().id())
    }

    fn join_worker(&self) {
        if self.on_worker_thread() {
            // Dropped from one of our own listeners; the loop exits on its own.
            return;
        }
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            log::warn!("ReconnectingSocket: worker thread panicked");
        }
    }
}

impl Drop for ReconnectingSocket {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ReconnectingSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectingSocket")
            .field("url", &self.url)
            .field("ready_state", &self.ready_state())
            .field("retry_count", &self.retry_count())
            .finish()
    }
}

/// Cloneable sending half of a [`ReconnectingSocket`].
#[derive(Clone, Debug)]
pub struct SocketSender {
    tx: Option<Sender<SocketCommand>>,
    warner: Arc<DropWarner>,
}

impl SocketSender {
    /// Send a text frame through the owning socket.
    pub fn send(&self, text: impl Into<String>) -> Result<(), SocketError> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(SocketError::Closed);
        };
        enqueue_command(tx, SocketCommand::Send(text.into()), &self.warner)
    }
}

fn enqueue_command(
    tx: &Sender<SocketCommand>,
    cmd: SocketCommand,
    warner: &DropWarner,
) -> Result<(), SocketError> {
    match tx.try_send(cmd) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => {
            warner.record(DropCause::CommandBacklog);
            Err(SocketError::QueueFull)
        }
        Err(TrySendError::Disconnected(_)) => Err(SocketError::Closed),
    }
}

