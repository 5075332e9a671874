//! Message connection multiplexing requests over a socket.
//!
//! A [`MessageConnection`] is created for every opened socket connection.
//! Outbound requests are correlated with responses by numeric id; inbound
//! requests, notifications and scheduled tasks run on a dedicated thread so
//! that handlers may issue their own requests without blocking the socket
//! worker.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use parking_lot::Mutex;
use serde_json::Value;

use crate::socket::{SocketError, SocketSender};

use super::{
    error::RpcError,
    logger::Logger,
    message::{Message, RequestId, ResponseError},
};

pub type RequestHandler = Arc<dyn Fn(&str, Value) -> Result<Value, ResponseError> + Send + Sync>;
pub type NotificationHandler = Arc<dyn Fn(&str, Value) + Send + Sync>;

type Reply = Result<Value, ResponseError>;
type DisposeCallback = Box<dyn FnOnce() + Send>;
type Task = Box<dyn FnOnce() + Send>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Destination for encoded outbound frames.
pub trait MessageSink: Send + Sync {
    fn send_text(&self, text: String) -> Result<(), SocketError>;
}

impl MessageSink for SocketSender {
    fn send_text(&self, text: String) -> Result<(), SocketError> {
        self.send(text)
    }
}

enum Inbound {
    Request {
        id: RequestId,
        method: String,
        params: Value,
    },
    Notification {
        method: String,
        params: Value,
    },
    Task(Task),
}

struct ConnectionInner {
    id: u64,
    sink: Box<dyn MessageSink>,
    logger: Arc<dyn Logger>,
    next_request_id: AtomicI64,
    pending: Mutex<HashMap<i64, Sender<Reply>>>,
    request_handler: Mutex<Option<RequestHandler>>,
    notification_handler: Mutex<Option<NotificationHandler>>,
    dispose_callbacks: Mutex<Vec<DisposeCallback>>,
    disposed: AtomicBool,
    dispatch_tx: Mutex<Option<Sender<Inbound>>>,
}

/// JSON-RPC endpoint bound to one open socket connection.
#[derive(Clone)]
pub struct MessageConnection {
    inner: Arc<ConnectionInner>,
}

impl MessageConnection {
    pub fn new(sink: Box<dyn MessageSink>, logger: Arc<dyn Logger>) -> Self {
        let (dispatch_tx, dispatch_rx) = unbounded();
        let inner = Arc::new(ConnectionInner {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            sink,
            logger,
            next_request_id: AtomicI64::new(0),
            pending: Mutex::new(HashMap::new()),
            request_handler: Mutex::new(None),
            notification_handler: Mutex::new(None),
            dispose_callbacks: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            dispatch_tx: Mutex::new(Some(dispatch_tx)),
        });
        spawn_dispatcher(Arc::downgrade(&inner), dispatch_rx);
        Self { inner }
    }

    /// Process-unique identifier of this connection.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Send a request and block until its response or `timeout`.
    pub fn send_request(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, RpcError> {
        if self.is_disposed() {
            return Err(RpcError::Disposed);
        }
        let id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        let text = Message::Request {
            id: RequestId::Number(id),
            method: method.to_owned(),
            params,
        }
        .to_text()?;
        let (tx, rx) = bounded(1);
        self.inner.pending.lock().insert(id, tx);
        if self.is_disposed() {
            self.inner.pending.lock().remove(&id);
            return Err(RpcError::Disposed);
        }
        if let Err(err) = self.inner.sink.send_text(text) {
            self.inner.pending.lock().remove(&id);
            return Err(err.into());
        }
        match rx.recv_timeout(timeout) {
            Ok(reply) => reply.map_err(RpcError::Remote),
            Err(RecvTimeoutError::Timeout) => {
                self.inner.pending.lock().remove(&id);
                Err(RpcError::Timeout {
                    method: method.to_owned(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(RpcError::Disposed),
        }
    }

    /// Send a notification; no response is expected.
    pub fn send_notification(&self, method: &str, params: Value) -> Result<(), RpcError> {
        if self.is_disposed() {
            return Err(RpcError::Disposed);
        }
        let text = Message::Notification {
            method: method.to_owned(),
            params,
        }
        .to_text()?;
        self.inner.sink.send_text(text)?;
        Ok(())
    }

    /// Install the handler answering inbound requests.
    ///
    /// Without one, requests are answered with `MethodNotFound`.
    pub fn on_request(
        &self,
        handler: impl Fn(&str, Value) -> Result<Value, ResponseError> + Send + Sync + 'static,
    ) {
        *self.inner.request_handler.lock() = Some(Arc::new(handler));
    }

    pub fn on_notification(&self, handler: impl Fn(&str, Value) + Send + Sync + 'static) {
        *self.inner.notification_handler.lock() = Some(Arc::new(handler));
    }

    /// Run `callback` once the connection is disposed.
    ///
    /// Runs immediately when the connection is already disposed.
    pub fn on_dispose(&self, callback: impl FnOnce() + Send + 'static) {
        {
            let mut callbacks = self.inner.dispose_callbacks.lock();
            if !self.is_disposed() {
                callbacks.push(Box::new(callback));
                return;
            }
        }
        callback();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Fail pending requests, stop dispatching and run dispose callbacks.
    pub fn dispose(&self) {
        let callbacks = {
            let mut callbacks = self.inner.dispose_callbacks.lock();
            if self.inner.disposed.swap(true, Ordering::SeqCst) {
                return;
            }
            std::mem::take(&mut *callbacks)
        };
        self.inner.pending.lock().clear();
        self.inner.dispatch_tx.lock().take();
        for callback in callbacks {
            callback();
        }
    }

    /// Route one inbound text frame.
    pub(crate) fn handle_text(&self, text: &str) {
        let message = match Message::parse(text) {
            Ok(message) => message,
            Err(err) => {
                self.inner
                    .logger
                    .error(&format!("failed to parse inbound message: {err}"));
                return;
            }
        };
        match message {
            Message::Response { id, result } => self.inner.resolve(id, result),
            Message::Request { id, method, params } => {
                self.inner.enqueue(Inbound::Request { id, method, params });
            }
            Message::Notification { method, params } => {
                self.inner.enqueue(Inbound::Notification { method, params });
            }
        }
    }

    /// Run `task` on the dispatcher thread after everything queued so far.
    ///
    /// Runs on the calling thread once the dispatcher has stopped.
    pub(crate) fn run_on_dispatcher(&self, task: impl FnOnce() + Send + 'static) {
        let tx = self.inner.dispatch_tx.lock().clone();
        let unsent = match tx {
            Some(tx) => tx.send(Inbound::Task(Box::new(task))).err().map(|err| err.into_inner()),
            None => Some(Inbound::Task(Box::new(task))),
        };
        if let Some(Inbound::Task(task)) = unsent {
            task();
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_requests(&self) -> usize {
        self.inner.pending.lock().len()
    }
}

impl fmt::Debug for MessageConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageConnection")
            .field("id", &self.inner.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl ConnectionInner {
    fn resolve(&self, id: Option<RequestId>, result: Reply) {
        let id = match id {
            Some(RequestId::Number(id)) => id,
            other => {
                self.logger
                    .warn(&format!("dropping response without a known id: {other:?}"));
                return;
            }
        };
        let pending = self.pending.lock().remove(&id);
        match pending {
            Some(tx) => {
                let _ = tx.send(result);
            }
            None => self
                .logger
                .warn(&format!("received response for unknown request {id}")),
        }
    }

    fn enqueue(&self, inbound: Inbound) {
        let tx = self.dispatch_tx.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(inbound);
        }
    }

    fn dispatch(&self, inbound: Inbound) {
        match inbound {
            Inbound::Request { id, method, params } => {
                let handler = self.request_handler.lock().clone();
                let result = match handler {
                    Some(handler) => handler(&method, params),
                    None => Err(ResponseError::method_not_found(&method)),
                };
                self.reply(id, result);
            }
            Inbound::Notification { method, params } => {
                let handler = self.notification_handler.lock().clone();
                if let Some(handler) = handler {
                    handler(&method, params);
                }
            }
            Inbound::Task(task) => task(),
        }
    }

    fn reply(&self, id: RequestId, result: Reply) {
        let response = Message::Response {
            id: Some(id),
            result,
        };
        let sent = response
            .to_text()
            .map_err(RpcError::from)
            .and_then(|text| self.sink.send_text(text).map_err(RpcError::from));
        if let Err(err) = sent {
            self.logger.error(&format!("failed to send response: {err}"));
        }
    }
}

fn spawn_dispatcher(inner: Weak<ConnectionInner>, rx: Receiver<Inbound>) {
    let spawned = thread::Builder::new()
        .name("wsrpc-dispatch".into())
        .spawn(move || {
            while let Ok(inbound) = rx.recv() {
                let inbound = match inbound {
                    Inbound::Task(task) => {
                        task();
                        continue;
                    }
                    other => other,
                };
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.dispatch(inbound);
            }
        });
    if let Err(err) = spawned {
        log::error!(target: super::LOG_TARGET, "failed to spawn dispatcher thread: {err}");
    }
}
