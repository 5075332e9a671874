//! Proxy factory exposing a remote service as a local handle.
//!
//! A [`JsonRpcProxyFactory`] follows the connection produced by [`listen`]:
//! each new [`MessageConnection`] replaces the previous one and is wired to
//! the optional local [`RpcTarget`]. [`JsonRpcProxy`] handles created from the
//! factory always issue calls over the current connection.
//!
//! Connection open and close listeners run on a notifier thread owned by the
//! factory, so they may call back into the proxy.
//!
//! [`listen`]: super::listen

use std::{
    fmt,
    marker::PhantomData,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Condvar, Mutex};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::socket::ReconnectingSocket;

use super::{connection::MessageConnection, error::RpcError, message::ResponseError};

/// Default time a proxy call waits for a connection plus its response.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Local service answering requests initiated by the remote side.
pub trait RpcTarget: Send + Sync {
    fn handle_request(&self, method: &str, params: Value) -> Result<Value, ResponseError> {
        let _ = params;
        Err(ResponseError::method_not_found(method))
    }

    fn handle_notification(&self, method: &str, params: Value) {
        let _ = (method, params);
    }
}

type ConnectionListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConnectionEvent {
    Opened,
    Closed,
}

#[derive(Default)]
struct ConnectionListeners {
    open: Mutex<Vec<ConnectionListener>>,
    close: Mutex<Vec<ConnectionListener>>,
}

impl ConnectionListeners {
    fn notify(&self, event: ConnectionEvent) {
        let listeners = match event {
            ConnectionEvent::Opened => self.open.lock().clone(),
            ConnectionEvent::Closed => self.close.lock().clone(),
        };
        for listener in listeners {
            listener();
        }
    }
}

struct ProxyState {
    connection: Mutex<Option<MessageConnection>>,
    connected: Condvar,
    listeners: Arc<ConnectionListeners>,
    events: Sender<ConnectionEvent>,
}

impl ProxyState {
    fn new() -> Self {
        let listeners = Arc::new(ConnectionListeners::default());
        let (events, rx) = unbounded();
        spawn_notifier(Arc::clone(&listeners), rx);
        Self {
            connection: Mutex::new(None),
            connected: Condvar::new(),
            listeners,
            events,
        }
    }

    fn attach(&self, connection: MessageConnection) {
        {
            let mut current = self.connection.lock();
            *current = Some(connection);
            self.connected.notify_all();
        }
        self.publish(ConnectionEvent::Opened);
    }

    fn detach(&self, connection_id: u64) {
        {
            let mut current = self.connection.lock();
            if current.as_ref().map(MessageConnection::id) != Some(connection_id) {
                return;
            }
            *current = None;
        }
        self.publish(ConnectionEvent::Closed);
    }

    fn publish(&self, event: ConnectionEvent) {
        if self.events.send(event).is_err() {
            self.listeners.notify(event);
        }
    }

    fn current(&self) -> Option<MessageConnection> {
        self.connection.lock().clone()
    }

    fn wait_for_connection(&self, deadline: Instant) -> Option<MessageConnection> {
        let mut current = self.connection.lock();
        loop {
            if let Some(connection) = current.as_ref() {
                return Some(connection.clone());
            }
            if self.connected.wait_until(&mut current, deadline).timed_out() {
                return current.clone();
            }
        }
    }
}

fn spawn_notifier(listeners: Arc<ConnectionListeners>, rx: Receiver<ConnectionEvent>) {
    let spawned = thread::Builder::new()
        .name("wsrpc-proxy-events".into())
        .spawn(move || {
            for event in rx {
                listeners.notify(event);
            }
        });
    if let Err(err) = spawned {
        log::error!(target: super::LOG_TARGET, "failed to spawn proxy notifier thread: {err}");
    }
}

/// Tracks the live connection for a service and hands out proxies to it.
///
/// `T` names the remote service interface; it is only a marker.
pub struct JsonRpcProxyFactory<T: ?Sized> {
    target: Option<Arc<dyn RpcTarget>>,
    state: Arc<ProxyState>,
    call_timeout: Duration,
    _service: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized> JsonRpcProxyFactory<T> {
    pub fn new(target: Option<Arc<dyn RpcTarget>>) -> Self {
        Self {
            target,
            state: Arc::new(ProxyState::new()),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            _service: PhantomData,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Adopt `connection` as the current connection.
    pub fn listen(&self, connection: MessageConnection) {
        if let Some(target) = &self.target {
            let requests = Arc::clone(target);
            connection.on_request(move |method, params| requests.handle_request(method, params));
            let notifications = Arc::clone(target);
            connection.on_notification(move |method, params| {
                notifications.handle_notification(method, params);
            });
        }
        let state = Arc::downgrade(&self.state);
        let id = connection.id();
        connection.on_dispose(move || {
            if let Some(state) = state.upgrade() {
                state.detach(id);
            }
        });
        if !connection.is_disposed() {
            self.state.attach(connection);
        }
    }

    pub fn create_proxy(&self) -> JsonRpcProxy<T> {
        JsonRpcProxy {
            state: Arc::clone(&self.state),
            call_timeout: self.call_timeout,
            socket: None,
            _service: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for JsonRpcProxyFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcProxyFactory")
            .field("has_target", &self.target.is_some())
            .field("connected", &self.state.current().is_some())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

/// Handle for calling a remote service.
///
/// Calls wait for a connection to become available, bounded by the call
/// timeout. Typed service methods are usually written as an `impl` of the
/// service trait for `JsonRpcProxy<dyn Service>` that delegates to
/// [`call`](Self::call) and [`notify`](Self::notify).
pub struct JsonRpcProxy<T: ?Sized> {
    state: Arc<ProxyState>,
    call_timeout: Duration,
    socket: Option<Arc<ReconnectingSocket>>,
    _service: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized> JsonRpcProxy<T> {
    /// Invoke `method` and decode its result.
    pub fn call<P, R>(&self, method: &str, params: P) -> Result<R, RpcError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let deadline = Instant::now() + self.call_timeout;
        let params = serde_json::to_value(params)?;
        let connection = self.connection(method, deadline)?;
        let remaining = deadline.saturating_duration_since(Instant::now());
        let value = connection.send_request(method, params, remaining)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Send `method` as a notification.
    pub fn notify<P: Serialize>(&self, method: &str, params: P) -> Result<(), RpcError> {
        let deadline = Instant::now() + self.call_timeout;
        let params = serde_json::to_value(params)?;
        self.connection(method, deadline)?
            .send_notification(method, params)
    }

    pub fn is_connected(&self) -> bool {
        self.state.current().is_some()
    }

    /// Register a callback fired whenever a new connection is adopted.
    ///
    /// The callback runs on the factory's notifier thread and may issue calls
    /// through this proxy.
    pub fn on_did_open_connection(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.state.listeners.open.lock().push(Arc::new(listener));
    }

    /// Register a callback fired whenever the current connection goes away.
    pub fn on_did_close_connection(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.state.listeners.close.lock().push(Arc::new(listener));
    }

    /// Socket carrying this proxy's connection, when it was created by a provider.
    pub fn socket(&self) -> Option<&ReconnectingSocket> {
        self.socket.as_deref()
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub(crate) fn with_socket(mut self, socket: Arc<ReconnectingSocket>) -> Self {
        self.socket = Some(socket);
        self
    }

    fn connection(&self, method: &str, deadline: Instant) -> Result<MessageConnection, RpcError> {
        self.state
            .wait_for_connection(deadline)
            .ok_or_else(|| RpcError::NotConnected {
                method: method.to_owned(),
            })
    }
}

impl<T: ?Sized> Clone for JsonRpcProxy<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            call_timeout: self.call_timeout,
            socket: self.socket.clone(),
            _service: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for JsonRpcProxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcProxy")
            .field("connected", &self.is_connected())
            .field("socket", &self.socket.as_ref().map(|socket| socket.url()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use crossbeam_channel::{Receiver, unbounded};
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{
        rpc::connection::MessageSink,
        socket::SocketError,
        test_utils::recording_logger::RecordingLogger,
    };

    struct ChannelSink(crossbeam_channel::Sender<String>);

    impl MessageSink for ChannelSink {
        fn send_text(&self, text: String) -> Result<(), SocketError> {
            let _ = self.0.send(text);
            Ok(())
        }
    }

    fn connection() -> (MessageConnection, Receiver<String>) {
        let (tx, rx) = unbounded();
        let connection = MessageConnection::new(
            Box::new(ChannelSink(tx)),
            Arc::new(RecordingLogger::default()),
        );
        (connection, rx)
    }

    trait Calculator {
        fn add(&self, a: i64, b: i64) -> Result<i64, RpcError>;
    }

    impl Calculator for JsonRpcProxy<dyn Calculator> {
        fn add(&self, a: i64, b: i64) -> Result<i64, RpcError> {
            self.call("add", (a, b))
        }
    }

    struct Echo;

    impl RpcTarget for Echo {
        fn handle_request(&self, method: &str, params: Value) -> Result<Value, ResponseError> {
            match method {
                "echo" => Ok(params),
                other => Err(ResponseError::method_not_found(other)),
            }
        }
    }

    #[rstest]
    fn typed_call_round_trips_through_connection() {
        let factory = JsonRpcProxyFactory::<dyn Calculator>::new(None)
            .with_call_timeout(Duration::from_secs(2));
        let proxy = factory.create_proxy();
        let (connection, frames) = connection();
        factory.listen(connection.clone());
        assert!(proxy.is_connected());

        let server = thread::spawn(move || {
            let text = frames.recv_timeout(Duration::from_secs(2)).expect("request");
            let request: Value = serde_json::from_str(&text).expect("json");
            assert_eq!(request["params"], json!([2, 3]));
            connection.handle_text(
                &json!({"jsonrpc": "2.0", "id": request["id"], "result": 5}).to_string(),
            );
        });
        assert_eq!(proxy.add(2, 3).expect("sum"), 5);
        server.join().expect("server thread");
    }

    #[rstest]
    fn call_without_connection_times_out() {
        let factory = JsonRpcProxyFactory::<dyn Calculator>::new(None)
            .with_call_timeout(Duration::from_millis(30));
        let err = factory.create_proxy().add(1, 1).expect_err("no connection");
        assert!(matches!(err, RpcError::NotConnected { ref method } if method == "add"));
    }

    #[rstest]
    fn call_waits_for_late_connection() {
        let factory = Arc::new(
            JsonRpcProxyFactory::<dyn Calculator>::new(None)
                .with_call_timeout(Duration::from_secs(2)),
        );
        let proxy = factory.create_proxy();
        let late = Arc::clone(&factory);
        let server = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            let (connection, frames) = connection();
            late.listen(connection.clone());
            let text = frames.recv_timeout(Duration::from_secs(2)).expect("request");
            let request: Value = serde_json::from_str(&text).expect("json");
            connection.handle_text(
                &json!({"jsonrpc": "2.0", "id": request["id"], "result": 7}).to_string(),
            );
        });
        assert_eq!(proxy.add(3, 4).expect("sum"), 7);
        server.join().expect("server thread");
    }

    #[rstest]
    fn target_answers_remote_requests() {
        let factory = JsonRpcProxyFactory::<dyn Calculator>::new(Some(Arc::new(Echo)));
        let (connection, frames) = connection();
        factory.listen(connection.clone());
        connection.handle_text(r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":{"a":1}}"#);
        let text = frames.recv_timeout(Duration::from_secs(2)).expect("response");
        let response: Value = serde_json::from_str(&text).expect("json");
        assert_eq!(response["result"], json!({"a": 1}));
    }

    #[rstest]
    fn connection_listeners_follow_lifecycle() {
        let factory = JsonRpcProxyFactory::<dyn Calculator>::new(None);
        let proxy = factory.create_proxy();
        let (tx, events) = unbounded();
        let opened = tx.clone();
        proxy.on_did_open_connection(move || {
            let _ = opened.send("open");
        });
        proxy.on_did_close_connection(move || {
            let _ = tx.send("close");
        });

        let (first, _first_frames) = connection();
        factory.listen(first.clone());
        let (second, _second_frames) = connection();
        factory.listen(second.clone());
        first.dispose();
        assert!(proxy.is_connected());
        second.dispose();
        assert!(!proxy.is_connected());

        let seen: Vec<_> = (0..3)
            .map(|_| events.recv_timeout(Duration::from_secs(2)).expect("listener event"))
            .collect();
        assert_eq!(seen, vec!["open", "open", "close"]);
        thread::sleep(Duration::from_millis(50));
        assert!(events.try_recv().is_err());
    }

    #[rstest]
    fn open_listener_may_call_through_proxy() {
        let factory = JsonRpcProxyFactory::<dyn Calculator>::new(None)
            .with_call_timeout(Duration::from_secs(2));
        let proxy = factory.create_proxy();
        let (tx, results) = unbounded();
        let slot = Arc::new(Mutex::new(Some(proxy.clone())));
        let caller = Arc::clone(&slot);
        proxy.on_did_open_connection(move || {
            let proxy = caller.lock().clone();
            if let Some(proxy) = proxy {
                let _ = tx.send(proxy.add(1, 2));
            }
        });

        let (connection, frames) = connection();
        factory.listen(connection.clone());
        let text = frames.recv_timeout(Duration::from_secs(2)).expect("request");
        let request: Value = serde_json::from_str(&text).expect("json");
        connection.handle_text(
            &json!({"jsonrpc": "2.0", "id": request["id"], "result": 3}).to_string(),
        );
        let sum = results.recv_timeout(Duration::from_secs(2)).expect("listener returned");
        assert_eq!(sum.expect("sum"), 3);
        slot.lock().take();
    }

    #[rstest]
    fn disposed_connection_is_not_adopted() {
        let factory = JsonRpcProxyFactory::<dyn Calculator>::new(None);
        let (connection, _frames) = connection();
        connection.dispose();
        factory.listen(connection);
        assert!(!factory.create_proxy().is_connected());
    }
}
