//! Connection provider wiring sockets, loggers and proxies together.

use std::{fmt, sync::Arc, time::Duration};

use crate::{
    rpc::{
        self, ConsoleLogger, DEFAULT_CALL_TIMEOUT, JsonRpcProxy, JsonRpcProxyFactory,
        ListenOptions, Logger, RpcTarget,
    },
    socket::{
        DEFAULT_CONNECTION_TIMEOUT, ErrorCallback, ErrorEvent, MaxRetries, ReconnectOptions,
        ReconnectingSocket, SocketConfig, Transport, WebSocketTransport,
    },
};

use super::handler::{ConnectionHandler, FnConnectionHandler};

/// Upper bound for the reconnection delay of provider sockets.
pub const PROVIDER_MAX_RECONNECTION_DELAY: Duration = Duration::from_millis(10_000);
/// Delay before the first retry of provider sockets.
pub const PROVIDER_MIN_RECONNECTION_DELAY: Duration = Duration::from_millis(1_000);
/// Growth factor applied to the reconnection delay of provider sockets.
pub const PROVIDER_RECONNECTION_DELAY_GROW_FACTOR: f64 = 1.3;

/// Per-call options for [`WebSocketConnectionProvider::listen`] and
/// [`WebSocketConnectionProvider::create_proxy`].
#[derive(Clone, Default)]
pub struct WebSocketOptions {
    /// Replaces the default error logging when set.
    pub on_error: Option<ErrorCallback>,
}

impl WebSocketOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_error(mut self, callback: impl Fn(&ErrorEvent) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for WebSocketOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketOptions")
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Creates reconnecting sockets and JSON-RPC proxies for service paths.
///
/// Every socket uses the same reconnection policy; see
/// [`socket_options`](Self::socket_options).
pub struct WebSocketConnectionProvider {
    pub(crate) base_url: Option<String>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) logger: Arc<dyn Logger>,
    pub(crate) socket_config: SocketConfig,
    pub(crate) connection_timeout: Duration,
    pub(crate) max_enqueued_messages: Option<usize>,
    pub(crate) call_timeout: Duration,
}

impl Default for WebSocketConnectionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketConnectionProvider {
    /// Provider using the tungstenite transport and [`ConsoleLogger`].
    pub fn new() -> Self {
        Self {
            base_url: None,
            transport: Arc::new(WebSocketTransport::new()),
            logger: Arc::new(ConsoleLogger),
            socket_config: SocketConfig::default(),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            max_enqueued_messages: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Open a socket for `path` and return a proxy bound to it.
    ///
    /// Inbound requests are served by `target` when given. The socket lives
    /// as long as the returned proxy or any of its clones.
    pub fn create_proxy<T>(
        &self,
        path: &str,
        target: Option<Arc<dyn RpcTarget>>,
        options: WebSocketOptions,
    ) -> JsonRpcProxy<T>
    where
        T: ?Sized + 'static,
    {
        let factory =
            Arc::new(JsonRpcProxyFactory::<T>::new(target).with_call_timeout(self.call_timeout));
        let listening = Arc::clone(&factory);
        let socket = self.listen(
            FnConnectionHandler::new(path, move |connection| listening.listen(connection)),
            options,
        );
        factory.create_proxy().with_socket(socket)
    }

    /// Open a socket for `handler.path()` and feed its connections to `handler`.
    pub fn listen(
        &self,
        handler: impl ConnectionHandler + 'static,
        options: WebSocketOptions,
    ) -> Arc<ReconnectingSocket> {
        let url = self.resolve_url(handler.path());
        let socket = Arc::new(self.create_web_socket(&url));
        let logger = self.create_logger();
        match options.on_error {
            Some(on_error) => socket.on_error(move |event| on_error(event)),
            None => {
                let logger = Arc::clone(&logger);
                socket.on_error(move |event| logger.error(&describe_error(event)))
            }
        };
        rpc::listen(
            &socket,
            ListenOptions::new(move |connection| handler.on_connection(connection), logger),
        );
        socket
    }

    /// Construct an unstarted socket for `url` with the provider policy.
    pub fn create_web_socket(&self, url: &str) -> ReconnectingSocket {
        ReconnectingSocket::with_transport(
            url,
            self.socket_options(),
            self.socket_config.clone(),
            Arc::clone(&self.transport),
        )
    }

    /// Reconnection policy shared by every provider socket.
    pub fn socket_options(&self) -> ReconnectOptions {
        ReconnectOptions {
            max_reconnection_delay: PROVIDER_MAX_RECONNECTION_DELAY,
            min_reconnection_delay: PROVIDER_MIN_RECONNECTION_DELAY,
            reconnection_delay_grow_factor: PROVIDER_RECONNECTION_DELAY_GROW_FACTOR,
            max_retries: MaxRetries::Unlimited,
            debug: false,
            connection_timeout: self.connection_timeout,
            max_enqueued_messages: self.max_enqueued_messages,
            ..ReconnectOptions::default()
        }
    }

    pub fn create_logger(&self) -> Arc<dyn Logger> {
        Arc::clone(&self.logger)
    }

    /// Map a service path to the URL the socket connects to.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("ws://") || path.starts_with("wss://") {
            return path.to_owned();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            None => path.to_owned(),
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }
}

impl fmt::Debug for WebSocketConnectionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketConnectionProvider")
            .field("base_url", &self.base_url)
            .field("socket_config", &self.socket_config)
            .field("connection_timeout", &self.connection_timeout)
            .field("max_enqueued_messages", &self.max_enqueued_messages)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

fn describe_error(event: &ErrorEvent) -> String {
    serde_json::to_string(event).unwrap_or_else(|_| event.to_string())
}
