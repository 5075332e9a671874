//! Bind message connections to a reconnecting socket.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::socket::ReconnectingSocket;

use super::{connection::MessageConnection, logger::Logger};

pub type ConnectionCallback = Box<dyn Fn(MessageConnection) + Send + Sync>;

/// Arguments for [`listen`].
pub struct ListenOptions {
    pub on_connection: ConnectionCallback,
    pub logger: Arc<dyn Logger>,
}

impl ListenOptions {
    pub fn new(
        on_connection: impl Fn(MessageConnection) + Send + Sync + 'static,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            on_connection: Box::new(on_connection),
            logger,
        }
    }
}

/// Serve JSON-RPC over `socket`.
///
/// Every time the socket opens a fresh [`MessageConnection`] is handed to
/// `on_connection` on that connection's dispatcher thread, ahead of any
/// inbound request. It is disposed when the socket closes. The socket is
/// started once the listeners are installed.
pub fn listen(socket: &ReconnectingSocket, options: ListenOptions) {
    let ListenOptions {
        on_connection,
        logger,
    } = options;
    let on_connection: Arc<dyn Fn(MessageConnection) + Send + Sync> = Arc::from(on_connection);
    let current: Arc<Mutex<Option<MessageConnection>>> = Arc::default();

    let sender = socket.sender();
    let open_current = Arc::clone(&current);
    let open_logger = Arc::clone(&logger);
    socket.on_open(move || {
        let connection = MessageConnection::new(Box::new(sender.clone()), Arc::clone(&open_logger));
        let previous = open_current.lock().replace(connection.clone());
        if let Some(previous) = previous {
            previous.dispose();
        }
        let on_connection = Arc::clone(&on_connection);
        let handed = connection.clone();
        connection.run_on_dispatcher(move || on_connection(handed));
    });

    let message_current = Arc::clone(&current);
    socket.on_message(move |text| {
        let connection = message_current.lock().clone();
        match connection {
            Some(connection) => connection.handle_text(text),
            None => logger.warn("dropping message received without an open connection"),
        }
    });

    socket.on_close(move |_| {
        let connection = current.lock().take();
        if let Some(connection) = connection {
            connection.dispose();
        }
    });

    socket.start();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::unbounded;
    use rstest::rstest;
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        socket::{EventKind, ReconnectOptions, SocketConfig},
        test_utils::{
            memory_transport::{Outcome, ScriptedTransport, memory_pair},
            recording_logger::RecordingLogger,
        },
    };

    fn socket(transport: Arc<ScriptedTransport>) -> ReconnectingSocket {
        let options = ReconnectOptions {
            min_reconnection_delay: Duration::from_millis(5),
            max_reconnection_delay: Duration::from_millis(20),
            ..ReconnectOptions::default()
        };
        let config = SocketConfig {
            poll_interval: Duration::from_millis(5),
            ..SocketConfig::default()
        };
        ReconnectingSocket::with_transport("ws://rpc.test/", options, config, transport)
    }

    #[rstest]
    fn each_open_yields_a_new_connection() {
        let (first, first_peer) = memory_pair();
        let (second, _second_peer) = memory_pair();
        let transport = ScriptedTransport::new([Outcome::Open(first), Outcome::Open(second)]);
        let socket = socket(transport);
        let (tx, rx) = unbounded();
        listen(
            &socket,
            ListenOptions::new(
                move |connection| {
                    let _ = tx.send(connection);
                },
                Arc::new(RecordingLogger::default()),
            ),
        );
        assert!(socket.is_started());
        assert_eq!(socket.listener_count(EventKind::Open), 1);

        let initial = rx.recv_timeout(Duration::from_secs(2)).expect("first open");
        first_peer.close_remote(4000, "restart");
        let replacement = rx.recv_timeout(Duration::from_secs(2)).expect("second open");
        assert!(initial.is_disposed());
        assert!(!replacement.is_disposed());
        assert_ne!(initial.id(), replacement.id());
    }

    #[rstest]
    fn connection_callback_may_wait_for_responses() {
        let (transport, peer) = ScriptedTransport::opening();
        let socket = socket(transport);
        let (tx, rx) = unbounded();
        listen(
            &socket,
            ListenOptions::new(
                move |connection| {
                    let reply =
                        connection.send_request("initialize", Value::Null, Duration::from_secs(2));
                    let _ = tx.send(reply);
                },
                Arc::new(RecordingLogger::default()),
            ),
        );
        let request = peer.recv(Duration::from_secs(2)).expect("request frame");
        let request: Value = serde_json::from_str(&request).expect("json");
        assert_eq!(request["method"], "initialize");
        peer.push_text(
            &json!({"jsonrpc": "2.0", "id": request["id"], "result": {"ready": true}}).to_string(),
        );
        let reply = rx.recv_timeout(Duration::from_secs(3)).expect("callback returned");
        assert_eq!(reply.expect("initialize result"), json!({"ready": true}));
    }

    #[rstest]
    fn inbound_frames_reach_current_connection() {
        let (transport, peer) = ScriptedTransport::opening();
        let socket = socket(transport);
        listen(
            &socket,
            ListenOptions::new(
                |connection| {
                    connection.on_request(|_, params| Ok(params));
                },
                Arc::new(RecordingLogger::default()),
            ),
        );
        peer.push_text(r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":[42]}"#);
        let reply = peer.recv(Duration::from_secs(2)).expect("response frame");
        let reply: Value = serde_json::from_str(&reply).expect("json");
        assert_eq!(reply["result"], json!([42]));
    }
}
