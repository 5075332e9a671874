//! Send/Sync guarantees for core types.

use rstest::rstest;
use static_assertions::assert_impl_all;
use wsrpc::{
    ConsoleLogger, JsonRpcProxy, JsonRpcProxyFactory, MessageConnection, ProviderBuilder,
    ReconnectingSocket, WebSocketConnectionProvider, WebSocketOptions,
    socket::{SocketSender, WebSocketTransport},
};

trait Service {}

#[rstest]
fn builders_are_send_sync() {
    assert_impl_all!(ProviderBuilder: Send, Sync);
    assert_impl_all!(WebSocketOptions: Send, Sync);
}

#[rstest]
fn components_are_send_sync() {
    assert_impl_all!(ReconnectingSocket: Send, Sync);
    assert_impl_all!(SocketSender: Send, Sync);
    assert_impl_all!(WebSocketTransport: Send, Sync);
    assert_impl_all!(MessageConnection: Send, Sync);
    assert_impl_all!(ConsoleLogger: Send, Sync);
    assert_impl_all!(WebSocketConnectionProvider: Send, Sync);
    assert_impl_all!(JsonRpcProxyFactory<dyn Service>: Send, Sync);
    assert_impl_all!(JsonRpcProxy<dyn Service>: Send, Sync, Clone);
}
