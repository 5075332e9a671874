//! JSON-RPC over a reconnecting socket.
//!
//! [`listen`] turns socket lifecycle events into [`MessageConnection`]s and
//! [`JsonRpcProxyFactory`] keeps proxies pointed at the latest one.

mod connection;
mod error;
mod listen;
mod logger;
mod message;
mod proxy;

pub use connection::{MessageConnection, MessageSink, NotificationHandler, RequestHandler};
pub use error::RpcError;
pub use listen::{ConnectionCallback, ListenOptions, listen};
#[cfg(feature = "tracing-compat")]
pub use logger::TracingLogger;
pub use logger::{ConsoleLogger, LOG_TARGET, Logger};
pub use message::{JSONRPC_VERSION, Message, MessageError, RequestId, ResponseError, error_codes};
pub use proxy::{DEFAULT_CALL_TIMEOUT, JsonRpcProxy, JsonRpcProxyFactory, RpcTarget};
