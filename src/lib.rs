//! Reconnecting WebSocket connections carrying JSON-RPC.
//!
//! The crate is layered:
//!
//! - [`socket`] keeps a WebSocket alive with exponential backoff and queues
//!   outbound frames while disconnected.
//! - [`rpc`] turns socket lifecycle events into JSON-RPC message connections
//!   and exposes remote services through typed proxies.
//! - [`provider`] wires both together with a fixed reconnection policy and an
//!   error hook, configured through [`ProviderBuilder`] or an INI file.
//!
//! ```no_run
//! use wsrpc::{JsonRpcProxy, RpcError, WebSocketConnectionProvider, WebSocketOptions};
//!
//! trait Workspace {
//!     fn roots(&self) -> Result<Vec<String>, RpcError>;
//! }
//!
//! impl Workspace for JsonRpcProxy<dyn Workspace> {
//!     fn roots(&self) -> Result<Vec<String>, RpcError> {
//!         self.call("getRoots", ())
//!     }
//! }
//!
//! let provider = WebSocketConnectionProvider::new();
//! let workspace = provider.create_proxy::<dyn Workspace>(
//!     "ws://localhost:3000/services/workspace",
//!     None,
//!     WebSocketOptions::new(),
//! );
//! let roots = workspace.roots()?;
//! # Ok::<(), RpcError>(())
//! ```

pub mod file_config;
pub mod provider;
pub mod rpc;
pub mod socket;

#[cfg(test)]
mod test_utils;

pub use file_config::ConfigError;
pub use provider::{
    ConnectionHandler, FnConnectionHandler, ProviderBuildError, ProviderBuilder,
    WebSocketConnectionProvider, WebSocketOptions,
};
pub use rpc::{
    ConsoleLogger, JsonRpcProxy, JsonRpcProxyFactory, ListenOptions, Logger, MessageConnection,
    ResponseError, RpcError, RpcTarget, listen,
};
pub use socket::{
    CloseEvent, ErrorEvent, MaxRetries, ReadyState, ReconnectOptions, ReconnectingSocket,
    SocketConfig, SocketError,
};
