//! WebSocket connection provider.
//!
//! [`WebSocketConnectionProvider`] resolves service paths to URLs, opens a
//! [`ReconnectingSocket`](crate::socket::ReconnectingSocket) with a fixed
//! reconnection policy, attaches an error hook and serves JSON-RPC over it.
//! [`ProviderBuilder`] configures the parts that may vary.

mod builder;
mod connection_provider;
mod handler;


pub use builder::{ProviderBuildError, ProviderBuilder};
pub use connection_provider::{
    PROVIDER_MAX_RECONNECTION_DELAY, PROVIDER_MIN_RECONNECTION_DELAY,
    PROVIDER_RECONNECTION_DELAY_GROW_FACTOR, WebSocketConnectionProvider, WebSocketOptions,
};
pub use handler::{ConnectionHandler, FnConnectionHandler};
