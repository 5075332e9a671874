use std::fmt;

use crate::rpc::MessageConnection;

/// Receiver of the connections opened for one service path.
pub trait ConnectionHandler: Send + Sync {
    /// Service path; absolute `ws://`/`wss://` URLs are used verbatim.
    fn path(&self) -> &str;

    /// Called on the connection's dispatcher thread; may block on requests.
    fn on_connection(&self, connection: MessageConnection);
}

/// [`ConnectionHandler`] backed by a closure.
pub struct FnConnectionHandler<F> {
    path: String,
    callback: F,
}

impl<F> FnConnectionHandler<F>
where
    F: Fn(MessageConnection) + Send + Sync,
{
    pub fn new(path: impl Into<String>, callback: F) -> Self {
        Self {
            path: path.into(),
            callback,
        }
    }
}

impl<F> ConnectionHandler for FnConnectionHandler<F>
where
    F: Fn(MessageConnection) + Send + Sync,
{
    fn path(&self) -> &str {
        &self.path
    }

    fn on_connection(&self, connection: MessageConnection) {
        (self.callback)(connection);
    }
}

impl<F> fmt::Debug for FnConnectionHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConnectionHandler")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
