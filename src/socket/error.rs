use thiserror::Error;

/// Errors returned when handing commands to the socket worker.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SocketError {
    /// The command queue is full.
    #[error("socket command queue is full")]
    QueueFull,
    /// The socket has been shut down.
    #[error("socket has been shut down")]
    Closed,
}
