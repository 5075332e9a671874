//! Configuration structures consumed by the reconnecting socket.
//!
//! [`ReconnectOptions`] carries the reconnection policy (delay bounds, growth
//! factor, retry cap) while [`SocketConfig`] holds the plumbing knobs of the
//! worker thread that drives the connection.

use std::time::Duration;

/// Default upper bound for the delay between reconnection attempts.
pub const DEFAULT_MAX_RECONNECTION_DELAY: Duration = Duration::from_millis(10_000);
/// Default delay before the first retry.
pub const DEFAULT_MIN_RECONNECTION_DELAY: Duration = Duration::from_millis(1_000);
/// Default multiplier applied to the delay after every failed retry.
pub const DEFAULT_RECONNECTION_DELAY_GROW_FACTOR: f64 = 1.3;
/// Default time a connection must stay open before the retry counter resets.
pub const DEFAULT_MIN_UPTIME: Duration = Duration::from_millis(5_000);
/// Default limit for establishing a single connection.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_millis(4_000);
/// Default bounded channel capacity between the socket handle and its worker.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
/// Default wait applied when polling an open connection for inbound frames.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Default time to wait for the worker to acknowledge shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);
/// Default interval between warnings about dropped outbound messages.
pub const DEFAULT_WARN_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on reconnection attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaxRetries {
    /// Stop once this many retries have been made since the last accepted open.
    Limited(u32),
    /// Keep retrying forever.
    Unlimited,
}

impl MaxRetries {
    /// Return `true` once `retries` has reached the cap.
    pub fn exhausted(self, retries: u32) -> bool {
        match self {
            Self::Limited(max) => retries >= max,
            Self::Unlimited => false,
        }
    }
}

/// Reconnection policy applied by [`ReconnectingSocket`](super::ReconnectingSocket).
#[derive(Clone, Debug, PartialEq)]
pub struct ReconnectOptions {
    pub max_reconnection_delay: Duration,
    pub min_reconnection_delay: Duration,
    pub reconnection_delay_grow_factor: f64,
    pub max_retries: MaxRetries,
    /// Log lifecycle transitions at debug level.
    pub debug: bool,
    pub min_uptime: Duration,
    pub connection_timeout: Duration,
    /// Messages kept while disconnected; `None` keeps everything.
    pub max_enqueued_messages: Option<usize>,
    /// Wait for an explicit `reconnect` instead of connecting on start.
    pub start_closed: bool,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            max_reconnection_delay: DEFAULT_MAX_RECONNECTION_DELAY,
            min_reconnection_delay: DEFAULT_MIN_RECONNECTION_DELAY,
            reconnection_delay_grow_factor: DEFAULT_RECONNECTION_DELAY_GROW_FACTOR,
            max_retries: MaxRetries::Unlimited,
            debug: false,
            min_uptime: DEFAULT_MIN_UPTIME,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            max_enqueued_messages: None,
            start_closed: false,
        }
    }
}

impl ReconnectOptions {
    /// Override the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Override the retry cap.
    pub fn with_max_retries(mut self, max_retries: MaxRetries) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Override the outbound queue limit.
    pub fn with_max_enqueued_messages(mut self, limit: Option<usize>) -> Self {
        self.max_enqueued_messages = limit;
        self
    }
}

/// Worker plumbing for a [`ReconnectingSocket`](super::ReconnectingSocket).
#[derive(Clone, Debug)]
pub struct SocketConfig {
    pub capacity: usize,
    pub poll_interval: Duration,
    pub shutdown_timeout: Duration,
    pub warn_interval: Duration,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}
