//! Reconnection delay state machine used by the socket worker.

use std::time::Duration;

use super::config::{MaxRetries, ReconnectOptions};

/// Tracks reconnection attempts and produces the delay before each one.
///
/// The first attempt after construction or [`reset`](Self::reset) runs
/// immediately. Retry `n` waits `min * grow^(n - 1)`, capped at `max`.
#[derive(Clone, Debug)]
pub struct BackoffState {
    min: Duration,
    max: Duration,
    grow_factor: f64,
    max_retries: MaxRetries,
    /// `None` until the first attempt after a reset.
    retry_count: Option<u32>,
}

impl BackoffState {
    /// Create a new state machine from the supplied options.
    pub fn new(options: &ReconnectOptions) -> Self {
        Self {
            min: options.min_reconnection_delay,
            max: options.max_reconnection_delay,
            grow_factor: options.reconnection_delay_grow_factor,
            max_retries: options.max_retries,
            retry_count: None,
        }
    }

    /// Number of retries made since the last accepted open.
    pub fn retry_count(&self) -> u32 {
        self.retry_count.unwrap_or(0)
    }

    /// Register a new attempt and return the delay to wait before it.
    ///
    /// Returns `None` once the retry cap has been reached.
    pub fn next_attempt(&mut self) -> Option<Duration> {
        let next = match self.retry_count {
            None => 0,
            Some(count) if self.max_retries.exhausted(count) => return None,
            Some(count) => count.saturating_add(1),
        };
        self.retry_count = Some(next);
        Some(self.delay_for(next))
    }

    /// Reset the retry counter after a connection stayed up long enough.
    pub fn accept_open(&mut self) {
        self.retry_count = Some(0);
    }

    /// Forget all attempts so the next one runs immediately.
    pub fn reset(&mut self) {
        self.retry_count = None;
    }

    fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let millis = self.min.as_secs_f64() * 1_000.0 * self.grow_factor.powi(exponent);
        let cap = self.max.as_secs_f64() * 1_000.0;
        if !millis.is_finite() || millis >= cap {
            return self.max;
        }
        Duration::from_millis(millis.max(0.0).round() as u64)
    }
}
