//! Logging seam used by the RPC layer.
//!
//! The connection provider hands a [`Logger`] to every listener it installs.
//! [`ConsoleLogger`] forwards to the `log` facade; with the `tracing-compat`
//! feature [`TracingLogger`] emits `tracing` events instead.

/// Target used for records emitted by the bundled loggers.
pub const LOG_TARGET: &str = "wsrpc";

/// Sink for diagnostics produced while serving a connection.
pub trait Logger: Send + Sync {
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    fn log(&self, message: &str);
}

/// Default logger forwarding to the `log` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn error(&self, message: &str) {
        log::error!(target: LOG_TARGET, "{message}");
    }

    fn warn(&self, message: &str) {
        log::warn!(target: LOG_TARGET, "{message}");
    }

    fn info(&self, message: &str) {
        log::info!(target: LOG_TARGET, "{message}");
    }

    fn log(&self, message: &str) {
        log::debug!(target: LOG_TARGET, "{message}");
    }
}

/// Logger emitting `tracing` events.
#[cfg(feature = "tracing-compat")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

#[cfg(feature = "tracing-compat")]
impl Logger for TracingLogger {
    fn error(&self, message: &str) {
        tracing::error!(target: LOG_TARGET, "{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: LOG_TARGET, "{message}");
    }

    fn info(&self, message: &str) {
        tracing::info!(target: LOG_TARGET, "{message}");
    }

    fn log(&self, message: &str) {
        tracing::debug!(target: LOG_TARGET, "{message}");
    }
}
