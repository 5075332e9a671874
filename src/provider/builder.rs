//! Builder for [`WebSocketConnectionProvider`].
//!
//! Exposes the base URL used to resolve service paths, worker channel and
//! polling knobs, connection and call timeouts, the outbound queue limit,
//! and the logger and transport seams. Reconnection delays are fixed by the
//! provider and cannot be overridden here.

use std::{fmt, path::Path, sync::Arc, time::Duration};

use thiserror::Error;

use crate::{
    file_config::{self, ConfigError},
    rpc::{ConsoleLogger, DEFAULT_CALL_TIMEOUT, Logger},
    socket::{DEFAULT_CONNECTION_TIMEOUT, SocketConfig, TlsOptions, Transport, WebSocketTransport},
};

use super::connection_provider::WebSocketConnectionProvider;

/// Errors raised while building a provider.
#[derive(Debug, Error)]
pub enum ProviderBuildError {
    /// Invalid user supplied configuration.
    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),
    /// Configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(ProviderBuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Builder for constructing [`WebSocketConnectionProvider`] instances.
#[derive(Clone, Default)]
pub struct ProviderBuilder {
    base_url: Option<String>,
    capacity: Option<usize>,
    connection_timeout_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    call_timeout_ms: Option<u64>,
    max_enqueued_messages: Option<usize>,
    tls: Option<TlsOptions>,
    logger: Option<Arc<dyn Logger>>,
    transport: Option<Arc<dyn Transport>>,
}

impl ProviderBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from the `[provider]` section of an INI file.
    pub fn from_ini_file(path: impl AsRef<Path>) -> Result<Self, ProviderBuildError> {
        Ok(file_config::load_file(path.as_ref())?)
    }

    /// Load settings from the `[provider]` section of INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ProviderBuildError> {
        Ok(file_config::load_str(text)?)
    }

    /// Resolve relative service paths against `base_url`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    option_setter!(
        /// Set the command channel capacity of each socket worker.
        with_capacity,
        capacity,
        usize
    );

    option_setter!(
        /// Set the connection timeout in milliseconds.
        with_connection_timeout_ms,
        connection_timeout_ms,
        u64
    );

    option_setter!(
        /// Set how long workers wait for inbound frames per poll, in milliseconds.
        with_poll_interval_ms,
        poll_interval_ms,
        u64
    );

    option_setter!(
        /// Set how long proxy calls wait for a connection and response, in milliseconds.
        with_call_timeout_ms,
        call_timeout_ms,
        u64
    );

    option_setter!(
        /// Limit the messages queued while a socket is disconnected.
        with_max_enqueued_messages,
        max_enqueued_messages,
        usize
    );

    option_setter!(
        /// Configure TLS for the default transport.
        with_tls,
        tls,
        TlsOptions
    );

    /// Use `logger` for connection diagnostics instead of [`ConsoleLogger`].
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Replace the tungstenite transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    fn validate(&self) -> Result<(), ProviderBuildError> {
        self.validate_base_url()?;
        self.validate_transport()?;
        if let Some(capacity) = self.capacity {
            ensure_positive!(capacity, "capacity")?;
        }
        if let Some(timeout) = self.connection_timeout_ms {
            ensure_positive!(timeout, "connection_timeout_ms")?;
        }
        if let Some(interval) = self.poll_interval_ms {
            ensure_positive!(interval, "poll_interval_ms")?;
        }
        if let Some(timeout) = self.call_timeout_ms {
            ensure_positive!(timeout, "call_timeout_ms")?;
        }
        Ok(())
    }

    fn validate_base_url(&self) -> Result<(), ProviderBuildError> {
        match &self.base_url {
            Some(url) if !(url.starts_with("ws://") || url.starts_with("wss://")) => {
                Err(ProviderBuildError::InvalidConfig(format!(
                    "base_url must use the ws or wss scheme: {url}"
                )))
            }
            _ => Ok(()),
        }
    }

    fn validate_transport(&self) -> Result<(), ProviderBuildError> {
        if self.transport.is_some() && self.tls.is_some() {
            return Err(ProviderBuildError::InvalidConfig(
                "tls options only apply to the default transport".into(),
            ));
        }
        Ok(())
    }

    /// Validate the settings and construct the provider.
    pub fn build(self) -> Result<WebSocketConnectionProvider, ProviderBuildError> {
        self.validate()?;
        let defaults = SocketConfig::default();
        let socket_config = SocketConfig {
            capacity: self.capacity.unwrap_or(defaults.capacity),
            poll_interval: self
                .poll_interval_ms
                .map_or(defaults.poll_interval, Duration::from_millis),
            ..defaults
        };
        let transport = self.transport.unwrap_or_else(|| {
            let transport = match self.tls {
                Some(tls) => WebSocketTransport::new().with_tls(tls),
                None => WebSocketTransport::new(),
            };
            Arc::new(transport)
        });
        Ok(WebSocketConnectionProvider {
            base_url: self.base_url,
            transport,
            logger: self.logger.unwrap_or_else(|| Arc::new(ConsoleLogger)),
            socket_config,
            connection_timeout: self
                .connection_timeout_ms
                .map_or(DEFAULT_CONNECTION_TIMEOUT, Duration::from_millis),
            max_enqueued_messages: self.max_enqueued_messages,
            call_timeout: self
                .call_timeout_ms
                .map_or(DEFAULT_CALL_TIMEOUT, Duration::from_millis),
        })
    }
}

impl fmt::Debug for ProviderBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderBuilder")
            .field("base_url", &self.base_url)
            .field("capacity", &self.capacity)
            .field("connection_timeout_ms", &self.connection_timeout_ms)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("call_timeout_ms", &self.call_timeout_ms)
            .field("max_enqueued_messages", &self.max_enqueued_messages)
            .field("tls", &self.tls)
            .field("custom_logger", &self.logger.is_some())
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::test_utils::memory_transport::ScriptedTransport;

    #[rstest]
    fn defaults_build() {
        let provider = ProviderBuilder::new().build().expect("default provider");
        assert_eq!(provider.base_url(), None);
        assert_eq!(provider.call_timeout(), DEFAULT_CALL_TIMEOUT);
        assert_eq!(
            provider.socket_options().connection_timeout,
            DEFAULT_CONNECTION_TIMEOUT
        );
    }

    #[rstest]
    fn overrides_are_applied() {
        let provider = ProviderBuilder::new()
            .with_base_url("wss://ide.example/")
            .with_capacity(8)
            .with_connection_timeout_ms(250)
            .with_poll_interval_ms(10)
            .with_call_timeout_ms(1_500)
            .with_max_enqueued_messages(16)
            .build()
            .expect("provider");
        assert_eq!(provider.socket_config.capacity, 8);
        assert_eq!(provider.socket_config.poll_interval, Duration::from_millis(10));
        assert_eq!(provider.call_timeout(), Duration::from_millis(1_500));
        let options = provider.socket_options();
        assert_eq!(options.connection_timeout, Duration::from_millis(250));
        assert_eq!(options.max_enqueued_messages, Some(16));
        assert_eq!(provider.resolve_url("/services"), "wss://ide.example/services");
    }

    #[rstest]
    #[case::capacity(ProviderBuilder::new().with_capacity(0), "capacity")]
    #[case::connection_timeout(
        ProviderBuilder::new().with_connection_timeout_ms(0),
        "connection_timeout_ms"
    )]
    #[case::poll_interval(ProviderBuilder::new().with_poll_interval_ms(0), "poll_interval_ms")]
    #[case::call_timeout(ProviderBuilder::new().with_call_timeout_ms(0), "call_timeout_ms")]
    #[case::base_url(ProviderBuilder::new().with_base_url("http://ide.example"), "base_url")]
    fn rejects_invalid_settings(#[case] builder: ProviderBuilder, #[case] field: &str) {
        let err = builder.build().expect_err("invalid configuration");
        let ProviderBuildError::InvalidConfig(message) = err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(message.contains(field), "{message}");
    }

    #[rstest]
    fn tls_conflicts_with_custom_transport() {
        let err = ProviderBuilder::new()
            .with_transport(ScriptedTransport::new([]))
            .with_tls(TlsOptions::default())
            .build()
            .expect_err("conflicting transport settings");
        assert!(matches!(err, ProviderBuildError::InvalidConfig(_)));
    }
}
