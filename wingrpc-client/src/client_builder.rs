//! Client builder for timeouts, connect retries and other options
//!
//! The `ClientBuilder` provides a fluent API for configuring a client before
//! it is created. It allows you to:
//! - Set the per-call and connect timeouts
//! - Retry a failing connect with various strategies
//! - Swap the transport (e.g. the in-memory transport in tests)
//! - Configure observability (OpenTelemetry)
//!
//! # Examples
//!
//! ```rust,no_run
//! use wingrpc_client::{ExponentialBackoff, RpcClient};
//! use std::time::Duration;
//!
//! # async fn example() -> wingrpc_client::Result<()> {
//! let client = RpcClient::builder()
//!     .call_timeout(Duration::from_secs(10))
//!     .with_connect_retry(Box::new(ExponentialBackoff::default()))
//!     .build();
//! client.connect("ws://localhost:8765/ws").await?;
//!
//! // No deadline on calls, metrics and logs enabled
//! let patient = RpcClient::builder()
//!     .call_timeout(None)
//!     .with_default_observability()
//!     .service_name("inventory-ui")
//!     .build();
//! # Ok(())
//! # }
//! ```

use crate::connection::ConnectionManager;
use crate::metrics::ClientMetrics;
use crate::retry::{ExponentialBackoff, NoRetry, RetryStrategy};
use crate::transport::{Connector, WebSocketConnector};
use crate::RpcClient;
use std::sync::Arc;
use std::time::Duration;
use wingrpc_core::ObservabilityConfig;

/// Default deadline for a single call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for opening the socket, per try
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for `RpcClient`
pub struct ClientBuilder {
    call_timeout: Option<Duration>,
    connect_timeout: Duration,
    retry_strategy: Box<dyn RetryStrategy>,
    connector: Arc<dyn Connector>,
    observability_config: Option<ObservabilityConfig>,
    service_name: Option<String>,
}

impl ClientBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self {
            call_timeout: Some(DEFAULT_CALL_TIMEOUT),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry_strategy: Box::new(NoRetry),
            connector: Arc::new(WebSocketConnector::new()),
            observability_config: None,
            service_name: None,
        }
    }

    /// Deadline for each call; `None` waits forever
    pub fn call_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.call_timeout = timeout.into();
        self
    }

    /// Deadline for each try at opening the socket
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Retry failed opens within one connect using `strategy`
    pub fn with_connect_retry(mut self, strategy: Box<dyn RetryStrategy>) -> Self {
        self.retry_strategy = strategy;
        self
    }

    /// Retry failed opens with the default exponential backoff
    pub fn with_default_connect_retry(mut self) -> Self {
        self.retry_strategy = Box::new(ExponentialBackoff::default());
        self
    }

    /// Give up on the first failed open (the default)
    pub fn without_connect_retry(mut self) -> Self {
        self.retry_strategy = Box::new(NoRetry);
        self
    }

    /// Open connections with `connector` instead of WebSocket
    pub fn with_connector(mut self, connector: impl Connector) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    /// Install logging/telemetry and record client metrics
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Like `with_observability` with `ObservabilityConfig::default()`
    pub fn with_default_observability(mut self) -> Self {
        self.observability_config = Some(ObservabilityConfig::default());
        self
    }

    /// Service name for telemetry, overriding the observability config's
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    /// Create the client; no connection is opened yet
    ///
    /// When observability is configured but cannot be installed (for
    /// example because the application already set a global subscriber),
    /// the client is still built and still records metrics.
    pub fn build(self) -> RpcClient {
        let (metrics, guard) = match self.observability_config {
            Some(mut config) => {
                if let Some(name) = self.service_name {
                    config.service_name = name;
                }

                let service_name = config.service_name.clone();
                let guard = match wingrpc_core::init_observability(config) {
                    Ok(guard) => Some(guard),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to initialize observability");
                        None
                    }
                };
                // Instruments bind to the meter provider current at creation,
                // so they are created after the provider is installed.
                let metrics = Arc::new(ClientMetrics::new(service_name));
                (Some(metrics), guard)
            }
            None => (None, None),
        };

        let connection = ConnectionManager::new(
            self.connector,
            self.retry_strategy,
            self.connect_timeout,
            metrics,
        );

        RpcClient::from_parts(connection, self.call_timeout, guard)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::FixedDelay;
    use crate::ConnectionState;

    #[test]
    fn test_builder_defaults() {
        let builder = ClientBuilder::new();
        assert_eq!(builder.call_timeout, Some(DEFAULT_CALL_TIMEOUT));
        assert_eq!(builder.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert!(builder.observability_config.is_none());
        assert!(builder.service_name.is_none());
    }

    #[test]
    fn test_builder_call_timeout() {
        let builder = ClientBuilder::new().call_timeout(Duration::from_millis(250));
        assert_eq!(builder.call_timeout, Some(Duration::from_millis(250)));

        let builder = builder.call_timeout(None);
        assert!(builder.call_timeout.is_none());
    }

    #[test]
    fn test_builder_with_connect_retry() {
        let builder = ClientBuilder::new().with_connect_retry(Box::new(
            FixedDelay::new(Duration::from_millis(500)).with_max_attempts(2),
        ));
        assert_eq!(
            builder.retry_strategy.next_delay(0),
            Some(Duration::from_millis(500))
        );
        assert!(builder.retry_strategy.next_delay(2).is_none());
    }

    #[test]
    fn test_builder_without_connect_retry() {
        let builder = ClientBuilder::new()
            .with_default_connect_retry()
            .without_connect_retry();
        assert!(builder.retry_strategy.next_delay(0).is_none());
    }

    #[test]
    fn test_builder_observability_config() {
        let config = ObservabilityConfig::new("test-client")
            .with_endpoint("http://localhost:4317")
            .with_log_level("debug");

        let builder = ClientBuilder::new()
            .with_observability(config)
            .service_name("renamed");

        let obs_config = builder.observability_config.unwrap();
        assert_eq!(obs_config.service_name, "test-client");
        assert_eq!(obs_config.log_level, "debug");
        assert_eq!(builder.service_name.as_deref(), Some("renamed"));
    }

    #[test]
    fn test_build_starts_disconnected() {
        let client = ClientBuilder::new().connect_timeout(Duration::from_secs(1)).build();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
