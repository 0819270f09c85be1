//! Logging and OpenTelemetry setup for applications using the client
//!
//! The client itself only emits `tracing` events and OpenTelemetry metrics;
//! it never installs a subscriber. Applications that want output call
//! `init_observability()` once at startup.
//!
//! Two modes are supported:
//!
//! - **Local only**: no OTLP endpoint configured. Events are filtered by
//!   level and written to stdout, as JSON or human-readable text.
//! - **Export**: an OTLP endpoint is configured. Spans and metrics are also
//!   shipped to the collector over gRPC.
//!
//! # Usage Pattern
//!
//! ```rust,no_run
//! use wingrpc_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::new("inventory-ui")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("debug");
//!
//!     let _guard = wingrpc_core::init_observability(config).expect("Failed to init observability");
//!
//!     // ... run the application; telemetry is flushed when `_guard` drops ...
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector endpoint; export is off when unset
//! - `RUST_LOG`: Log level filter (e.g., "info", "wingrpc_client=debug")

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type InitError = Box<dyn std::error::Error + Send + Sync>;

/// How metrics are aggregated before export
const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Observability configuration
///
/// # Defaults
///
/// - Service name: "wingrpc"
/// - Service version: Current crate version
/// - OTLP endpoint: `OTEL_EXPORTER_OTLP_ENDPOINT`, or none (no export)
/// - Log level: `RUST_LOG`, or "info"
/// - JSON log lines: on
///
/// # Examples
///
/// ```rust
/// use wingrpc_core::ObservabilityConfig;
///
/// let config = ObservabilityConfig::new("scanner-ui")
///     .without_export()
///     .with_json_logs(false)
///     .with_log_level("wingrpc_client=debug");
///
/// assert!(config.otlp_endpoint.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to exported spans and metrics
    pub service_name: String,

    /// Service version attached to exported spans and metrics
    pub service_version: String,

    /// gRPC endpoint of an OpenTelemetry collector
    ///
    /// `None` keeps all output local.
    pub otlp_endpoint: Option<String>,

    /// Filter directive used when `RUST_LOG` is not set
    pub log_level: String,

    /// Emit log lines as JSON objects instead of plain text
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "wingrpc".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            json_logs: true,
        }
    }
}

impl ObservabilityConfig {
    /// Create a configuration with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Export spans and metrics to the given collector
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    /// Keep all telemetry local, ignoring `OTEL_EXPORTER_OTLP_ENDPOINT`
    pub fn without_export(mut self) -> Self {
        self.otlp_endpoint = None;
        self
    }

    /// Set the log level filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Choose between JSON and plain-text log lines
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Whether spans and metrics leave the process
    pub fn exports(&self) -> bool {
        self.otlp_endpoint.is_some()
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Keeps exporters alive; flushes and shuts them down on drop
///
/// Hold this for the lifetime of the application. Dropping it early stops
/// export of anything recorded afterwards.
#[must_use = "telemetry is shut down when the guard is dropped"]
#[derive(Debug, Default)]
pub struct ObservabilityGuard {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl ObservabilityGuard {
    /// Whether spans and metrics are being exported
    pub fn is_exporting(&self) -> bool {
        self.tracer_provider.is_some() || self.meter_provider.is_some()
    }
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to shut down tracer provider: {}", e);
            }
        }
        if let Some(provider) = self.meter_provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to shut down meter provider: {}", e);
            }
        }
    }
}

/// Install the global subscriber and, when configured, OTLP exporters
///
/// Must be called from within a Tokio runtime when an endpoint is configured,
/// since the exporters batch in the background.
///
/// # Errors
///
/// Fails when the log filter cannot be parsed, an exporter cannot be built,
/// or a global subscriber is already installed.
pub fn init_observability(config: ObservabilityConfig) -> Result<ObservabilityGuard, InitError> {
    let mut guard = ObservabilityGuard::default();

    let tracer = match &config.otlp_endpoint {
        Some(endpoint) => {
            let (provider, tracer) = init_tracer(&config, endpoint)?;
            guard.tracer_provider = Some(provider);
            guard.meter_provider = Some(init_metrics(&config, endpoint)?);
            Some(tracer)
        }
        None => None,
    };

    init_tracing_subscriber(&config, tracer)?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = config.otlp_endpoint.as_deref().unwrap_or("none"),
        json = config.json_logs,
        "Observability initialized"
    );

    Ok(guard)
}

fn init_tracer(
    config: &ObservabilityConfig,
    endpoint: &str,
) -> Result<(SdkTracerProvider, opentelemetry_sdk::trace::Tracer), InitError> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
        .with_id_generator(RandomIdGenerator::default())
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    global::set_tracer_provider(provider.clone());

    Ok((provider, tracer))
}

fn init_metrics(config: &ObservabilityConfig, endpoint: &str) -> Result<SdkMeterProvider, InitError> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(METRICS_EXPORT_INTERVAL)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    global::set_meter_provider(provider.clone());
    Ok(provider)
}

fn init_tracing_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<(), InitError> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let telemetry_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    let (json_layer, text_layer) = if config.json_logs {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json();
        (Some(layer), None)
    } else {
        let layer = tracing_subscriber::fmt::layer().with_target(true);
        (None, Some(layer))
    };

    tracing_subscriber::registry()
        .with(telemetry_layer)
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    Ok(())
}
