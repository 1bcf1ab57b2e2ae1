//! Telemetry initialization for logging and trace export
//!
//! Provides:
//! - structured logging through `tracing-subscriber`, JSON for the webhook
//!   server and plain text for one-shot CLI commands
//! - OTLP trace export when an endpoint is configured
//! - Kubernetes resource attributes taken from the downward API environment

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info,eskube=debug,kube=info,tower=warn,hyper=warn";

/// Errors that can occur during telemetry initialization
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize the OTLP tracer
    #[error("failed to initialize tracer: {0}")]
    TracerInit(String),

    /// Failed to install the tracing subscriber
    #[error("failed to initialize tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Output format of log lines
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human readable lines
    Text,
}

/// Configuration for telemetry initialization
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to exported traces
    pub service_name: String,

    /// OTLP endpoint for trace export (e.g., "http://otel-collector:4317")
    ///
    /// If None, traces only show up in the logs.
    pub otlp_endpoint: Option<String>,

    /// Log line format
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "eskube".to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            log_format: LogFormat::Json,
        }
    }
}

/// Initialize logging and, if configured, OTLP trace export
///
/// Returns the tracer provider so the caller can flush it on shutdown.
pub fn init_telemetry(config: TelemetryConfig) -> Result<Option<TracerProvider>, TelemetryError> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let provider = match &config.otlp_endpoint {
        Some(endpoint) => Some(init_otlp_tracer(
            endpoint,
            build_resource(&config.service_name),
        )?),
        None => None,
    };
    let otel_layer = provider.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer(config.service_name.clone()))
    });

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    Ok(provider)
}

/// Build the OpenTelemetry resource describing this process
fn build_resource(service_name: &str) -> Resource {
    let mut attributes = vec![KeyValue::new(
        opentelemetry_semantic_conventions::resource::SERVICE_NAME,
        service_name.to_string(),
    )];

    for (env, key) in [
        ("POD_NAME", "k8s.pod.name"),
        ("POD_NAMESPACE", "k8s.namespace.name"),
        ("NODE_NAME", "k8s.node.name"),
    ] {
        if let Ok(value) = std::env::var(env) {
            attributes.push(KeyValue::new(key, value));
        }
    }

    attributes.push(KeyValue::new(
        opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
        env!("CARGO_PKG_VERSION"),
    ));

    Resource::new(attributes)
}

fn init_otlp_tracer(endpoint: &str, resource: Resource) -> Result<TracerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| TelemetryError::TracerInit(e.to_string()))?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(resource)
        .build();

    global::set_tracer_provider(provider.clone());

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_json() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "eskube");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_build_resource_has_service_name() {
        let resource = build_resource("eskube-webhook");
        assert!(!resource.is_empty());
        let name = resource.get(opentelemetry::Key::new(
            opentelemetry_semantic_conventions::resource::SERVICE_NAME,
        ));
        assert_eq!(name.map(|v| v.to_string()), Some("eskube-webhook".to_string()));
    }
}
