use anyhow::Result;
use opentelemetry::{trace::TracerProvider, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace::TracerProvider as SdkTracerProvider, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ServiceConfig;

/// Configuration for telemetry initialization
pub struct TelemetryConfig {
    pub service_name: String,
    pub otel_endpoint: String,
    pub otel_enabled: bool,
    pub log_level: String,
}

impl From<&ServiceConfig> for TelemetryConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            service_name: config.service_name.clone(),
            otel_endpoint: config.otel_endpoint.clone(),
            otel_enabled: config.otel_enabled,
            log_level: config.log_level.clone(),
        }
    }
}

/// Installs the global subscriber: JSON logs always, OTLP span export when enabled.
///
/// `RUST_LOG` takes precedence over the configured log level. Returns the
/// tracer provider so pending spans can be flushed on exit.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<Option<SdkTracerProvider>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_span_list(true)
        .with_current_span(true);

    if !config.otel_enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
        return Ok(None);
    }

    let resource = Resource::new(vec![KeyValue::new(
        "service.name",
        config.service_name.clone(),
    )]);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otel_endpoint)
        .build()?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(resource)
        .build();

    let tracer = tracer_provider.tracer("device-forwarder");
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    Ok(Some(tracer_provider))
}

/// Flushes and shuts down span export, if it was enabled.
pub fn shutdown_telemetry(tracer_provider: Option<SdkTracerProvider>) {
    if let Some(provider) = tracer_provider {
        if let Err(e) = provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {:?}", e);
        }
    }
}
