//! Observability wiring.
//!
//! Installs one global `tracing` subscriber:
//!
//! - an `EnvFilter` from `RUST_LOG`, falling back to `[telemetry].log_filter`;
//! - a JSON or pretty formatter writing to stderr (stdout carries results);
//! - when `[telemetry].otlp_endpoint` is set, an OpenTelemetry layer that
//!   batches spans to an OTLP/gRPC collector.

use anyhow::Context;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::TracerProvider;
use opentelemetry_sdk::{runtime, Resource};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{LogFormat, TelemetryConfig};

const SERVICE_NAME: &str = "contentgen";

/// Handle that flushes exporters on shutdown.
#[must_use = "dropping the handle without calling shutdown loses buffered spans"]
pub struct Telemetry {
    tracer_provider: Option<TracerProvider>,
}

impl Telemetry {
    /// Flushes and stops the span exporter, if one is running.
    pub fn shutdown(self) {
        if let Some(provider) = self.tracer_provider {
            if let Err(err) = provider.shutdown() {
                eprintln!("failed to shut down OTLP exporter: {err}");
            }
        }
    }
}

/// Installs the global subscriber.
pub fn init(config: &TelemetryConfig) -> anyhow::Result<Telemetry> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter)
            .with_context(|| format!("invalid log filter '{}'", config.log_filter))?,
    };

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => fmt::layer().with_target(true).with_writer(std::io::stderr).boxed(),
    };

    let tracer_provider = config
        .otlp_endpoint
        .as_deref()
        .map(otlp_tracer_provider)
        .transpose()?;
    let otel_layer = tracer_provider
        .as_ref()
        .map(|provider| tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME)));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(otel_layer)
        .with(filter)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(Telemetry { tracer_provider })
}

fn otlp_tracer_provider(endpoint: &str) -> anyhow::Result<TracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .with_context(|| format!("failed to build OTLP exporter for {endpoint}"))?;
    Ok(TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new([KeyValue::new("service.name", SERVICE_NAME)]))
        .build())
}
