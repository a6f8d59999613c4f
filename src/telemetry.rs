//! Logging and optional OpenTelemetry export

use anyhow::{Context, Result};
use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{LogExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;

const SERVICE_NAME: &str = "solarcast";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Flushes exporters when dropped at the end of `main`
#[derive(Default)]
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
    logger_provider: Option<SdkLoggerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shut down tracer provider: {e}");
        }
        if let Some(provider) = self.logger_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shut down logger provider: {e}");
        }
    }
}

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level '{}'", config.level))?,
    };
    // exporter traffic must not feed back into itself
    Ok(filter
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("opentelemetry=warn".parse()?))
}

fn fmt_layer(config: &LoggingConfig) -> BoxedLayer {
    match config.format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().boxed(),
        _ => tracing_subscriber::fmt::layer().pretty().boxed(),
    }
}

fn resource() -> Resource {
    Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_attribute(KeyValue::new(SERVICE_VERSION, crate::VERSION))
        .build()
}

fn otlp_providers(endpoint: &str) -> Result<(SdkTracerProvider, SdkLoggerProvider)> {
    let endpoint = endpoint.trim_end_matches('/');

    let span_exporter = SpanExporter::builder()
        .with_http()
        .with_endpoint(format!("{endpoint}/v1/traces"))
        .build()
        .with_context(|| "Failed to create OTLP span exporter")?;
    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(span_exporter)
        .with_resource(resource())
        .build();

    let log_exporter = LogExporter::builder()
        .with_http()
        .with_endpoint(format!("{endpoint}/v1/logs"))
        .build()
        .with_context(|| "Failed to create OTLP log exporter")?;
    let logger_provider = SdkLoggerProvider::builder()
        .with_batch_exporter(log_exporter)
        .with_resource(resource())
        .build();

    Ok((tracer_provider, logger_provider))
}

/// Install the global subscriber; keep the guard alive until shutdown
pub fn init(config: &LoggingConfig) -> Result<TelemetryGuard> {
    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(config)];
    let mut guard = TelemetryGuard::default();

    if let Some(endpoint) = config.otlp_endpoint.as_deref() {
        let (tracer_provider, logger_provider) = otlp_providers(endpoint)?;
        let tracer = tracer_provider.tracer(SERVICE_NAME);
        layers.push(tracing_opentelemetry::layer().with_tracer(tracer).boxed());
        layers.push(OpenTelemetryTracingBridge::new(&logger_provider).boxed());
        guard.tracer_provider = Some(tracer_provider);
        guard.logger_provider = Some(logger_provider);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter(config)?)
        .try_init()
        .with_context(|| "Failed to install tracing subscriber")?;

    if let Some(endpoint) = &config.otlp_endpoint {
        tracing::info!("Exporting traces and logs to {}", endpoint);
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_accepts_configured_level() {
        let config = LoggingConfig {
            level: "solarcast=debug,info".to_string(),
            ..LoggingConfig::default()
        };
        assert!(env_filter(&config).is_ok());
    }

    #[test]
    fn test_guard_without_exporters_drops_cleanly() {
        drop(TelemetryGuard::default());
    }
}
