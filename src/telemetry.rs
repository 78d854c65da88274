use anyhow::{Context, Result};
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, Resource};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::Config;

static OTLP_EXPORTING: AtomicBool = AtomicBool::new(false);
static SUBSCRIBER_READY: AtomicBool = AtomicBool::new(false);

/// Telemetry configuration structure
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    pub environment: String,
    pub otlp_endpoint: Option<String>,
    pub enable_tracing: bool,
    pub export_timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: env!("CARGO_PKG_NAME").to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: std::env::var("DEPLOYMENT_ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            enable_tracing: std::env::var("OTEL_TRACES_ENABLED")
                .map(|v| v.parse().unwrap_or(true))
                .unwrap_or(true),
            export_timeout: Duration::from_secs(30),
        }
    }
}

impl TelemetryConfig {
    /// Service identity taken from the application config, exporter settings from the environment.
    pub fn for_app(config: &Config) -> Self {
        Self {
            environment: format!("{:?}", config.app.environment).to_lowercase(),
            ..Self::default()
        }
    }
}

/// Telemetry handles for graceful shutdown
pub struct TelemetryHandles {
    _config: TelemetryConfig,
}

impl TelemetryHandles {
    /// Flushes pending spans and shuts the exporter down.
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down telemetry providers...");
        if OTLP_EXPORTING.swap(false, Ordering::SeqCst) {
            // The batch exporter blocks while flushing.
            tokio::task::spawn_blocking(global::shutdown_tracer_provider)
                .await
                .context("Telemetry shutdown task panicked")?;
        }
        info!("Telemetry providers shutdown completed");
        Ok(())
    }
}

/// Installs the log subscriber and, when an endpoint is configured, the OTLP span exporter.
pub async fn init_telemetry(config: Option<TelemetryConfig>) -> Result<TelemetryHandles> {
    let config = config.unwrap_or_default();

    setup_tracing_subscriber()?;
    info!(
        "Initializing telemetry for service: {} v{} in environment: {}",
        config.service_name, config.service_version, config.environment
    );

    if config.enable_tracing {
        let resource = create_resource(&config);
        init_tracing(&config, &resource)?;
    }

    info!("Telemetry initialization completed successfully");
    Ok(TelemetryHandles { _config: config })
}

fn create_resource(config: &TelemetryConfig) -> Resource {
    Resource::new(vec![
        KeyValue::new("service.name", config.service_name.clone()),
        KeyValue::new("service.version", config.service_version.clone()),
        KeyValue::new("deployment.environment", config.environment.clone()),
    ])
}

fn init_tracing(config: &TelemetryConfig, resource: &Resource) -> Result<()> {
    let Some(endpoint) = &config.otlp_endpoint else {
        info!("No OTLP endpoint configured, using console-only tracing");
        return Ok(());
    };

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint)
                .with_timeout(config.export_timeout),
        )
        .with_trace_config(
            opentelemetry_sdk::trace::config()
                .with_resource(resource.clone())
                .with_sampler(opentelemetry_sdk::trace::Sampler::AlwaysOn),
        )
        .install_batch(runtime::Tokio)
        .context("Failed to initialize OTLP tracer")?;

    OTLP_EXPORTING.store(true, Ordering::SeqCst);
    info!(endpoint = %endpoint, "Distributed tracing initialized with OTLP exporter");
    Ok(())
}

fn setup_tracing_subscriber() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into());

    Registry::default()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    SUBSCRIBER_READY.store(true, Ordering::SeqCst);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TelemetryHealth {
    pub subscriber: bool,
    pub otlp_exporter: bool,
}

pub fn telemetry_health_check() -> TelemetryHealth {
    TelemetryHealth {
        subscriber: SUBSCRIBER_READY.load(Ordering::SeqCst),
        otlp_exporter: OTLP_EXPORTING.load(Ordering::SeqCst),
    }
}
