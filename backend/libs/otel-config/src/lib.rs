//! OpenTelemetry configuration shared by both services
//!
//! Sets up the OTLP pipeline and the tracing-subscriber stack, and provides
//! the string-map carrier used to pass trace context through queue message
//! attributes (API injects at enqueue, worker extracts at receive).

use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    runtime,
    trace::{BatchConfigBuilder, RandomIdGenerator, Sampler},
    Resource,
};
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod config;
pub mod propagation;

pub use config::TracingConfig;
pub use propagation::{extract_trace_context, inject_trace_context};

/// Initialize tracing for a service.
///
/// With tracing disabled, only the fmt subscriber is installed. With it
/// enabled, an OTLP batch exporter is added and `TraceContextPropagator`
/// becomes the global propagator so queue-attribute carriers line up on
/// both sides of the queue.
pub fn init_tracing(
    service_name: &str,
    config: &TracingConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if !config.enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
        tracing::info!(service = service_name, "tracing initialized without exporter");
        return Ok(());
    }

    global::set_text_map_propagator(TraceContextPropagator::new());

    let resource = Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", config.service_version.clone()),
        KeyValue::new("deployment.environment", config.environment.clone()),
    ]);

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(config.otlp_endpoint.clone());

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::config()
                .with_sampler(Sampler::TraceIdRatioBased(config.sample_rate))
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(resource),
        )
        .with_batch_config(
            BatchConfigBuilder::default()
                .with_max_queue_size(2048)
                .with_max_export_batch_size(512)
                .with_scheduled_delay(Duration::from_millis(5000))
                .build(),
        )
        .install_batch(runtime::Tokio)?;

    let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true))
        .with(telemetry_layer)
        .init();

    tracing::info!(
        service = service_name,
        endpoint = %config.otlp_endpoint,
        sample_rate = config.sample_rate,
        "OpenTelemetry tracing initialized"
    );

    Ok(())
}

/// Flush pending spans before process exit.
pub fn shutdown_tracing() {
    global::shutdown_tracer_provider();
}
