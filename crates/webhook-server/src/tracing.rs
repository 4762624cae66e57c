use anyhow::{Result, anyhow};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config;

/// Setup the tracing system. This MUST be done inside of a tokio Runtime
/// because some collectors rely on it and would panic otherwise.
///
/// When the `otlp` format is used, the returned provider must be shut down
/// before exiting to flush the pending spans.
pub fn setup_tracing(
    log_level: &str,
    log_fmt: &str,
    log_no_color: bool,
) -> Result<Option<SdkTracerProvider>> {
    // some of our dependencies generate trace events too, but we don't care about them ->
    // let's filter them
    let filter_layer = EnvFilter::new(log_level)
        .add_directive("h2=off".parse()?)
        .add_directive("hyper=off".parse()?)
        .add_directive("rustls=off".parse()?)
        .add_directive("tonic=off".parse()?)
        .add_directive("tower=off".parse()?);

    let tracer_provider = match log_fmt {
        "json" => {
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt::layer().json())
                .try_init()?;
            None
        }
        "text" => {
            let fmt_layer = fmt::layer().with_ansi(!log_no_color);

            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt_layer)
                .try_init()?;
            None
        }
        "otlp" => {
            // Send the spans to an OpenTelemetry collector using the OTLP format.
            // The collector must run on localhost (eg: use a sidecar inside of k8s)
            // using GRPC
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .build()?;
            let tracer_provider = SdkTracerProvider::builder()
                .with_resource(
                    Resource::builder()
                        .with_service_name(config::SERVICE_NAME)
                        .build(),
                )
                .with_batch_exporter(exporter)
                .build();
            let tracer = tracer_provider.tracer(config::SERVICE_NAME);
            opentelemetry::global::set_tracer_provider(tracer_provider.clone());

            let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(telemetry)
                .with(fmt::layer())
                .try_init()?;
            Some(tracer_provider)
        }

        _ => return Err(anyhow!("Unknown log message format")),
    };

    Ok(tracer_provider)
}
