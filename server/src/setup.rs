use std::collections::HashMap;

use color_eyre::eyre::WrapErr;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Start Sentry when `SENTRY_DSN` is configured. Keep the guard alive for the whole
/// process so queued events are flushed on exit.
pub fn setup_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok()?;

    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: Some(env!("VERGEN_GIT_SHA").into()),
            traces_sample_rate: 1.0,
            ..Default::default()
        },
    )))
}

fn honeycomb_tracer(
    api_key: String,
    service_name: &str,
) -> color_eyre::Result<opentelemetry_sdk::trace::Tracer> {
    let mut headers = HashMap::new();
    headers.insert("x-honeycomb-team".to_string(), api_key);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .http()
                .with_endpoint("https://api.honeycomb.io")
                .with_headers(headers),
        )
        .with_trace_config(opentelemetry_sdk::trace::config().with_resource(
            opentelemetry_sdk::Resource::new(vec![KeyValue::new(
                "service.name",
                service_name.to_string(),
            )]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio)
        .wrap_err("Failed to install OTLP tracer")?;

    Ok(tracer)
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr as an indented tree. Spans are also exported to Honeycomb
/// when `HONEYCOMB_API_KEY` is set.
pub fn setup_tracing(service_name: &str) -> color_eyre::Result<()> {
    let rust_log = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,bio_links=debug,tower_http=debug".to_string());
    let env_filter = EnvFilter::builder()
        .parse(&rust_log)
        .wrap_err("Couldn't parse RUST_LOG")?;

    let tracer = match std::env::var("HONEYCOMB_API_KEY") {
        Ok(api_key) => Some(honeycomb_tracer(api_key, service_name)?),
        Err(_) => None,
    };
    let otel_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    let tree_layer = tracing_tree::HierarchicalLayer::new(2)
        .with_targets(true)
        .with_bracketed_fields(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer)
        .with(tree_layer)
        .try_init()
        .wrap_err("Failed to install tracing subscriber")?;

    Ok(())
}
