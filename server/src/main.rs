use bio_links::{
    routes,
    server::run_server,
    setup::{setup_sentry, setup_tracing},
    state::AppState,
};
use tracing::info;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // Initialize Sentry for error tracking
    let _sentry_guard = setup_sentry();

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()?
        .block_on(async { run_application().await })
}

async fn run_application() -> color_eyre::Result<()> {
    setup_tracing("bio-links")?;

    let app_state = AppState::from_env()?;
    info!(version = app_state.version(), "Starting bio-links");

    let result = run_server(routes::routes(app_state)).await;

    opentelemetry::global::shutdown_tracer_provider();
    result
}
