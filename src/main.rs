use anyhow::Context;
use cloudy::api::{self, app_state::AppState};
use cloudy::config::loader::ConfigLoader;
use cloudy::observability::{ChatMetrics, ObservabilityState, create_observability_router, init_tracing};
use cloudy::providers::{Capabilities, capabilities::log_startup_banner};
use cloudy::services::create_orchestrator;
use cloudy::storage::{SessionStore, UserMemory};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load().context("failed to load configuration")?;
    ConfigLoader::validate(&config).context("invalid configuration")?;

    let _log_guard = init_tracing(&config.logging).context("failed to initialise logging")?;
    info!("Starting {} ({})...", config.app_name, config.environment);

    let capabilities = Arc::new(Capabilities::resolve(&config));
    log_startup_banner(&config, &capabilities).await;

    let sessions = Arc::new(SessionStore::new(config.orchestrator.history_limit));
    let memory = Arc::new(UserMemory::new());
    let metrics = Arc::new(ChatMetrics::default());
    info!(
        history_limit = config.orchestrator.history_limit,
        "Session store initialized"
    );

    let orchestrator = create_orchestrator(
        &config,
        &capabilities,
        sessions.clone(),
        memory,
        metrics.clone(),
    );
    info!(?orchestrator, "Orchestrator initialized");

    let app_state = AppState::new(orchestrator, sessions.clone(), metrics.clone());

    let observability_state = Arc::new(ObservabilityState::new(
        env!("CARGO_PKG_VERSION"),
        metrics,
        capabilities,
        sessions,
    ));
    let api_router = api::create_router(app_state);
    let router = create_observability_router(observability_state).merge(api_router);
    info!("API router created with observability endpoints");

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
