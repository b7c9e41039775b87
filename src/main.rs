use std::sync::Arc;

use rider_core::api;
use rider_core::backend::{BackendClient, FileTokenStore, StaticTokenStore, TokenStore};
use rider_core::config::Config;
use rider_core::error::AppError;
use rider_core::estimator::DistanceEstimator;
use rider_core::observability::metrics::Metrics;
use rider_core::state::AppState;
use rider_core::tracking::{SimulatedLocationProvider, TrackingService};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let token_store: Arc<dyn TokenStore> = match &config.auth_token_file {
        Some(path) => Arc::new(FileTokenStore::new(path)),
        None => Arc::new(StaticTokenStore::new(config.auth_token.clone())),
    };
    let backend = Arc::new(BackendClient::new(config.api_base_url.clone(), token_store));

    let metrics = Metrics::new();
    let estimator = Arc::new(DistanceEstimator::new(backend.clone(), metrics.clone()));

    let provider = Arc::new(SimulatedLocationProvider::new(config.simulated_position));
    let tracker = Arc::new(TrackingService::new(
        provider,
        backend.clone(),
        config.tracking(),
        config.event_buffer_size,
        metrics.clone(),
    ));

    let app_state = Arc::new(AppState::new(estimator, tracker.clone(), metrics));
    let app = api::rest::router(app_state);

    let bind_addr = format!("127.0.0.1:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        api_base_url = %backend.base_url(),
        "rider core listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    tracker.shutdown().await;
    tracing::info!("tracking stopped; exiting");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
