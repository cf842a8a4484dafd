use std::time::Duration;

use face_batch::{
    app_state::AppState,
    config::AppConfig,
    db,
    services::{compute::ComputeClient, detector::DetectorClient, reconcile, storage::ObjectStore},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting face-batch reconciler");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL record store");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Initialize services
    let object_store = ObjectStore::new(
        &config.s3_bucket,
        &config.s3_endpoint,
        &config.s3_access_key,
        &config.s3_secret_key,
    )
    .expect("Failed to initialize object store client");

    let compute = ComputeClient::new(
        &config.compute_endpoint,
        &config.compute_api_token,
        &config.compute_template,
    );

    let detector = DetectorClient::new(&config.detector_endpoint, &config.detector_api_token);

    let state = AppState::new(db_pool, object_store, compute, detector, config.limits());

    let mut ticker = tokio::time::interval(Duration::from_secs(config.reconcile_interval_secs));

    tracing::info!(
        interval_s = config.reconcile_interval_secs,
        "Reconciler ready, sweeping for expired leases"
    );

    loop {
        ticker.tick().await;

        match reconcile::sweep(&state).await {
            Ok(0) => tracing::debug!("Sweep complete, nothing to reclaim"),
            Ok(reclaimed) => tracing::info!(reclaimed, "Sweep complete"),
            Err(e) => tracing::error!(error = %e, "Sweep failed, will retry next interval"),
        }
    }
}
