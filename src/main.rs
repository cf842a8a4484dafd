mod app_state;
mod config;
mod db;
mod models;
mod routes;
mod services;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use services::{compute::ComputeClient, detector::DetectorClient, storage::ObjectStore};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing face-batch server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "face_jobs_submitted_total",
        "Total batch jobs accepted at intake"
    );
    metrics::describe_counter!(
        "face_jobs_completed_total",
        "Total batch jobs that reached completed"
    );
    metrics::describe_counter!(
        "face_jobs_failed_total",
        "Total batch jobs that reached failed"
    );
    metrics::describe_counter!(
        "face_jobs_reclaimed_total",
        "Jobs reclaimed by the reconciler after lease expiry"
    );
    metrics::describe_counter!(
        "face_images_processed_total",
        "Individual images processed by workers"
    );
    metrics::describe_histogram!(
        "face_job_processing_seconds",
        "Wall-clock time a worker spent on one job"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL record store");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize object store client
    tracing::info!("Initializing object store client");
    let storage = ObjectStore::new(
        &config.s3_bucket,
        &config.s3_endpoint,
        &config.s3_access_key,
        &config.s3_secret_key,
    )
    .expect("Failed to initialize object store client");

    // Initialize compute provisioning client
    tracing::info!("Initializing compute provisioning client");
    let compute = ComputeClient::new(
        &config.compute_endpoint,
        &config.compute_api_token,
        &config.compute_template,
    );

    // Initialize face detection client
    let detector = DetectorClient::new(&config.detector_endpoint, &config.detector_api_token);

    let limits = config.limits();
    let max_body = limits.max_batch_size * limits.max_image_bytes;

    // Create shared application state
    let state = AppState::new(db_pool, storage, compute, detector, limits);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api/v1/jobs",
            post(routes::jobs::submit_job).get(routes::jobs::list_jobs),
        )
        .route("/api/v1/jobs/{job_id}", get(routes::jobs::get_job_status))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(max_body));

    tracing::info!("Starting face-batch on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
