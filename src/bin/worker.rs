use face_batch::{
    app_state::AppState,
    config::AppConfig,
    db::{self, queries},
    models::job::{FaceSummary, ImageResult, Job, JobStatus},
    services::{
        compute::ComputeClient,
        detector::{DetectorClient, DetectorError},
        storage::{self, ObjectStore, StorageError},
    },
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting face-batch worker");

    // Load configuration; the job assignment arrives through the instance
    // user-data the provisioner attached at launch.
    let config = AppConfig::from_env().expect("Failed to load configuration");
    let job_id = config
        .worker_job_id
        .expect("WORKER_JOB_ID missing from instance context");

    tracing::info!(job_id = %job_id, "Discovered job assignment");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL record store");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Initialize services
    tracing::info!("Initializing services");
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

    let handle = run_assignment(&state, job_id).await;

    // Every exit path funnels through here: the instance is released whether
    // the job completed, failed, or the lease was lost. Terminate is
    // idempotent, so overlapping with the reconciler is harmless.
    if let Some(handle) = handle {
        match state.compute.terminate(&handle).await {
            Ok(()) => tracing::info!(handle = %handle, "Worker instance terminated"),
            Err(e) => {
                tracing::error!(handle = %handle, error = %e, "Self-termination failed")
            }
        }
    }
}

/// Own the processing phase end-to-end. Returns the instance handle to
/// release on the way out, if the record still knew it.
async fn run_assignment(state: &AppState, job_id: Uuid) -> Option<String> {
    let job = match queries::get_job(&state.db, job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            tracing::error!(job_id = %job_id, "Assigned job does not exist");
            return None;
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Failed to fetch assigned job");
            return None;
        }
    };

    let handle = job.worker_handle.clone();

    // Claim the processing phase. Losing this CAS means the record was
    // already reclaimed as abandoned; stand down without further writes.
    match queries::start_processing(&state.db, job_id, state.limits.lease_ttl_secs).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(job_id = %job_id, "Assignment already reclaimed, standing down");
            return handle;
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Failed to claim processing phase");
            return handle;
        }
    }

    tracing::info!(
        job_id = %job_id,
        total_count = job.total_count,
        "Processing started"
    );

    let started = std::time::Instant::now();

    match process_inputs(state, &job).await {
        Ok(Outcome::Done) => match queries::complete_job(&state.db, job_id).await {
            Ok(true) => {
                metrics::counter!("face_jobs_completed_total").increment(1);
                metrics::histogram!("face_job_processing_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    job_id = %job_id,
                    elapsed_s = started.elapsed().as_secs(),
                    "Job completed"
                );
            }
            Ok(false) => {
                tracing::warn!(job_id = %job_id, "Job reclaimed before completion could be recorded")
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to record completion")
            }
        },
        Ok(Outcome::LeaseLost) => {
            tracing::warn!(job_id = %job_id, "Lease lost mid-processing, standing down");
        }
        Err(e) => {
            // Fail-fast: one bad image fails the whole job, with the error
            // context recorded for the polling client.
            tracing::error!(job_id = %job_id, error = %e, "Processing failed, failing job");
            metrics::counter!("face_jobs_failed_total").increment(1);
            match queries::fail_job(&state.db, job_id, JobStatus::Processing, &e.to_string()).await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(job_id = %job_id, "Job reclaimed before failure could be recorded")
                }
                Err(db_err) => {
                    tracing::error!(job_id = %job_id, error = %db_err, "Failed to record job failure")
                }
            }
        }
    }

    handle
}

enum Outcome {
    Done,
    LeaseLost,
}

/// Per-image loop: download, detect, persist the artifact, record progress.
/// Each progress write doubles as the lease heartbeat.
async fn process_inputs(state: &AppState, job: &Job) -> Result<Outcome, WorkerError> {
    for (index, input_key) in job.input_keys.iter().enumerate() {
        tracing::debug!(job_id = %job.id, input = %input_key, "Downloading image");
        let image = state
            .storage
            .download(input_key)
            .await
            .map_err(|e| WorkerError::Storage {
                key: input_key.clone(),
                source: e,
            })?;

        let detection =
            state
                .detector
                .detect(&image)
                .await
                .map_err(|e| WorkerError::Detector {
                    key: input_key.clone(),
                    source: e,
                })?;

        // The full artifact (embeddings included) goes to the object store;
        // the job record keeps only counts, boxes, and the artifact key.
        let artifact_key = storage::result_key(job.id, index);
        let artifact = serde_json::to_vec(&detection).map_err(WorkerError::Serialize)?;
        state
            .storage
            .upload(&artifact_key, &artifact, "application/json")
            .await
            .map_err(|e| WorkerError::Storage {
                key: artifact_key.clone(),
                source: e,
            })?;

        let result = ImageResult {
            face_count: detection.faces.len() as u32,
            embedding_key: artifact_key,
            faces: detection
                .faces
                .iter()
                .map(|f| FaceSummary { bbox: f.bbox })
                .collect(),
        };
        let result_value = serde_json::to_value(&result).map_err(WorkerError::Serialize)?;

        let recorded = queries::record_image_result(
            &state.db,
            job.id,
            input_key,
            &result_value,
            state.limits.lease_ttl_secs,
        )
        .await?;

        if !recorded {
            return Ok(Outcome::LeaseLost);
        }

        metrics::counter!("face_images_processed_total").increment(1);
        tracing::info!(
            job_id = %job.id,
            input = %input_key,
            faces = result.face_count,
            progress = index + 1,
            "Image processed"
        );
    }

    Ok(Outcome::Done)
}

#[derive(Debug, thiserror::Error)]
enum WorkerError {
    #[error("storage error on `{key}`: {source}")]
    Storage { key: String, source: StorageError },

    #[error("detection failed on `{key}`: {source}")]
    Detector { key: String, source: DetectorError },

    #[error("record store error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode detection artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}
