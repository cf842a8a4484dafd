use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::api::{ImageUpload, JobSummary, JobView, SubmitResponse};
use crate::routes::ApiError;
use crate::services::{provisioner, storage, validation};

/// POST /api/v1/jobs — submit a batch of images for face detection.
///
/// The whole batch is validated and durably stored before the job record
/// exists, so a failed submission never leaves an orphaned record behind.
/// Provisioning runs detached; the caller gets the job id immediately.
pub async fn submit_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let mut images: Vec<ImageUpload> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        // Non-file fields are ignored.
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?;
        images.push(ImageUpload {
            filename,
            bytes: bytes.to_vec(),
        });
    }

    validation::validate_batch(&images, &state.limits)?;

    let job_id = Uuid::new_v4();

    let mut input_keys = Vec::with_capacity(images.len());
    for (index, upload) in images.iter().enumerate() {
        let key = storage::input_key(job_id, index, &upload.filename);
        state
            .storage
            .upload(&key, &upload.bytes, validation::content_type(&upload.bytes))
            .await?;
        input_keys.push(key);
    }

    let job = queries::create_job(
        &state.db,
        job_id,
        &input_keys,
        state.limits.provisioning_timeout_secs,
    )
    .await?;

    metrics::counter!("face_jobs_submitted_total").increment(1);
    tracing::info!(job_id = %job_id, total_count = job.total_count, "Job submitted");

    tokio::spawn(provisioner::provision_detached(state.clone(), job_id));

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: job.status,
            total_count: job.total_count,
        }),
    ))
}

/// GET /api/v1/jobs/{job_id} — status view for polling clients.
///
/// Strictly read-only: a client polling at any frequency never touches the
/// worker's lease, so frequent polling cannot mask a dead worker.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobView>, ApiError> {
    let job = queries::get_job(&state.db, job_id)
        .await?
        .ok_or(ApiError::NotFound(job_id))?;

    Ok(Json(JobView::from_job(&job)))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_list_limit")]
    pub limit: i64,
}

fn default_list_limit() -> i64 {
    10
}

/// GET /api/v1/jobs — recent jobs, newest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<JobSummary>>, ApiError> {
    let limit = params.limit.clamp(1, 100);
    let jobs = queries::list_recent_jobs(&state.db, limit).await?;
    Ok(Json(jobs.iter().map(JobSummary::from_job).collect()))
}
