use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::job::{Job, JobStatus};

/// One image extracted from the multipart submission.
#[derive(Debug, Validate)]
pub struct ImageUpload {
    #[garde(length(min = 1, max = 255))]
    pub filename: String,

    #[garde(skip)]
    pub bytes: Vec<u8>,
}

/// Response after submitting a batch of images.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total_count: i32,
}

/// Status view returned by the query endpoint. Which fields are present
/// depends on the job's status: in-flight jobs expose progress counters,
/// completed jobs expose results, failed jobs expose the diagnostic.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobView {
    pub fn from_job(job: &Job) -> Self {
        let mut view = JobView {
            job_id: job.id,
            status: job.status,
            processed_count: None,
            total_count: None,
            results: None,
            error: None,
        };

        match job.status {
            JobStatus::Submitted | JobStatus::Provisioning | JobStatus::Processing => {
                view.processed_count = Some(job.processed_count);
                view.total_count = Some(job.total_count);
            }
            JobStatus::Completed => {
                view.results = Some(job.results.clone());
            }
            JobStatus::Failed => {
                view.error = job.error.clone();
            }
        }

        view
    }
}

/// Compact per-job entry for the recent-jobs listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub processed_count: i32,
    pub total_count: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl JobSummary {
    pub fn from_job(job: &Job) -> Self {
        JobSummary {
            job_id: job.id,
            status: job.status,
            processed_count: job.processed_count,
            total_count: job.total_count,
            created_at: job.created_at,
        }
    }
}
