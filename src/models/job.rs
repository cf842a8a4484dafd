use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a batch job. Transitions are forward-only; `Failed` is
/// reachable from any non-terminal state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Submitted,
    Provisioning,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Terminal states accept no further writes.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether a direct transition `self -> next` is allowed.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Submitted, JobStatus::Provisioning) => true,
            (JobStatus::Provisioning, JobStatus::Processing) => true,
            (JobStatus::Processing, JobStatus::Completed) => true,
            (from, JobStatus::Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// A batch face-detection job as persisted in the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    /// Object-store keys of the submitted images, in submission order.
    pub input_keys: Vec<String>,
    pub total_count: i32,
    pub processed_count: i32,
    /// Map of input key -> `ImageResult`, populated incrementally by the
    /// worker and final only once the job is `Completed`.
    pub results: serde_json::Value,
    /// Handle of the provisioned compute instance, set once by the
    /// provisioner and cleared when the worker releases it.
    pub worker_handle: Option<String>,
    /// Deadline by which the worker must show progress or be presumed dead.
    pub lease_expiry: DateTime<Utc>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-image outcome recorded into the job's `results` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageResult {
    /// Number of faces the detector found in the image.
    pub face_count: u32,
    /// Object-store key of the full detection artifact (embeddings included).
    pub embedding_key: String,
    /// Bounding boxes of the detected faces, `[x1, y1, x2, y2]`.
    pub faces: Vec<FaceSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceSummary {
    pub bbox: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const ALL: [JobStatus; 5] = [
        JobStatus::Submitted,
        JobStatus::Provisioning,
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    #[test]
    fn status_round_trips_through_strings() {
        for status in ALL {
            let s = status.to_string();
            assert_eq!(JobStatus::from_str(&s).unwrap(), status);
        }
        assert_eq!(JobStatus::Provisioning.to_string(), "provisioning");
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for next in ALL {
            assert!(!JobStatus::Completed.can_transition_to(next));
            assert!(!JobStatus::Failed.can_transition_to(next));
        }
    }

    #[test]
    fn failed_reachable_from_any_non_terminal_state() {
        assert!(JobStatus::Submitted.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Provisioning.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
    }

    #[test]
    fn forward_path_is_linear() {
        assert!(JobStatus::Submitted.can_transition_to(JobStatus::Provisioning));
        assert!(JobStatus::Provisioning.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        // No skipping ahead or moving backwards.
        assert!(!JobStatus::Submitted.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Provisioning));
        assert!(!JobStatus::Submitted.can_transition_to(JobStatus::Completed));
    }
}
