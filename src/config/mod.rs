use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string for the job record store
    pub database_url: String,

    /// Object-store bucket holding input images and result artifacts
    pub s3_bucket: String,

    /// S3-compatible endpoint URL
    pub s3_endpoint: String,

    /// Object-store access key ID
    pub s3_access_key: String,

    /// Object-store secret access key
    pub s3_secret_key: String,

    /// Compute provisioning API base URL
    pub compute_endpoint: String,

    /// Compute provisioning API token
    pub compute_api_token: String,

    /// Instance template used for every worker (GPU machine image)
    pub compute_template: String,

    /// Face detection service base URL
    pub detector_endpoint: String,

    /// Face detection service API token
    pub detector_api_token: String,

    /// Maximum number of images per submission
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Maximum size of a single image in bytes
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,

    /// How long a job may sit in submitted/provisioning before its lease expires
    #[serde(default = "default_provisioning_timeout_secs")]
    pub provisioning_timeout_secs: u64,

    /// Lease window the worker must refresh through progress writes
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,

    /// Interval between reconciler sweeps
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// Job assignment for the worker binary, injected via instance user-data.
    /// Unset for the server and reconciler processes.
    pub worker_job_id: Option<Uuid>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_batch_size() -> usize {
    16
}

fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_provisioning_timeout_secs() -> u64 {
    600
}

fn default_lease_ttl_secs() -> u64 {
    300
}

fn default_reconcile_interval_secs() -> u64 {
    60
}

/// Submission and lease bounds shared with request handlers and the worker.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_batch_size: usize,
    pub max_image_bytes: usize,
    pub provisioning_timeout_secs: u64,
    pub lease_ttl_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_batch_size: self.max_batch_size,
            max_image_bytes: self.max_image_bytes,
            provisioning_timeout_secs: self.provisioning_timeout_secs,
            lease_ttl_secs: self.lease_ttl_secs,
        }
    }
}
