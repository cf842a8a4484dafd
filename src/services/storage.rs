use s3::creds::Credentials;
use s3::{Bucket, Region};
use uuid::Uuid;

/// Client for the S3-compatible object store holding input images and
/// per-image detection artifacts.
pub struct ObjectStore {
    bucket: Box<Bucket>,
}

impl ObjectStore {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }

    /// Upload a blob.
    pub async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        self.bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(StorageError::S3)?;
        Ok(())
    }

    /// Download a blob.
    pub async fn download(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.bucket.get_object(key).await.map_err(StorageError::S3)?;
        Ok(response.to_vec())
    }

    /// Delete an object.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.bucket.delete_object(key).await.map_err(StorageError::S3)?;
        Ok(())
    }

    /// Check bucket reachability (for health checks).
    pub async fn health_check(&self) -> Result<(), StorageError> {
        self.bucket
            .list("health/".to_string(), Some("/".to_string()))
            .await
            .map_err(StorageError::S3)?;
        Ok(())
    }
}

/// Object-store key for the `index`-th input image of a job.
pub fn input_key(job_id: Uuid, index: usize, filename: &str) -> String {
    format!("jobs/{job_id}/input/{index:03}_{filename}")
}

/// Object-store key for the `index`-th per-image detection artifact.
pub fn result_key(job_id: Uuid, index: usize) -> String {
    format!("jobs/{job_id}/results/{index:03}.json")
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_keys_are_ordered_and_scoped_to_the_job() {
        let job_id = Uuid::nil();
        assert_eq!(
            input_key(job_id, 0, "party.jpg"),
            "jobs/00000000-0000-0000-0000-000000000000/input/000_party.jpg"
        );
        assert_eq!(
            input_key(job_id, 12, "x.png"),
            "jobs/00000000-0000-0000-0000-000000000000/input/012_x.png"
        );
    }

    #[test]
    fn result_keys_mirror_input_indices() {
        let job_id = Uuid::nil();
        assert_eq!(
            result_key(job_id, 2),
            "jobs/00000000-0000-0000-0000-000000000000/results/002.json"
        );
    }
}
