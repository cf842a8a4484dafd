use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client for the compute provisioning API that launches and terminates
/// the ephemeral GPU instances backing each job.
pub struct ComputeClient {
    http: Client,
    endpoint: String,
    api_token: String,
    template: String,
}

#[derive(Serialize)]
struct LaunchRequest<'a> {
    template: &'a str,
    user_data: String,
    tags: LaunchTags,
}

#[derive(Serialize)]
struct LaunchTags {
    name: String,
    job: String,
    purpose: &'static str,
}

#[derive(Deserialize)]
struct LaunchResponse {
    instance_id: String,
}

#[derive(Debug, Deserialize)]
pub struct InstanceInfo {
    pub state: String,
}

impl ComputeClient {
    pub fn new(endpoint: &str, api_token: &str, template: &str) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            template: template.to_string(),
        }
    }

    /// Launch one instance from the configured template, tagged with the job
    /// it serves. The job assignment rides along as instance user-data so the
    /// worker can self-discover it without a callback.
    pub async fn launch(&self, job_id: Uuid) -> Result<String, ComputeError> {
        let body = LaunchRequest {
            template: &self.template,
            user_data: worker_user_data(job_id),
            tags: LaunchTags {
                name: format!("face-batch-{job_id}"),
                job: job_id.to_string(),
                purpose: "face-detection",
            },
        };

        let response = self
            .http
            .post(format!("{}/v1/instances", self.endpoint))
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(ComputeError::Http)?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let launched: LaunchResponse = response.json().await.map_err(ComputeError::Http)?;
        Ok(launched.instance_id)
    }

    /// Describe a running instance.
    pub async fn describe(&self, handle: &str) -> Result<InstanceInfo, ComputeError> {
        let response = self
            .http
            .get(format!("{}/v1/instances/{handle}", self.endpoint))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(ComputeError::Http)?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        response.json().await.map_err(ComputeError::Http)
    }

    /// Terminate an instance. Idempotent: terminating an already-terminated
    /// or unknown handle is a no-op success, since the reconciler and the
    /// worker's self-termination can overlap.
    pub async fn terminate(&self, handle: &str) -> Result<(), ComputeError> {
        let response = self
            .http
            .delete(format!("{}/v1/instances/{handle}", self.endpoint))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(ComputeError::Http)?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(()),
            _ => Err(api_error(response).await),
        }
    }
}

async fn api_error(response: reqwest::Response) -> ComputeError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    ComputeError::Api { status, message }
}

/// Instance user-data carrying the job assignment, base64-encoded per the
/// compute API contract. The worker's config picks `WORKER_JOB_ID` up from
/// its environment at boot.
pub fn worker_user_data(job_id: Uuid) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!("WORKER_JOB_ID={job_id}\n"))
}

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("compute API returned {status}: {message}")]
    Api { status: u16, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_data_carries_the_assignment() {
        let job_id = Uuid::new_v4();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(worker_user_data(job_id))
            .unwrap();
        assert_eq!(
            String::from_utf8(decoded).unwrap(),
            format!("WORKER_JOB_ID={job_id}\n")
        );
    }

    #[test]
    fn launch_request_serializes_the_template_and_tags() {
        let job_id = Uuid::nil();
        let body = LaunchRequest {
            template: "gpu-g4dn-xlarge",
            user_data: worker_user_data(job_id),
            tags: LaunchTags {
                name: format!("face-batch-{job_id}"),
                job: job_id.to_string(),
                purpose: "face-detection",
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["template"], "gpu-g4dn-xlarge");
        assert_eq!(json["tags"]["purpose"], "face-detection");
        assert_eq!(json["tags"]["job"], job_id.to_string());
    }
}
