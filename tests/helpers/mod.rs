//! Test helper utilities for E2E testing

use reqwest::multipart;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

/// Minimal valid 1x1 PNG used as a stand-in input image.
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15,
    0xC4, 0x89, // 1x1, RGBA
    0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, // IDAT
    0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4,
    0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82, // IEND
];

/// Response from POST /api/v1/jobs
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: String,
    pub total_count: i32,
}

/// Response from GET /api/v1/jobs/{job_id}
#[derive(Debug, Deserialize)]
pub struct JobView {
    pub job_id: Uuid,
    pub status: String,
    pub processed_count: Option<i32>,
    pub total_count: Option<i32>,
    pub results: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Submit a batch of named images; returns the raw response so callers can
/// assert on rejection statuses too.
pub async fn submit_images(
    client: &reqwest::Client,
    base_url: &str,
    images: &[(&str, Vec<u8>)],
) -> Result<reqwest::Response, reqwest::Error> {
    let mut form = multipart::Form::new();
    for (filename, bytes) in images {
        form = form.part(
            "images",
            multipart::Part::bytes(bytes.clone()).file_name(filename.to_string()),
        );
    }

    client
        .post(format!("{base_url}/api/v1/jobs"))
        .multipart(form)
        .send()
        .await
}

/// Submit a batch and parse the accepted response.
pub async fn submit_ok(
    client: &reqwest::Client,
    base_url: &str,
    images: &[(&str, Vec<u8>)],
) -> Result<SubmitResponse, Box<dyn std::error::Error>> {
    let response = submit_images(client, base_url, images).await?;
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Submission failed with status {status}: {error_text}").into());
    }
    Ok(response.json::<SubmitResponse>().await?)
}

/// Poll job status until completed or failed (with timeout).
pub async fn poll_until_terminal(
    client: &reqwest::Client,
    base_url: &str,
    job_id: Uuid,
    timeout_secs: u64,
) -> Result<JobView, Box<dyn std::error::Error>> {
    let max_attempts = timeout_secs * 2; // Poll every 500ms

    for attempt in 0..max_attempts {
        let response = client
            .get(format!("{base_url}/api/v1/jobs/{job_id}"))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {error_text}").into());
        }

        let view = response.json::<JobView>().await?;

        match view.status.as_str() {
            "completed" | "failed" => return Ok(view),
            "submitted" | "provisioning" | "processing" => {
                if attempt % 10 == 0 && attempt > 0 {
                    println!("  ... still waiting (attempt {attempt}/{max_attempts})");
                }
                sleep(Duration::from_millis(500)).await;
            }
            other => {
                return Err(format!("Unknown job status: {other}").into());
            }
        }
    }

    Err(format!("Job did not reach a terminal state within {timeout_secs} seconds").into())
}
