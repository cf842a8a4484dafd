//! End-to-end tests against a running deployment
//!
//! These tests require:
//! 1. PostgreSQL running (with migrations applied)
//! 2. API server running on the configured port
//! 3. Object store, compute API, and detection service reachable
//! 4. A worker path that actually executes (for the full-lifecycle test)
//!
//! Run with: cargo test --test e2e_test -- --ignored --nocapture
//!
//! Set API_BASE_URL to override default (http://localhost:3000)

mod helpers;

use helpers::*;
use uuid::Uuid;

/// Get base URL from env or default to localhost
fn get_base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

#[tokio::test]
#[ignore] // Requires running API server
async fn test_e2e_health_check() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{base_url}/health"))
        .send()
        .await
        .expect("Health check failed");

    assert!(
        response.status().is_success(),
        "Health check returned non-success status: {}",
        response.status()
    );
}

#[tokio::test]
#[ignore] // Requires running API server
async fn test_e2e_rejects_empty_batch() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    let response = submit_images(&client, &base_url, &[])
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
#[ignore] // Requires running API server
async fn test_e2e_rejects_unsupported_format() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    let batch = [
        ("good.png", TINY_PNG.to_vec()),
        ("bad.txt", b"definitely not an image".to_vec()),
    ];
    let response = submit_images(&client, &base_url, &batch)
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 422);

    let body = response.text().await.expect("Body read failed");
    assert!(
        body.contains("bad.txt"),
        "rejection must name the offending entry: {body}"
    );
}

#[tokio::test]
#[ignore] // Requires running API server
async fn test_e2e_unknown_job_is_not_found() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{base_url}/api/v1/jobs/{}", Uuid::new_v4()))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
#[ignore] // Requires full infrastructure including a live worker path
async fn test_e2e_full_lifecycle() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    let batch = [
        ("one.png", TINY_PNG.to_vec()),
        ("two.png", TINY_PNG.to_vec()),
        ("three.png", TINY_PNG.to_vec()),
    ];
    let submitted = submit_ok(&client, &base_url, &batch)
        .await
        .expect("Submission failed");

    assert_eq!(submitted.status, "submitted");
    assert_eq!(submitted.total_count, 3);

    let terminal = poll_until_terminal(&client, &base_url, submitted.job_id, 900)
        .await
        .expect("Polling failed");

    match terminal.status.as_str() {
        "completed" => {
            let results = terminal.results.expect("completed view must carry results");
            let map = results.as_object().expect("results must be a map");
            assert_eq!(map.len(), 3, "one result per submitted image");
        }
        "failed" => {
            let error = terminal.error.expect("failed view must carry a diagnostic");
            panic!("Job failed: {error}");
        }
        other => panic!("Unexpected terminal status: {other}"),
    }
}
