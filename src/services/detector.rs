use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Client for the face detection service invoked once per image.
/// The model behind it is opaque to this crate; the worker only consumes
/// the structured detection output.
pub struct DetectorClient {
    http: Client,
    endpoint: String,
    api_token: String,
}

#[derive(Deserialize)]
struct DetectResponse {
    faces: Vec<DetectedFace>,
}

/// One detected face: bounding box plus the embedding vector produced by
/// the detection model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedFace {
    pub bbox: [f32; 4],
    pub embedding: Vec<f32>,
}

/// Detection output for a single image.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub faces: Vec<DetectedFace>,
}

impl DetectorClient {
    pub fn new(endpoint: &str, api_token: &str) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        }
    }

    /// Run face detection on one image.
    pub async fn detect(&self, image_bytes: &[u8]) -> Result<Detection, DetectorError> {
        let request_body = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(image_bytes),
        });

        let response = self
            .http
            .post(format!("{}/v1/detect", self.endpoint))
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await
            .map_err(DetectorError::Http)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(DetectorError::Api { status, message });
        }

        let detected: DetectResponse = response.json().await.map_err(DetectorError::Http)?;
        Ok(Detection {
            faces: detected.faces,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("detection service returned {status}: {message}")]
    Api { status: u16, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_response_parses_faces() {
        let raw = serde_json::json!({
            "faces": [
                { "bbox": [10.0, 20.0, 110.0, 140.0], "embedding": [0.1, 0.2, 0.3] },
                { "bbox": [200.0, 30.0, 280.0, 120.0], "embedding": [0.4, 0.5, 0.6] }
            ]
        });
        let parsed: DetectResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.faces.len(), 2);
        assert_eq!(parsed.faces[0].bbox, [10.0, 20.0, 110.0, 140.0]);
        assert_eq!(parsed.faces[1].embedding, vec![0.4, 0.5, 0.6]);
    }

    #[test]
    fn empty_detection_is_valid() {
        let parsed: DetectResponse = serde_json::from_value(serde_json::json!({"faces": []})).unwrap();
        assert!(parsed.faces.is_empty());
    }
}
