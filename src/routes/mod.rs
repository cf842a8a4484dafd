pub mod health;
pub mod jobs;
pub mod metrics;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::services::storage::StorageError;
use crate::services::validation::ValidationError;

/// Error surface of the HTTP API. Only synchronous-path failures show up
/// here; everything that happens after intake is recorded in the job and
/// discovered through polling.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("malformed multipart submission: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("object store failure: {0}")]
    Storage(#[from] StorageError),

    #[error("record store failure")]
    Database(#[from] sqlx::Error),

    #[error("job {0} not found")]
    NotFound(Uuid),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
            ApiError::Multipart(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Storage(_) => (StatusCode::BAD_GATEWAY, "storage"),
            ApiError::Database(e) => {
                tracing::error!(error = %e, "Record store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        };

        let body = Json(serde_json::json!({
            "error": kind,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
