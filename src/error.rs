//! Errors returned synchronously to API callers.
//!
//! Failures inside a background execution never surface here; they are
//! recorded on the job as its error message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::services::registry::RegistryError;
use crate::services::storage::StorageError;

/// Rejected submission or request shape.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("At least one image is required")]
    NoArtifacts,

    #[error("Maximum {max} images allowed, got {count}")]
    TooManyArtifacts { count: usize, max: usize },

    #[error("Image {index} has content type {content_type:?}; only image files are allowed")]
    UnsupportedMediaType {
        index: usize,
        content_type: Option<String>,
    },

    #[error("Image {index} is {size} bytes; the limit is {max} bytes")]
    ArtifactTooLarge { index: usize, size: usize, max: usize },

    #[error("Malformed upload: {0}")]
    Malformed(String),

    #[error("Invalid query: {0}")]
    Query(String),
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Analysis not found: {0}")]
    NotFound(Uuid),

    #[error("Artifact storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Job registry error: {0}")]
    Registry(RegistryError),
}

impl From<RegistryError> for AnalysisError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => AnalysisError::NotFound(id),
            other => AnalysisError::Registry(other),
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            AnalysisError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AnalysisError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AnalysisError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            AnalysisError::Registry(_) => (StatusCode::INTERNAL_SERVER_ERROR, "REGISTRY_ERROR"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, AnalysisError>;
